//! Per-utterance handling: log, detect, dispatch, reply.

use crate::config::AgentConfig;
use aria_client::ApiClient;
use aria_intent::{detect_intent, Intent, IntentMatch};
use aria_tools::{EmailRequest, ToolError, ToolSuite};
use aria_types::InteractionKind;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// The assistant. One instance serves a session; handlers hold no state
/// between utterances.
pub struct Assistant {
    config: AgentConfig,
    tools: Arc<dyn ToolSuite>,
    /// Backend reporting channel. `None` runs the assistant standalone:
    /// interactions are only traced locally.
    api: Option<ApiClient>,
}

impl Assistant {
    pub fn new(config: AgentConfig, tools: Arc<dyn ToolSuite>, api: Option<ApiClient>) -> Self {
        tracing::info!(name = %config.name, "initialized assistant");
        Self { config, tools, api }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The opening line for a fresh session.
    pub fn greeting(&self) -> String {
        format!(
            "Hello, I'm {}, your voice assistant. How can I help you today?",
            self.config.name
        )
    }

    /// Handles one user utterance and returns the reply.
    ///
    /// The pipeline is: log the input, detect an intent, dispatch its
    /// handler (one external call at most), log the outcome. Backend logging
    /// is best effort — a failed log call never fails the utterance.
    pub async fn handle_user_input(&self, user_id: &str, text: &str) -> String {
        tracing::info!(user_id = %user_id, "user input: {:.100}", text);

        self.log(user_id, InteractionKind::Input, text, None).await;

        let matched = detect_intent(text);

        let Some(matched) = matched else {
            let reply = "I'm processing your request. Please wait.".to_string();
            self.log(user_id, InteractionKind::Output, &reply, None).await;
            return reply;
        };

        tracing::info!(
            user_id = %user_id,
            intent = matched.intent.label(),
            keyword = %matched.keyword,
            "intent detected"
        );

        if !self.config.enable_external_calls {
            let reply = "I'm processing your request. Please wait.".to_string();
            self.log(user_id, InteractionKind::Output, &reply, None).await;
            return reply;
        }

        self.emit_intent_event(&matched, text).await;

        match self.dispatch(user_id, &matched).await {
            Ok(reply) => {
                self.log(
                    user_id,
                    InteractionKind::Output,
                    &reply,
                    Some(json!({ "intent": matched.intent.label() })),
                )
                .await;
                reply
            }
            Err(e) => {
                tracing::error!(
                    user_id = %user_id,
                    intent = matched.intent.label(),
                    "intent handler failed: {}",
                    e
                );
                let reply = friendly_failure(&matched, &e);
                self.log(user_id, InteractionKind::Error, &e.to_string(), None)
                    .await;
                reply
            }
        }
    }

    /// Routes a matched intent to its single fixed handler.
    async fn dispatch(&self, user_id: &str, matched: &IntentMatch) -> Result<String, ToolError> {
        match matched.intent {
            Intent::Weather => match matched.argument.as_deref() {
                Some(city) => self.tools.weather(city).await,
                None => Ok("I can help you with weather. Which city would you like to know about?"
                    .to_string()),
            },
            Intent::Search => match matched.argument.as_deref() {
                Some(query) => self.tools.search(query).await,
                None => {
                    Ok("I can search the web for you. What would you like me to search?"
                        .to_string())
                }
            },
            Intent::Email => {
                // Voice input carries no structured recipient/body; the
                // handler asks for them rather than guessing.
                Ok("I can help you send an email. Please provide the recipient and message."
                    .to_string())
            }
            Intent::Context => self.fetch_context_reply(user_id).await,
        }
    }

    async fn fetch_context_reply(&self, user_id: &str) -> Result<String, ToolError> {
        let Some(api) = &self.api else {
            return Ok("I don't have access to your stored context right now.".to_string());
        };

        match api.fetch_context(user_id).await {
            Ok(context) => {
                let rendered = context.to_string();
                let preview: String = rendered.chars().take(200).collect();
                Ok(format!("I found your context information: {}", preview))
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, "context fetch failed: {}", e);
                Ok("I couldn't reach your stored context right now.".to_string())
            }
        }
    }

    /// Sends an email on the user's behalf. Exposed separately from voice
    /// dispatch because the recipient and body arrive as structured data.
    pub async fn send_email(
        &self,
        user_id: &str,
        request: &EmailRequest,
    ) -> Result<String, ToolError> {
        let result = self.tools.send_email(request).await;
        match &result {
            Ok(confirmation) => {
                self.log(
                    user_id,
                    InteractionKind::ToolCall,
                    confirmation,
                    Some(json!({ "tool": "email" })),
                )
                .await;
            }
            Err(e) => {
                self.log(user_id, InteractionKind::Error, &e.to_string(), None)
                    .await;
            }
        }
        result
    }

    /// Notifies the backend that an intent was detected. Best effort.
    async fn emit_intent_event(&self, matched: &IntentMatch, text: &str) {
        let Some(api) = &self.api else { return };

        let mut data = Map::new();
        data.insert("intent".to_string(), json!(matched.intent.label()));
        data.insert("keyword".to_string(), json!(matched.keyword));
        data.insert("text".to_string(), json!(text));
        if let Some(argument) = &matched.argument {
            data.insert("argument".to_string(), json!(argument));
        }

        if let Err(e) = api.send_agent_event("intent_detected", data).await {
            tracing::warn!("failed to send intent_detected event: {}", e);
        }
    }

    /// Logs an interaction with the backend. Best effort.
    async fn log(&self, user_id: &str, kind: InteractionKind, content: &str, extra: Option<Value>) {
        let Some(api) = &self.api else { return };

        let metadata = extra.and_then(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        });

        if let Err(e) = api.log_interaction(user_id, kind, content, metadata).await {
            tracing::warn!(
                user_id = %user_id,
                kind = kind.label(),
                "failed to log interaction: {}",
                e
            );
        }
    }
}

/// Phrases a handler failure for the user.
fn friendly_failure(matched: &IntentMatch, error: &ToolError) -> String {
    match (matched.intent, error) {
        (Intent::Weather, ToolError::NotFound(city)) => {
            format!("Could not locate '{}' for weather lookup.", city)
        }
        (Intent::Weather, _) => {
            let city = matched.argument.as_deref().unwrap_or("that location");
            format!("An error occurred while retrieving weather for {}.", city)
        }
        (Intent::Search, _) => {
            let query = matched.argument.as_deref().unwrap_or("that");
            format!("An error occurred while searching the web for '{}'.", query)
        }
        (Intent::Email, _) => "Email sending failed.".to_string(),
        (Intent::Context, _) => "I couldn't reach your stored context right now.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Counts tool calls and returns canned replies.
    #[derive(Default)]
    struct MockTools {
        weather_calls: AtomicUsize,
        search_calls: AtomicUsize,
        email_calls: AtomicUsize,
        weather_fails: bool,
        last_city: Mutex<Option<String>>,
    }

    #[async_trait]
    impl ToolSuite for MockTools {
        async fn weather(&self, city: &str) -> Result<String, ToolError> {
            self.weather_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_city.lock().unwrap() = Some(city.to_string());
            if self.weather_fails {
                return Err(ToolError::NotFound(city.to_string()));
            }
            Ok(format!("{}: clear sky, 20°C, wind 5.0 km/h", city))
        }

        async fn search(&self, query: &str) -> Result<String, ToolError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("Top result for {}", query))
        }

        async fn send_email(&self, request: &EmailRequest) -> Result<String, ToolError> {
            self.email_calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("Email sent successfully to {}", request.to))
        }
    }

    fn assistant_with(tools: Arc<MockTools>) -> Assistant {
        Assistant::new(AgentConfig::default(), tools, None)
    }

    #[tokio::test]
    async fn weather_intent_calls_tool_once_and_names_the_city() {
        let tools = Arc::new(MockTools::default());
        let assistant = assistant_with(tools.clone());

        let reply = assistant
            .handle_user_input("u-1", "what's the weather in Nairobi")
            .await;

        assert_eq!(tools.weather_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            tools.last_city.lock().unwrap().as_deref(),
            Some("Nairobi")
        );
        assert!(reply.contains("Nairobi"), "reply must name the city: {}", reply);
        assert_eq!(tools.search_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn weather_without_city_asks_and_makes_no_call() {
        let tools = Arc::new(MockTools::default());
        let assistant = assistant_with(tools.clone());

        let reply = assistant.handle_user_input("u-1", "will it rain").await;

        assert_eq!(tools.weather_calls.load(Ordering::SeqCst), 0);
        assert!(reply.contains("Which city"), "got: {}", reply);
    }

    #[tokio::test]
    async fn unknown_city_yields_could_not_locate() {
        let tools = Arc::new(MockTools {
            weather_fails: true,
            ..MockTools::default()
        });
        let assistant = assistant_with(tools.clone());

        let reply = assistant
            .handle_user_input("u-1", "weather in Atlantis")
            .await;

        assert!(reply.contains("Could not locate 'Atlantis'"), "got: {}", reply);
    }

    #[tokio::test]
    async fn no_intent_yields_processing_message_and_no_calls() {
        let tools = Arc::new(MockTools::default());
        let assistant = assistant_with(tools.clone());

        let reply = assistant.handle_user_input("u-1", "tell me a joke").await;

        assert!(reply.contains("processing"), "got: {}", reply);
        assert_eq!(tools.weather_calls.load(Ordering::SeqCst), 0);
        assert_eq!(tools.search_calls.load(Ordering::SeqCst), 0);
        assert_eq!(tools.email_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn disabled_external_calls_skip_dispatch() {
        let tools = Arc::new(MockTools::default());
        let config = AgentConfig {
            enable_external_calls: false,
            ..AgentConfig::default()
        };
        let assistant = Assistant::new(config, tools.clone(), None);

        let reply = assistant
            .handle_user_input("u-1", "search something interesting")
            .await;

        assert_eq!(tools.search_calls.load(Ordering::SeqCst), 0);
        assert!(reply.contains("processing"), "got: {}", reply);
    }

    #[tokio::test]
    async fn email_intent_asks_for_details() {
        let tools = Arc::new(MockTools::default());
        let assistant = assistant_with(tools.clone());

        let reply = assistant
            .handle_user_input("u-1", "send an email to my boss")
            .await;

        assert_eq!(tools.email_calls.load(Ordering::SeqCst), 0);
        assert!(reply.contains("recipient"), "got: {}", reply);
    }

    #[tokio::test]
    async fn interactions_are_reported_to_the_backend() {
        use axum::{routing::post, Json, Router};
        use std::net::SocketAddr;

        let records: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));
        let records_clone = records.clone();
        let router = Router::new()
            .route(
                "/interactions/log",
                post(move |Json(body): Json<serde_json::Value>| {
                    let records = records_clone.clone();
                    async move {
                        records.lock().unwrap().push(body);
                        Json(json!({ "status": "ok" }))
                    }
                }),
            )
            .route(
                "/agent/event",
                post(|| async { Json(json!({ "status": "ok" })) }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let api = ApiClient::new(aria_client::ApiClientConfig {
            base_url: format!("http://{}", addr),
            token: "tok".to_string(),
            timeout: std::time::Duration::from_secs(5),
        })
        .unwrap();

        let tools = Arc::new(MockTools::default());
        let assistant = Assistant::new(AgentConfig::default(), tools, Some(api));

        let _ = assistant
            .handle_user_input("u-9", "weather in Oslo please")
            .await;

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 2, "input and output records expected");
        assert_eq!(records[0]["type"], "input");
        assert_eq!(records[0]["user_id"], "u-9");
        assert_eq!(records[1]["type"], "output");
        assert!(records[1]["content"].as_str().unwrap().contains("Oslo"));
    }

    #[tokio::test]
    async fn structured_email_send_calls_mailer_once() {
        let tools = Arc::new(MockTools::default());
        let assistant = assistant_with(tools.clone());

        let request = EmailRequest {
            to: "friend@example.com".to_string(),
            subject: "Hi".to_string(),
            message: "Hello!".to_string(),
            cc: None,
            weather_report: None,
            search_report: None,
        };
        let confirmation = assistant
            .send_email("u-1", &request)
            .await
            .expect("send failed");

        assert_eq!(tools.email_calls.load(Ordering::SeqCst), 1);
        assert!(confirmation.contains("friend@example.com"));
    }

    #[tokio::test]
    async fn greeting_names_the_assistant() {
        let tools = Arc::new(MockTools::default());
        let assistant = assistant_with(tools);
        assert!(assistant.greeting().contains("Aria"));
    }
}
