//! The tool seam shared by the agent and the backend proxy endpoints.
//!
//! [`ToolSuite`] lets both consumers dispatch intent handlers without
//! knowing which concrete connector sits behind them, and lets tests count
//! outbound calls without touching the network.

use crate::email::{EmailRequest, GmailMailer};
use crate::error::ToolError;
use crate::search::SearchService;
use crate::weather::WeatherService;
use async_trait::async_trait;

/// One method per external capability. Every method performs at most one
/// logical outbound operation and returns a user-facing string.
#[async_trait]
pub trait ToolSuite: Send + Sync {
    /// Current weather for a city; the reply names the city.
    async fn weather(&self, city: &str) -> Result<String, ToolError>;

    /// Web search; the reply is a text block of results.
    async fn search(&self, query: &str) -> Result<String, ToolError>;

    /// Sends an email; the reply confirms the recipient.
    async fn send_email(&self, request: &EmailRequest) -> Result<String, ToolError>;
}

/// Production suite wiring the real connectors together.
#[derive(Debug, Clone)]
pub struct LiveToolSuite {
    weather: WeatherService,
    search: SearchService,
    mailer: GmailMailer,
}

impl LiveToolSuite {
    pub fn new(weather: WeatherService, search: SearchService, mailer: GmailMailer) -> Self {
        Self {
            weather,
            search,
            mailer,
        }
    }
}

#[async_trait]
impl ToolSuite for LiveToolSuite {
    async fn weather(&self, city: &str) -> Result<String, ToolError> {
        self.weather.current_weather(city).await
    }

    async fn search(&self, query: &str) -> Result<String, ToolError> {
        self.search.search(query).await
    }

    async fn send_email(&self, request: &EmailRequest) -> Result<String, ToolError> {
        self.mailer.send(request).await
    }
}
