//! External service connectors for the Aria assistant.
//!
//! Each tool wraps one external surface: weather (Open-Meteo with a wttr.in
//! fallback), web search (DuckDuckGo HTML results), email (Gmail REST API),
//! and the local clock. Tools return human-readable strings on success and a
//! typed [`ToolError`] otherwise; the caller decides how to phrase failures
//! for the user.

pub mod clock;
pub mod email;
pub mod error;
pub mod search;
pub mod suite;
pub mod weather;

pub use clock::{current_time, TimeQuery};
pub use email::{EmailRequest, GmailConfig, GmailMailer};
pub use error::ToolError;
pub use search::SearchService;
pub use suite::{LiveToolSuite, ToolSuite};
pub use weather::WeatherService;
