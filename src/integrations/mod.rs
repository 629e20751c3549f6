//! Third-party service integrations

pub mod forms_relay;
pub mod weather;

pub use forms_relay::FormsRelay;
pub use weather::{WeatherClient, WeatherReport};
