pub mod api;
pub mod config;
pub mod daemon;
pub mod dns;
pub mod error;
pub mod sync;

pub use config::Settings;
pub use error::{Result, ZoneError};
