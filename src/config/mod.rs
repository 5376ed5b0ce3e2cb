//! Configuration management

mod settings;

pub use settings::{AppConfig, ConfigFormat, CONFIG_FILE, PIPE_SECTION};
