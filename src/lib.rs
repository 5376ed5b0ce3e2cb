//! rg-pipe: Aggregates system metrics and window manager state into a
//! templated status line on stdout
//!
//! This library provides the application layer:
//! - Configuration loading (TOML or JSON, per-user config directory)
//! - Wiring of receivers, workers and the render loop

pub mod app;
pub mod config;

pub use app::App;
pub use config::AppConfig;
