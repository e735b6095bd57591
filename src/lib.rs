// src/lib.rs
pub mod app;
pub mod config;
pub mod errors;
pub mod location;
pub mod logging;
pub mod methods;
pub mod notifier;
pub mod prayer;
pub mod schedule;
pub mod timings_api;
pub mod ui;
pub mod watch;
