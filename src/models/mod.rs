pub mod config;
pub mod error;
pub mod hooks;
pub mod language;
pub mod message;
pub mod task;
