//! Intake Assist — insurance-intake Telegram bot with an assistant fallback.

pub mod channels;
pub mod config;
pub mod error;
pub mod intake;
pub mod llm;
pub mod orchestrator;
pub mod server;
pub mod store;
