//! tutorgrade-providers — Grading backends.
//!
//! Implements the `GradingClient` trait for OpenAI-compatible endpoints
//! (Qwen through DashScope by default), Gemini, Ollama, and a scripted mock,
//! plus the configuration file that selects between them.

pub mod config;
pub mod gemini;
mod http;
pub mod mock;
pub mod ollama;
pub mod openai;

pub use config::{create_client, load_config, load_config_from, BackendConfig, TutorConfig};
pub use tutorgrade_core::error::ProviderError;
