//! LLM-Plus model provider infrastructure adapter.
//!
//! Implements [`pipeline::ports::ModelService`] with a [`ModelRouter`] that
//! sends each invocation to the provider of its model family:
//!
//! | Family | Provider | Attachments |
//! |--------|----------|-------------|
//! | GPT | [`OpenAiProvider::openai`] | images, PDFs |
//! | CLAUDE | [`AnthropicProvider`] | images, PDFs |
//! | GEMINI | [`GeminiProvider`] | images, PDFs |
//! | DEEPSEEK | [`OpenAiProvider::deepseek`] | fallback text only |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. Failures are
//! returned as [`pipeline::ports::ModelError`]; turning them into inline error
//! markers is the evaluation pipeline's job.

pub mod anthropic;
pub mod attachments;
pub mod gemini;
mod http;
pub mod openai;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use router::{ModelProvider, ModelRouter, ProviderSettings};
