//! Language-model and image-generation client for Storybuilder.
//!
//! Provides the `ProviderAdapter` and `ImageAdapter` traits, the OpenAI-compatible
//! adapter, a middleware chain, and `LlmClient` for routing requests.

mod client;
mod openai;
mod provider;
mod types;

pub use client::*;
pub use openai::OpenAiAdapter;
pub use provider::*;
pub use types::*;
