//! Text-generation provider integration.
//!
//! Collaborators talk to the model through the [`LlmProvider`] trait; the
//! bundled [`LiteLlmClient`] speaks the OpenAI-compatible chat completions
//! protocol.

pub mod litellm;

pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message, Usage,
};
