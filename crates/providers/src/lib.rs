//! LLM provider implementations for colonylab.
//!
//! [`OpenAiCompatProvider`] talks to the model endpoint, [`RetryProvider`]
//! wraps it with fixed-delay retries and [`CompletionModel`] gives the
//! analysis passes a typed, single-turn interface.

pub mod completion;
pub mod openai_compat;
pub mod retry;

pub use completion::{Completion, CompletionData, CompletionModel, GenerateOptions, strip_code_fences};
pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryProvider;
