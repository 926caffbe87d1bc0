//! Provider adapters and response handling

pub mod gemini_client;
pub mod openai_client;
pub mod prompts;
pub mod provider;
pub mod response_validator;

pub use gemini_client::GeminiClient;
pub use openai_client::OpenAiClient;
pub use provider::{
    build_adapter, CompletionBackend, PromptedClassifier, ProviderAdapter, ResponseFormat,
};
