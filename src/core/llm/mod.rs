mod base;
pub mod openai;
pub mod tools;

pub use base::{ChatMessage, FunctionCall, LLMError, LanguageModel, Role, ToolCall};
pub use openai::{LLMConfig, OpenAIClient};
pub use tools::{ToolRegistry, ToolResult};
