//! OpenAI-compatible chat-completions client with an internal tool loop.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::base::{ChatMessage, LLMError, LanguageModel, Role, ToolCall};
use super::tools::ToolRegistry;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "moonshotai/kimi-k2-instruct-0905";

const TEMPERATURE: f32 = 0.2;
const TOP_P: f32 = 0.9;

/// Configuration for the chat-completions client
#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Completions requested per turn before giving up with an empty reply
    pub max_attempts: u32,
    pub system_prompt_path: Option<PathBuf>,
    pub bookings_path: PathBuf,
    pub request_timeout: Duration,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_attempts: 3,
            system_prompt_path: Some(PathBuf::from("lib/prompts/prompt.txt")),
            bookings_path: PathBuf::from("bookings.csv"),
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    tools: &'a [Value],
    tool_choice: &'static str,
    temperature: f32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

pub struct OpenAIClient {
    client: reqwest::Client,
    config: LLMConfig,
    system_prompt: Option<String>,
    tools: ToolRegistry,
    tool_definitions: Vec<Value>,
}

impl OpenAIClient {
    pub fn new(config: LLMConfig) -> Result<Self, LLMError> {
        if config.api_key.is_empty() {
            return Err(LLMError::ConfigurationError(
                "API key is required".to_string(),
            ));
        }
        if config.max_attempts == 0 {
            return Err(LLMError::ConfigurationError(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LLMError::ConfigurationError(format!("Failed to build client: {e}")))?;

        let system_prompt = config
            .system_prompt_path
            .as_deref()
            .and_then(load_system_prompt);
        let tools = ToolRegistry::new(config.bookings_path.clone());
        let tool_definitions = tools.definitions();

        Ok(Self {
            client,
            config,
            system_prompt,
            tools,
            tool_definitions,
        })
    }

    /// Copy of `history` with the system prompt in front, unless one is present
    fn with_system_prompt(&self, history: &[ChatMessage]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(prompt) = &self.system_prompt
            && !history.iter().any(|m| m.role == Role::System)
        {
            messages.push(ChatMessage::system(prompt.clone()));
        }
        messages.extend_from_slice(history);
        messages
    }

    async fn request_completion(
        &self,
        messages: &[ChatMessage],
    ) -> Result<ChatCompletionResponse, LLMError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            tools: &self.tool_definitions,
            tool_choice: "auto",
            temperature: TEMPERATURE,
            top_p: TOP_P,
            stream: false,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout(e.to_string())
                } else {
                    LLMError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("LLM API error ({}): {}", status, error_body);
            return Err(LLMError::ApiError(format!("({status}) {error_body}")));
        }

        response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| LLMError::InvalidResponse(e.to_string()))
    }

    async fn run_tool_calls(&self, tool_calls: &[ToolCall], messages: &mut Vec<ChatMessage>) {
        messages.push(ChatMessage::assistant_tool_calls(tool_calls.to_vec()));

        for call in tool_calls {
            let args = serde_json::from_str::<Value>(&call.function.arguments)
                .ok()
                .filter(Value::is_object)
                .unwrap_or_else(|| Value::Object(Default::default()));

            let result = self.tools.call(&call.function.name, &args).await;
            debug!("Tool {} returned {:?}", call.function.name, result);

            let content = serde_json::to_string(&result)
                .unwrap_or_else(|_| r#"{"success":false}"#.to_string());
            messages.push(ChatMessage::tool_result(call.id.clone(), content));
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAIClient {
    async fn complete(&self, history: &[ChatMessage]) -> Result<String, LLMError> {
        let mut messages = self.with_system_prompt(history);

        for attempt in 1..=self.config.max_attempts {
            let response = self.request_completion(&messages).await?;

            let Some(message) = response.choices.into_iter().next().and_then(|c| c.message)
            else {
                debug!("Completion attempt {} returned no choices", attempt);
                continue;
            };

            if let Some(content) = message.content.filter(|c| !c.is_empty()) {
                return Ok(content);
            }

            let tool_calls = message.tool_calls.unwrap_or_default();
            if tool_calls.is_empty() {
                debug!("Completion attempt {} returned no content", attempt);
                continue;
            }

            info!(
                "Completion attempt {} requested {} tool call(s)",
                attempt,
                tool_calls.len()
            );
            self.run_tool_calls(&tool_calls, &mut messages).await;
        }

        warn!(
            "No completion content after {} attempts",
            self.config.max_attempts
        );
        Ok(String::new())
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

fn load_system_prompt(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(prompt) => {
            let prompt = prompt.trim();
            (!prompt.is_empty()).then(|| prompt.to_string())
        }
        Err(e) => {
            debug!("No system prompt at {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, dir: &TempDir) -> LLMConfig {
        LLMConfig {
            api_key: "test_key".to_string(),
            base_url: server.uri(),
            model: "test-model".to_string(),
            system_prompt_path: None,
            bookings_path: dir.path().join("bookings.csv"),
            ..Default::default()
        }
    }

    fn content_response(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        }))
    }

    #[test]
    fn test_new_requires_api_key() {
        let result = OpenAIClient::new(LLMConfig::default());
        assert!(matches!(result, Err(LLMError::ConfigurationError(_))));
    }

    #[test]
    fn test_system_prompt_is_prepended_once() {
        let dir = TempDir::new().unwrap();
        let prompt_path = dir.path().join("prompt.txt");
        std::fs::write(&prompt_path, "  You take restaurant bookings.\n").unwrap();

        let client = OpenAIClient::new(LLMConfig {
            api_key: "key".to_string(),
            system_prompt_path: Some(prompt_path),
            ..Default::default()
        })
        .unwrap();

        let history = vec![ChatMessage::user("hello")];
        let messages = client.with_system_prompt(&history);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::system("You take restaurant bookings."));

        let with_system = client.with_system_prompt(&messages);
        assert_eq!(with_system.len(), 2);
        // input history is untouched
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_missing_system_prompt_file() {
        let client = OpenAIClient::new(LLMConfig {
            api_key: "key".to_string(),
            system_prompt_path: Some(PathBuf::from("/nonexistent/prompt.txt")),
            ..Default::default()
        })
        .unwrap();
        let messages = client.with_system_prompt(&[ChatMessage::user("hi")]);
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn test_complete_returns_content() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test_key"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "tool_choice": "auto",
                "stream": false
            })))
            .respond_with(content_response("Sure, for how many people?"))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAIClient::new(config(&server, &dir)).unwrap();
        let reply = client
            .complete(&[ChatMessage::user("Book a table")])
            .await
            .unwrap();
        assert_eq!(reply, "Sure, for how many people?");
    }

    #[tokio::test]
    async fn test_complete_runs_tool_calls_then_answers() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "store_on_csv",
                            "arguments": "{\"name\":\"Ada\",\"email\":\"ada@example.com\",\"date\":\"2025-06-01\"}"
                        }
                    }]
                }}]
            })))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(content_response("You're booked for June 1st."))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAIClient::new(config(&server, &dir)).unwrap();
        let reply = client
            .complete(&[ChatMessage::user("Book Ada for June 1st")])
            .await
            .unwrap();
        assert_eq!(reply, "You're booked for June 1st.");

        let csv = std::fs::read_to_string(dir.path().join("bookings.csv")).unwrap();
        assert_eq!(csv, "name,email,date\nAda,ada@example.com,2025-06-01\n");

        let requests = server.received_requests().await.unwrap();
        let second: Value = serde_json::from_slice(&requests[1].body).unwrap();
        let messages = second["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["tool_calls"][0]["id"], "call_1");
        assert_eq!(messages[2]["role"], "tool");
        assert_eq!(messages[2]["tool_call_id"], "call_1");
    }

    #[tokio::test]
    async fn test_complete_gives_up_with_empty_reply() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        Mock::given(method("POST"))
            .respond_with(content_response(""))
            .expect(3)
            .mount(&server)
            .await;

        let client = OpenAIClient::new(config(&server, &dir)).unwrap();
        let reply = client.complete(&[ChatMessage::user("...")]).await.unwrap();
        assert_eq!(reply, "");
    }

    #[tokio::test]
    async fn test_complete_surfaces_api_error() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = OpenAIClient::new(config(&server, &dir)).unwrap();
        match client.complete(&[ChatMessage::user("hello")]).await {
            Err(LLMError::ApiError(msg)) => {
                assert!(msg.contains("429"));
                assert!(msg.contains("rate limited"));
            }
            other => panic!("Expected ApiError, got {other:?}"),
        }
    }
}
