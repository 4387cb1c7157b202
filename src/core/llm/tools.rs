//! Functions the language model may call while answering a turn.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

const CSV_HEADER: &str = "name,email,date\n";

/// Outcome of one tool invocation, returned to the model as JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            date: None,
            message: None,
            error: Some(error.into()),
        }
    }
}

/// Fixed tool set: `get_present_date` and `store_on_csv`
pub struct ToolRegistry {
    bookings_path: PathBuf,
    // serialises header creation and appends across sessions
    write_lock: Mutex<()>,
}

impl ToolRegistry {
    pub fn new(bookings_path: impl Into<PathBuf>) -> Self {
        Self {
            bookings_path: bookings_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn bookings_path(&self) -> &Path {
        &self.bookings_path
    }

    /// Tool schemas in the OpenAI `tools` request format
    pub fn definitions(&self) -> Vec<Value> {
        vec![
            json!({
                "type": "function",
                "function": {
                    "name": "get_present_date",
                    "description": "Get current date in YYYY-MM-DD format",
                    "parameters": {"type": "object", "properties": {}, "required": []}
                }
            }),
            json!({
                "type": "function",
                "function": {
                    "name": "store_on_csv",
                    "description": "Store booking details to CSV",
                    "parameters": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string", "description": "User name"},
                            "email": {"type": "string", "description": "User email"},
                            "date": {"type": "string", "description": "Booking date YYYY-MM-DD"}
                        },
                        "required": ["name", "email", "date"]
                    }
                }
            }),
        ]
    }

    /// Run tool `name`. Failures are reported in the result, never as errors.
    pub async fn call(&self, name: &str, args: &Value) -> ToolResult {
        match name {
            "get_present_date" => ToolResult {
                success: true,
                date: Some(present_date()),
                message: None,
                error: None,
            },
            "store_on_csv" => self.store_on_csv(args).await,
            _ => ToolResult::failure(format!("Unknown tool: {name}")),
        }
    }

    async fn store_on_csv(&self, args: &Value) -> ToolResult {
        let name = first_string(args, &["name", "user", "username", "full_name"]);
        let email = first_string(args, &["email"]);
        let date = first_string(args, &["date", "booking_date"]);

        let (Some(name), Some(email), Some(date)) = (name, email, date) else {
            return ToolResult::failure("Missing required fields (name, email, date)");
        };

        match self.append_booking(name, email, date).await {
            Ok(()) => {
                info!("Stored booking for {} on {}", email, date);
                ToolResult {
                    success: true,
                    date: None,
                    message: Some("Booking saved successfully".to_string()),
                    error: None,
                }
            }
            Err(e) => {
                warn!("Failed to store booking: {}", e);
                ToolResult::failure(e.to_string())
            }
        }
    }

    async fn append_booking(&self, name: &str, email: &str, date: &str) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.bookings_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let exists = tokio::fs::try_exists(&self.bookings_path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.bookings_path)
            .await?;

        let mut row = String::new();
        if !exists {
            row.push_str(CSV_HEADER);
        }
        row.push_str(&format!(
            "{},{},{}\n",
            csv_field(name),
            csv_field(email),
            csv_field(date)
        ));

        file.write_all(row.as_bytes()).await?;
        file.flush().await
    }
}

fn present_date() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

fn first_string<'a>(args: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| args.get(*key).and_then(Value::as_str))
        .find(|value| !value.trim().is_empty())
}

/// Quote a CSV field when it contains a delimiter, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
