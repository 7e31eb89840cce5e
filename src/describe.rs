//! Screenshot description through a local vision model.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Where the Ollama service listens unless told otherwise.
pub const DEFAULT_DESCRIBER_URL: &str = "http://127.0.0.1:11434";

const BASE_PROMPT: &str = "Analyze this screenshot of a web page. Describe the overall layout, \
the main content, and the interactive elements a user could act on (buttons, links, form fields, menus).";

const DETAILED_PROMPT: &str = "Be thorough: include the visible text, the position of each element \
on the page, colors and visual hierarchy, and any errors, banners or dialogs that are showing.";

#[derive(Debug, Error)]
pub enum DescribeError {
    #[error("image description service unreachable at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("image description service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("image description service returned an unreadable reply: {0}")]
    Malformed(String),

    #[error("image description service returned an empty description")]
    Empty,
}

#[async_trait]
pub trait ImageDescriber: Send + Sync {
    async fn describe(&self, image: &[u8], prompt: &str, model: &str) -> Result<String, DescribeError>;
}

/// Assemble the prompt: optional caller pretext, the fixed instructions, then
/// the detailed-mode clause when requested.
pub fn build_prompt(detailed: bool, pretext: Option<&str>) -> String {
    let mut prompt = String::new();
    if let Some(pretext) = pretext.map(str::trim).filter(|p| !p.is_empty()) {
        prompt.push_str(pretext);
        prompt.push_str("\n\n");
    }
    prompt.push_str(BASE_PROMPT);
    if detailed {
        prompt.push(' ');
        prompt.push_str(DETAILED_PROMPT);
    }
    prompt
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Describer backed by Ollama's `/api/generate` endpoint.
pub struct OllamaDescriber {
    client: Client,
    base_url: String,
}

impl OllamaDescriber {
    pub fn new(base_url: &str) -> Self {
        // Local inference on a cold model can take minutes.
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build HTTP client, using defaults");
                Client::new()
            });
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for OllamaDescriber {
    fn default() -> Self {
        Self::new(DEFAULT_DESCRIBER_URL)
    }
}

#[async_trait]
impl ImageDescriber for OllamaDescriber {
    async fn describe(&self, image: &[u8], prompt: &str, model: &str) -> Result<String, DescribeError> {
        let url = format!("{}/api/generate", self.base_url);
        info!(model = %model, image_bytes = image.len(), "requesting screenshot description");

        let request = GenerateRequest {
            model,
            prompt,
            images: vec![base64::engine::general_purpose::STANDARD.encode(image)],
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|source| DescribeError::Unreachable {
                url: self.base_url.clone(),
                source,
            })?;

        let status = response.status();
        let raw_body = response
            .text()
            .await
            .map_err(|e| DescribeError::Malformed(format!("failed to read response body: {e}")))?;
        if !status.is_success() {
            return Err(DescribeError::Service {
                status: status.as_u16(),
                body: raw_body,
            });
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&raw_body).map_err(|e| DescribeError::Malformed(e.to_string()))?;
        let description = parsed.response.trim().to_string();
        if description.is_empty() {
            return Err(DescribeError::Empty);
        }

        debug!(chars = description.len(), "description received");
        Ok(description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_prompt_is_fixed_text() {
        assert_eq!(build_prompt(false, None), BASE_PROMPT);
    }

    #[test]
    fn detailed_clause_is_appended() {
        let prompt = build_prompt(true, None);
        assert!(prompt.starts_with(BASE_PROMPT));
        assert!(prompt.ends_with(DETAILED_PROMPT));
    }

    #[test]
    fn pretext_comes_first() {
        let prompt = build_prompt(true, Some("Identify all form fields and their labels"));
        assert!(prompt.starts_with("Identify all form fields and their labels\n\n"));
        assert!(prompt.contains(BASE_PROMPT));
        assert!(prompt.contains(DETAILED_PROMPT));
    }

    #[test]
    fn blank_pretext_is_dropped() {
        assert_eq!(build_prompt(false, Some("   ")), BASE_PROMPT);
    }

    #[test]
    fn base_url_is_normalized() {
        let d = OllamaDescriber::new("http://localhost:11434/");
        assert_eq!(d.base_url(), "http://localhost:11434");
    }

    #[test]
    fn generate_request_shape() {
        let req = GenerateRequest {
            model: "gemma3:4b",
            prompt: "p",
            images: vec!["aGk=".into()],
            stream: false,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"model": "gemma3:4b", "prompt": "p", "images": ["aGk="], "stream": false})
        );
    }

    #[tokio::test]
    async fn truncated_body_is_reported_with_its_cause() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            while !String::from_utf8_lossy(&request).contains("\"stream\":false}") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            // Promise 100 bytes, send a few, hang up.
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"resp")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        let d = OllamaDescriber::new(&format!("http://{addr}"));
        let err = d.describe(b"png", "p", "m").await.unwrap_err();
        match err {
            DescribeError::Malformed(msg) => {
                assert!(msg.starts_with("failed to read response body"), "{msg}")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unreachable_service_is_reported() {
        // Port 9 (discard) is essentially never served locally.
        let d = OllamaDescriber::new("http://127.0.0.1:9");
        let err = d.describe(b"png", "p", "m").await.unwrap_err();
        assert!(matches!(err, DescribeError::Unreachable { .. }));
    }
}
