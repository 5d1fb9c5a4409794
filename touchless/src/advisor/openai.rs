//! OpenAI-compatible Responses API client.
//!
//! Speaks the `/v1/responses` wire shape: a prompt goes up, an ordered
//! `output` array comes back whose items are either tool-call records or
//! assistant messages. Unknown item types are tolerated and reported as
//! tool invocations so they still reach the journal.

use super::{render_prompt, Advisor, ReplyItem};
use crate::errors::RemedyError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Default endpoint.
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Environment variable holding the API key.
const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Cap on the generated script size.
const MAX_OUTPUT_TOKENS: u32 = 512;

/// System-level instruction sent with every request.
const INSTRUCTIONS: &str = "You are a DevOps assistant.";

/// Reasoning-service client over an OpenAI-style Responses endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiAdvisor {
    base_url: String,
    model: String,
    shell_name: String,
    web_search: bool,
    api_key: String,
    client: Client,
}

impl OpenAiAdvisor {
    /// Creates a client with an explicit API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            shell_name: "shell".to_string(),
            web_search: true,
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    /// Creates a client reading the API key from `OPENAI_API_KEY`.
    pub fn from_env(model: impl Into<String>) -> Result<Self, RemedyError> {
        let key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| RemedyError::MissingCredentials(API_KEY_VAR.to_string()))?;
        Ok(Self::new(key, model))
    }

    /// Overrides the endpoint base URL (for gateways and tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Names the shell the script should be written for.
    #[must_use]
    pub fn with_shell_name(mut self, name: impl Into<String>) -> Self {
        self.shell_name = name.into();
        self
    }

    /// Enables or disables the service-side web search tool.
    #[must_use]
    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.web_search = enabled;
        self
    }

    /// Substitutes a configured reqwest client (timeouts, proxies).
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// The model requests are sent to.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Advisor for OpenAiAdvisor {
    async fn propose_fix(&self, stage: &str, error: &str) -> Result<Vec<ReplyItem>, RemedyError> {
        let request = ResponsesRequest {
            model: &self.model,
            input: render_prompt(stage, error, &self.shell_name),
            instructions: INSTRUCTIONS,
            tools: if self.web_search {
                vec![ToolSpec { kind: "web_search" }]
            } else {
                Vec::new()
            },
            max_output_tokens: MAX_OUTPUT_TOKENS,
        };

        let reply: ResponsesReply = self
            .client
            .post(format!("{}/v1/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(convert(reply))
    }
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: String,
    instructions: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSpec>,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ToolSpec {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputItem {
    WebSearchCall {
        #[serde(default)]
        id: String,
        #[serde(default)]
        status: String,
    },
    Message {
        #[serde(default)]
        content: Vec<ContentPart>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: String,
}

fn convert(reply: ResponsesReply) -> Vec<ReplyItem> {
    reply
        .output
        .into_iter()
        .map(|item| match item {
            OutputItem::WebSearchCall { id, status } => ReplyItem::ToolInvocation {
                kind: "web_search_call".to_string(),
                id,
                status,
            },
            OutputItem::Message { content } => ReplyItem::Message {
                text: content
                    .into_iter()
                    .map(|part| part.text)
                    .find(|text| !text.is_empty())
                    .unwrap_or_default(),
            },
            OutputItem::Unknown => ReplyItem::ToolInvocation {
                kind: "unknown".to_string(),
                id: String::new(),
                status: String::new(),
            },
        })
        .collect()
}
