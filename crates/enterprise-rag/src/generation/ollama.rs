//! Ollama REST client: embeddings, grounded answers and health

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::providers::GeneratedAnswer;
use crate::retry::{Failure, RetryPolicy};

use super::prompt::PromptBuilder;

/// First retry waits this long, later ones double it
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Serialize)]
struct EmbeddingsBody<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsReply {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: Sampling,
}

#[derive(Serialize)]
struct Sampling {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateReply {
    response: String,
    #[serde(default)]
    eval_count: Option<u64>,
}

/// Client for one Ollama server
pub struct OllamaClient {
    http: Client,
    config: LlmConfig,
    retry: RetryPolicy,
}

impl OllamaClient {
    /// `max_retries` extra attempts are made for transport errors, 5xx and 429
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            retry: RetryPolicy::new(config.max_retries.saturating_add(1), RETRY_BASE_DELAY),
            config: config.clone(),
        })
    }

    /// Replace the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// POST a JSON body to `path` and decode the JSON reply
    async fn post<B, R>(&self, path: &str, body: &B, to_error: fn(String) -> Error) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let url = format!("{}{}", self.base_url(), path);
        let (http, url) = (&self.http, url.as_str());

        self.retry
            .run("ollama", move || async move {
                let response = http
                    .post(url)
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| Failure::Transient(to_error(format!("POST {} failed: {}", path, e))))?;

                let status = response.status();
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(Failure::for_status(
                        status,
                        to_error(format!("{} returned HTTP {}: {}", path, status, text.trim())),
                    ));
                }

                response
                    .json::<R>()
                    .await
                    .map_err(|e| Failure::Fatal(to_error(format!("Unreadable {} reply: {}", path, e))))
            })
            .await
    }

    /// True when `/api/tags` answers with a success status
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url());
        match self.http.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::debug!("Ollama unreachable at {}: {}", self.base_url(), e);
                Ok(false)
            }
        }
    }

    /// Embed `text` with the configured embedding model
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = EmbeddingsBody {
            model: &self.config.embed_model,
            prompt: text,
        };
        let reply: EmbeddingsReply = self.post("/api/embeddings", &body, Error::Embedding).await?;
        if reply.embedding.is_empty() {
            return Err(Error::embedding(format!(
                "Model {} returned an empty embedding",
                self.config.embed_model
            )));
        }
        Ok(reply.embedding)
    }

    /// Answer `question` from `context` with the generation model
    ///
    /// Ollama reports no confidence, so the answer is unscored.
    pub async fn generate_answer(&self, question: &str, context: &str) -> Result<GeneratedAnswer> {
        let prompt = PromptBuilder::build_rag_prompt(question, context);
        let body = GenerateBody {
            model: &self.config.generate_model,
            prompt: &prompt,
            stream: false,
            options: Sampling {
                temperature: self.config.temperature,
            },
        };

        let reply: GenerateReply = self.post("/api/generate", &body, Error::Llm).await?;
        let answer = reply.response.trim();
        if answer.is_empty() {
            return Err(Error::llm(format!(
                "Model {} returned an empty answer",
                self.config.generate_model
            )));
        }
        if let Some(tokens) = reply.eval_count {
            tracing::debug!("{} produced {} tokens", self.config.generate_model, tokens);
        }

        Ok(GeneratedAnswer::unscored(answer))
    }

    pub fn generate_model(&self) -> &str {
        &self.config.generate_model
    }

    pub fn embed_model(&self) -> &str {
        &self.config.embed_model
    }
}
