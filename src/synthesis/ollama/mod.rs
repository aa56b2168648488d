
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{GenerationClient, GenerationOptions};
use crate::config::OllamaConfig;
use crate::{RagError, Result};

/// Generation client for Ollama's `/api/generate`
///
/// Sends exactly one request per call; retrying is left to the caller.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    endpoint: Url,
    model: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: RequestOptions,
}

#[derive(Debug, Serialize)]
struct RequestOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let endpoint = config
            .ollama_url()?
            .join("/api/generate")
            .map_err(|e| RagError::Config(format!("Failed to build generate URL: {}", e)))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();

        Ok(Self {
            endpoint,
            model: config.generation_model.clone(),
            agent,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl GenerationClient for OllamaGenerator {
    #[inline]
    fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: RequestOptions {
                num_predict: options.max_tokens,
                temperature: options.temperature,
            },
        };
        let request_json = serde_json::to_string(&request).map_err(|e| {
            RagError::GenerationService(format!("Failed to serialize request: {}", e))
        })?;

        debug!(
            "Requesting generation from {} with model {} (prompt length: {})",
            self.endpoint,
            self.model,
            prompt.len()
        );

        let response_text = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|error| match error {
                ureq::Error::Timeout(_) => {
                    warn!("Generation request timed out");
                    RagError::Timeout {
                        stage: "generation",
                    }
                }
                ureq::Error::StatusCode(status) => {
                    warn!("Generation service returned HTTP {}", status);
                    RagError::GenerationService(format!("HTTP {}", status))
                }
                other => {
                    warn!("Generation request failed: {}", other);
                    RagError::GenerationService(other.to_string())
                }
            })?;

        let response: GenerateResponse = serde_json::from_str(&response_text).map_err(|e| {
            RagError::GenerationService(format!("Malformed generation response: {}", e))
        })?;

        Ok(response.response)
    }
}
