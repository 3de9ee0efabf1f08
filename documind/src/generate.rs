//! Client for the external generation backend. The backend accepts a
//! question plus a list of document names and streams the answer back as
//! plain text chunks; we concatenate them in arrival order.

use documind_core::error::EngineError;
use futures::StreamExt;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

pub struct GenerationClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    question: &'a str,
    file_names: &'a [String],
}

impl GenerationClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    /// Ask the backend a question over the given documents. On a mid-stream
    /// error the prefix that already arrived is returned inside the error,
    /// never discarded. Generation may stream slowly, hence the generous
    /// ceiling; hitting it surfaces as a distinct timeout error.
    pub async fn generate(
        &self,
        question: &str,
        file_names: &[String],
    ) -> Result<String, EngineError> {
        debug!(files = file_names.len(), "calling generation backend");
        let mut answer = String::new();
        match tokio::time::timeout(
            self.timeout,
            self.stream_into(question, file_names, &mut answer),
        )
        .await
        {
            Ok(Ok(())) => Ok(answer),
            Ok(Err(message)) => {
                warn!(%message, "generation stream failed");
                Err(EngineError::Generation {
                    message,
                    partial: answer,
                })
            }
            Err(_) => {
                warn!(secs = self.timeout.as_secs(), "generation timed out");
                Err(EngineError::Timeout {
                    secs: self.timeout.as_secs(),
                    partial: answer,
                })
            }
        }
    }

    async fn stream_into(
        &self,
        question: &str,
        file_names: &[String],
        out: &mut String,
    ) -> Result<(), String> {
        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(&GenerateRequest {
                question,
                file_names,
            })
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("backend returned {}", response.status()));
        }

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| e.to_string())?;
            out.push_str(&String::from_utf8_lossy(&chunk));
        }
        Ok(())
    }
}
