//! HTTP scoring adapter
//!
//! Posts the candidate batch to the model service's `/predict/batch`
//! endpoint. One request per order; the call is bounded by the client
//! timeout and surfaces timeouts distinctly so the orchestrator can apply
//! its bounded retry policy.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use shared::{CourierId, ScoreBatchRequest, ScoreBatchResponse};

use super::{Scorer, ScoringError};

pub struct HttpScorer {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpScorer {
    /// `base_url` is the model service root, e.g. `http://model-api:8000`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ScoringError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScoringError::Upstream(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/predict/batch", base_url.trim_end_matches('/')),
            timeout,
        })
    }
}

#[async_trait]
impl Scorer for HttpScorer {
    async fn score(
        &self,
        batch: ScoreBatchRequest,
    ) -> Result<HashMap<CourierId, f64>, ScoringError> {
        if batch.requests.is_empty() {
            return Err(ScoringError::EmptyBatch);
        }
        let expected = batch.requests.len();

        let response = self
            .client
            .post(&self.endpoint)
            .json(&batch)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScoringError::Timeout(self.timeout)
                } else {
                    ScoringError::Upstream(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScoringError::Upstream(format!(
                "model service returned {}",
                status
            )));
        }

        let scores: ScoreBatchResponse = response
            .json()
            .await
            .map_err(|e| ScoringError::Malformed(e.to_string()))?;

        if scores.is_empty() {
            return Err(ScoringError::Malformed(format!(
                "no scores for a batch of {}",
                expected
            )));
        }
        for entry in &scores {
            if !entry.prob_accept.is_finite()
                || entry.prob_accept < 0.0
                || entry.prob_accept > 1.0
            {
                return Err(ScoringError::Malformed(format!(
                    "probability {} out of range for {}",
                    entry.prob_accept, entry.driver_id
                )));
            }
        }

        Ok(scores
            .into_iter()
            .map(|entry| (entry.driver_id, entry.prob_accept))
            .collect())
    }
}
