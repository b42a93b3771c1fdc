// Copyright (c) 2026 SOLARE S.R.O.
//
// This file is part of VoltION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! A Home Assistant REST client scoped to exactly what the control loop
//! consumes: entity states for the tariff/forecast/telemetry sensors,
//! recorder history for the load predictor, and turning on the hook
//! scripts. Reads retry on transient failures with a linear backoff that
//! stays bounded inside one control tick; hook calls never retry, because
//! replaying a charge command with an unknown outcome is worse than
//! holding the previous action.

use crate::errors::{EntityRole, HaError, HaResult};
use crate::types::{HaEntityState, HaHistoryState};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Retry budget for read requests. With the defaults the worst case is
/// three attempts spread over roughly a second, far inside a 5-minute
/// tick.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(400),
        }
    }
}

/// Home Assistant REST client. Every read is tagged with the [`EntityRole`]
/// it serves, so a failure surfaces as "export tariff unreachable" rather
/// than anonymous HTTP noise.
#[derive(Clone)]
pub struct HomeAssistantClient {
    http: Client,
    base_url: String,
    token: String,
    retry: RetryPolicy,
}

impl HomeAssistantClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> HaResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HaError::Misconfigured(format!("HTTP client: {e}")))?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self {
            http,
            base_url,
            token: token.into(),
            retry: RetryPolicy::default(),
        })
    }

    /// Build the client from configuration, with the HA_BASE_URL / HA_TOKEN
    /// environment variables as fallback.
    pub fn from_config(base_url: Option<String>, token: Option<String>) -> HaResult<Self> {
        let base_url = base_url
            .or_else(|| std::env::var("HA_BASE_URL").ok())
            .unwrap_or_else(|| "http://localhost:8123".to_string());

        let token = token.or_else(|| std::env::var("HA_TOKEN").ok()).ok_or_else(|| {
            HaError::Misconfigured(
                "no Home Assistant token in config or HA_TOKEN environment".to_string(),
            )
        })?;

        info!("🏠 Home Assistant client: {}", base_url);
        Self::new(base_url, token)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Read the current state of an entity serving the given role.
    pub async fn get_state(&self, role: EntityRole, entity_id: &str) -> HaResult<HaEntityState> {
        debug!("🔍 Reading {} entity {}", role, entity_id);
        let state: HaEntityState = self
            .get_json(role, entity_id, &format!("/api/states/{entity_id}"), &[])
            .await?;
        trace!("   {} = '{}'", entity_id, state.state);
        Ok(state)
    }

    /// Fetch raw recorder history for the load meter over `[start, end]`.
    ///
    /// The payload is a list of lists (one inner list per entity); only the
    /// first entity's samples are returned, untouched, because the load
    /// predictor needs the raw cumulative series to repair midnight resets.
    pub async fn get_history(
        &self,
        entity_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> HaResult<Vec<HaHistoryState>> {
        let path = format!("/api/history/period/{}", start.to_rfc3339());
        let query = [
            ("filter_entity_id", entity_id.to_string()),
            ("end_time", end.to_rfc3339()),
        ];

        let outer: Vec<Vec<HaHistoryState>> = self
            .get_json(EntityRole::LoadHistory, entity_id, &path, &query)
            .await?;
        let samples = outer.into_iter().next().unwrap_or_default();

        debug!("📊 {} history samples for {}", samples.len(), entity_id);
        Ok(samples)
    }

    /// Fire a hook script. Exactly one attempt: if the outcome is unknown
    /// the supervisor holds the previous action instead of replaying the
    /// command.
    pub async fn turn_on_script(&self, script_entity: &str) -> HaResult<()> {
        let url = format!("{}/api/services/script/turn_on", self.base_url);
        info!("🔌 Firing hook script {}", script_entity);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "entity_id": script_entity }))
            .send()
            .await
            .map_err(|e| HaError::HookFailed {
                script: script_entity.to_string(),
                detail: e.to_string(),
            })?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(HaError::BadToken),
            s => Err(HaError::HookFailed {
                script: script_entity.to_string(),
                detail: format!(
                    "status {}: {}",
                    s.as_u16(),
                    response.text().await.unwrap_or_default()
                ),
            }),
        }
    }

    /// Single-shot liveness probe for the health checks. Never errors; an
    /// unreachable instance is simply not reachable.
    pub async fn reachable(&self) -> bool {
        let url = format!("{}/api/", self.base_url);
        match self.http.get(&url).bearer_auth(&self.token).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// One classified GET path for all reads.
    ///
    /// Transient failures (transport errors, 5xx, 429) consume the retry
    /// budget with a linear backoff; everything else maps straight onto the
    /// typed error for its role. 404 is the configured-entity-is-missing
    /// case and is never retried.
    async fn get_json<T: DeserializeOwned>(
        &self,
        role: EntityRole,
        subject: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> HaResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self
                .http
                .get(&url)
                .query(query)
                .bearer_auth(&self.token)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<T>().await.map_err(|e| {
                            HaError::MalformedPayload {
                                role,
                                detail: e.to_string(),
                            }
                        });
                    }
                    match status {
                        StatusCode::NOT_FOUND => {
                            return Err(HaError::MissingEntity {
                                role,
                                entity_id: subject.to_string(),
                            });
                        }
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                            return Err(HaError::BadToken);
                        }
                        s if (s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS)
                            && attempt < self.retry.attempts =>
                        {
                            debug!(
                                "{} read of {} got {}, retrying ({}/{})",
                                role, subject, s, attempt, self.retry.attempts
                            );
                        }
                        s => {
                            return Err(HaError::Rejected {
                                role,
                                status: s.as_u16(),
                                detail: response.text().await.unwrap_or_default(),
                            });
                        }
                    }
                }
                Err(e) if attempt < self.retry.attempts => {
                    debug!(
                        "{} read of {} failed ({}), retrying ({}/{})",
                        role, subject, e, attempt, self.retry.attempts
                    );
                }
                Err(e) => {
                    return Err(HaError::Unreachable {
                        role,
                        attempts: attempt,
                        source: e,
                    });
                }
            }

            tokio::time::sleep(self.retry.base_delay * attempt).await;
        }
    }
}
