//! Load controller (C7): submit/progress/stop protocol for the
//! asynchronous "load into cache" job, with polling.
//!
//! Grounded on `original_source/alluxiofs/load.py` (`OpType`, `LoadState`,
//! `load_file`, `load_progress_internal`): the 10-second poll interval,
//! the FAILED-string-normalization rule, and the submit/poll/stop control
//! flow all come directly from that module.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{DoraError, DoraResult};
use crate::worker::WorkerNetAddress;

const POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpType {
    Submit,
    Progress,
    Stop,
}

impl OpType {
    fn as_query_value(self) -> &'static str {
        match self {
            OpType::Submit => "submit",
            OpType::Progress => "progress",
            OpType::Stop => "stop",
        }
    }
}

/// Closed job-state enumeration (§3). Any raw string containing `FAILED`
/// normalizes to `Failed`, matching the original client's substring check
/// rather than an exact match (server-reported failure strings are not
/// stable across versions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadJobState {
    Running,
    Verifying,
    Stopped,
    Succeeded,
    Failed,
}

impl LoadJobState {
    fn parse(raw: &str) -> DoraResult<Self> {
        if raw.contains("FAILED") {
            return Ok(LoadJobState::Failed);
        }
        match raw {
            "RUNNING" => Ok(LoadJobState::Running),
            "VERIFYING" => Ok(LoadJobState::Verifying),
            "STOPPED" => Ok(LoadJobState::Stopped),
            "SUCCEEDED" => Ok(LoadJobState::Succeeded),
            other => Err(DoraError::LoadProtocol {
                path: String::new(),
                reason: format!("unrecognized jobState {other:?}"),
            }),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LoadJobState::Succeeded | LoadJobState::Failed | LoadJobState::Stopped
        )
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    success: bool,
}

#[derive(Debug, Deserialize)]
struct ProgressResponse {
    #[serde(rename = "jobState")]
    job_state: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoadController {
    http: reqwest::Client,
}

impl LoadController {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    fn url(address: &WorkerNetAddress, path: &str, op: OpType, verbose: bool) -> (String, Vec<(String, String)>) {
        let url = format!("http://{}:{}/v1/load", address.host, address.http_server_port);
        let mut params = vec![
            ("path".to_string(), path.to_string()),
            ("opType".to_string(), op.as_query_value().to_string()),
        ];
        if verbose {
            params.push(("verbose".to_string(), "true".to_string()));
        }
        (url, params)
    }

    pub async fn submit(&self, address: &WorkerNetAddress, path: &str, verbose: bool) -> DoraResult<bool> {
        let (url, params) = Self::url(address, path, OpType::Submit, verbose);
        let response = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|source| DoraError::Load {
                path: path.to_string(),
                source,
            })?
            .error_for_status()
            .map_err(|source| DoraError::Load {
                path: path.to_string(),
                source,
            })?;
        let body: SubmitResponse = response.json().await?;
        Ok(body.success)
    }

    pub async fn stop(&self, address: &WorkerNetAddress, path: &str) -> DoraResult<bool> {
        let (url, params) = Self::url(address, path, OpType::Stop, false);
        let response = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|source| DoraError::Load {
                path: path.to_string(),
                source,
            })?
            .error_for_status()
            .map_err(|source| DoraError::Load {
                path: path.to_string(),
                source,
            })?;
        let body: SubmitResponse = response.json().await?;
        Ok(body.success)
    }

    /// Returns the parsed job state and the raw response text.
    pub async fn progress(
        &self,
        address: &WorkerNetAddress,
        path: &str,
        verbose: bool,
    ) -> DoraResult<(LoadJobState, String)> {
        let (url, params) = Self::url(address, path, OpType::Progress, verbose);
        let response = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|source| DoraError::Load {
                path: path.to_string(),
                source,
            })?
            .error_for_status()
            .map_err(|source| DoraError::Load {
                path: path.to_string(),
                source,
            })?;
        let raw = response.text().await?;
        let parsed: ProgressResponse =
            serde_json::from_str(&raw).map_err(|e| DoraError::LoadProtocol {
                path: path.to_string(),
                reason: format!("malformed progress response: {e}"),
            })?;
        let job_state_raw = parsed.job_state.ok_or_else(|| DoraError::LoadProtocol {
            path: path.to_string(),
            reason: "response missing 'jobState' field".to_string(),
        })?;
        let state = LoadJobState::parse(&job_state_raw).map_err(|e| match e {
            DoraError::LoadProtocol { reason, .. } => DoraError::LoadProtocol {
                path: path.to_string(),
                reason,
            },
            other => other,
        })?;
        Ok((state, raw))
    }

    /// Submits the job then polls `progress` every 10 seconds until a
    /// terminal state is reached or `timeout` elapses (§4.6).
    pub async fn wait_until_done(
        &self,
        address: &WorkerNetAddress,
        path: &str,
        timeout: Option<Duration>,
    ) -> DoraResult<bool> {
        if !self.submit(address, path, false).await? {
            return Ok(false);
        }

        let deadline = timeout.map(|d| tokio::time::Instant::now() + d);
        loop {
            let (state, _raw) = self.progress(address, path, false).await?;
            match state {
                LoadJobState::Succeeded => return Ok(true),
                LoadJobState::Failed | LoadJobState::Stopped => {
                    tracing::warn!(path, ?state, "load job ended without succeeding");
                    return Ok(false);
                }
                LoadJobState::Running | LoadJobState::Verifying => {
                    if let Some(deadline) = deadline {
                        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                        if remaining < POLL_INTERVAL {
                            tracing::warn!(path, "load job timed out before reaching a terminal state");
                            return Ok(false);
                        }
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }
    }
}

impl Default for LoadController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path as path_matcher, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn address(server: &MockServer) -> WorkerNetAddress {
        let (host, port) = server.uri().trim_start_matches("http://").split_once(':').unwrap();
        WorkerNetAddress::from_host(host, port.parse().unwrap())
    }

    #[test]
    fn failed_substring_normalizes() {
        assert_eq!(
            LoadJobState::parse("LOAD_FAILED_FOR_SOME_REASON").unwrap(),
            LoadJobState::Failed
        );
        assert_eq!(LoadJobState::parse("RUNNING").unwrap(), LoadJobState::Running);
        assert!(LoadJobState::parse("WHAT_IS_THIS").is_err());
    }

    #[tokio::test]
    async fn submit_reports_server_success_flag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_matcher("/v1/load"))
            .and(query_param("opType", "submit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
            .mount(&server)
            .await;

        let controller = LoadController::new();
        assert!(controller.submit(&address(&server), "s3://b/x", false).await.unwrap());
    }

    #[tokio::test]
    async fn progress_missing_job_state_is_load_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_matcher("/v1/load"))
            .and(query_param("opType", "progress"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let controller = LoadController::new();
        let err = controller
            .progress(&address(&server), "s3://b/x", false)
            .await
            .unwrap_err();
        assert!(matches!(err, DoraError::LoadProtocol { .. }));
    }

    #[tokio::test]
    async fn wait_until_done_returns_false_when_submit_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_matcher("/v1/load"))
            .and(query_param("opType", "submit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": false})))
            .mount(&server)
            .await;

        let controller = LoadController::new();
        let done = controller
            .wait_until_done(&address(&server), "s3://b/x", None)
            .await
            .unwrap();
        assert!(!done);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_until_done_times_out_on_perpetual_running() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_matcher("/v1/load"))
            .and(query_param("opType", "submit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_matcher("/v1/load"))
            .and(query_param("opType", "progress"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"jobState": "RUNNING"})))
            .mount(&server)
            .await;

        let controller = LoadController::new();
        let done = controller
            .wait_until_done(&address(&server), "s3://b/x", Some(Duration::from_secs(15)))
            .await
            .unwrap();
        assert!(!done);
    }
}
