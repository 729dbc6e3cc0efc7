//! Panel moderation client
//!
//! Flags and rejects disqualified participants on the crowdsourcing panel
//! provider, one PUT request per participant. A failed request affects only
//! that participant: it is logged and the batch continues.

use crate::error::ExtractError;
use tracing::{debug, info, warn};

/// Default panel provider API root
pub const DEFAULT_API_BASE: &str = "https://api.appen.com/v1";

/// One participant flagged for moderation
#[derive(Debug, Clone)]
pub struct FlaggedWorker {
    /// Panel-side numeric worker ID
    pub worker_id: u64,
    /// Internal worker code the participant reused, if any
    pub worker_code: Option<String>,
}

impl FlaggedWorker {
    /// Reason text sent to the panel provider
    fn reason(&self) -> String {
        match &self.worker_code {
            Some(code) => format!(
                "User repeatedly ignored our instructions and joined job from \
                 different accounts/IP addresses. The same code {code} used \
                 internally in the job was reused."
            ),
            None => "User repeatedly ignored our instructions and joined job from \
                     different accounts/IP addresses. No worker code used internally \
                     was inputted (html regex validator was bypassed)."
                .to_string(),
        }
    }
}

/// Moderation client bound to one panel job
pub struct PanelClient {
    job_id: u64,
    api_key: String,
    api_base: String,
    http: reqwest::blocking::Client,
}

impl PanelClient {
    pub fn new(job_id: u64, api_key: impl Into<String>) -> Self {
        PanelClient {
            job_id,
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            http: reqwest::blocking::Client::new(),
        }
    }

    /// Point the client at a different API root (used by tests)
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Ban every flagged worker from the job. Returns the number of workers
    /// banned by this run (already-flagged workers are not counted).
    pub fn ban_workers(&self, flagged: &[FlaggedWorker]) -> usize {
        if flagged.is_empty() {
            return 0;
        }
        info!(workers = flagged.len(), "flagging workers");
        let mut banned = 0;
        for worker in flagged {
            match self.moderate(worker, "ban") {
                Ok(already_flagged) => {
                    if !already_flagged {
                        banned += 1;
                    }
                }
                Err(e) => {
                    warn!(worker = worker.worker_id, error = %e, "could not flag worker");
                }
            }
        }
        info!(banned, "flagged workers not flagged previously");
        banned
    }

    /// Reject every flagged worker's submission. Returns the number of
    /// workers rejected by this run.
    pub fn reject_workers(&self, flagged: &[FlaggedWorker]) -> usize {
        if flagged.is_empty() {
            return 0;
        }
        info!(workers = flagged.len(), "rejecting workers");
        let mut rejected = 0;
        for worker in flagged {
            match self.moderate(worker, "reject") {
                Ok(_) => rejected += 1,
                Err(e) => {
                    warn!(worker = worker.worker_id, error = %e, "could not reject worker");
                }
            }
        }
        info!(rejected, "rejected workers");
        rejected
    }

    /// Send one moderation PUT. `Ok(true)` means the provider reported the
    /// worker as already flagged.
    fn moderate(&self, worker: &FlaggedWorker, action: &str) -> Result<bool, ExtractError> {
        let url = format!(
            "{}/jobs/{}/workers/{}/{}.json",
            self.api_base, self.job_id, worker.worker_id, action
        );
        let reason = worker.reason();
        let params: Vec<(&str, &str)> = match action {
            "ban" => vec![("flag", reason.as_str()), ("key", self.api_key.as_str())],
            _ => vec![
                ("reason", reason.as_str()),
                ("manual", "true"),
                ("key", self.api_key.as_str()),
            ],
        };
        let response = self
            .http
            .put(&url)
            .header("Authorization", format!("Token token={}", self.api_key))
            .form(&params)
            .send()
            .map_err(|e| ExtractError::ModerationError {
                worker_id: worker.worker_id,
                detail: e.to_string(),
            })?;
        let status = response.status();
        let body = response.text().unwrap_or_default();
        debug!(
            worker = worker.worker_id,
            %status,
            body = %body,
            "moderation response"
        );
        if !status.is_success() {
            return Err(ExtractError::ModerationError {
                worker_id: worker.worker_id,
                detail: format!("HTTP {status}: {body}"),
            });
        }
        Ok(body.contains("already been flagged"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_text_mentions_reused_code() {
        let flagged = FlaggedWorker {
            worker_id: 42,
            worker_code: Some("W1".into()),
        };
        assert!(flagged.reason().contains("The same code W1"));

        let anonymous = FlaggedWorker {
            worker_id: 43,
            worker_code: None,
        };
        assert!(anonymous.reason().contains("No worker code"));
    }

    #[test]
    fn test_unreachable_endpoint_is_not_fatal() {
        // port 9 on localhost is not listening; every request fails and the
        // batch still completes with zero successes
        let client = PanelClient::new(1, "key").with_api_base("http://127.0.0.1:9");
        let flagged = vec![
            FlaggedWorker {
                worker_id: 1,
                worker_code: None,
            },
            FlaggedWorker {
                worker_id: 2,
                worker_code: Some("W2".into()),
            },
        ];
        assert_eq!(client.ban_workers(&flagged), 0);
        assert_eq!(client.reject_workers(&flagged), 0);
    }

    #[test]
    fn test_empty_flag_list_short_circuits() {
        let client = PanelClient::new(1, "key");
        assert_eq!(client.ban_workers(&[]), 0);
        assert_eq!(client.reject_workers(&[]), 0);
    }
}
