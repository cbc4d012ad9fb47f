//! Resource state poller
//!
//! Re-fetches a status record until the resource reaches its target state,
//! reports an error state, or the poll policy runs out. Every wait is bounded
//! by the policy and can be cut short with a `CancellationToken`.

use crate::error::{CloudError, Result};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Classification of one observed status record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Neither target nor error; poll again
    Pending,
    /// The requested state was reached
    Target,
    /// The provider reported a failure state
    Error,
}

/// A classified status record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub state: PollState,

    /// Raw state value, used in logs and errors
    pub label: Option<String>,
}

impl Observation {
    pub fn new(state: PollState, label: Option<&str>) -> Self {
        Self {
            state,
            label: label.map(String::from),
        }
    }

    /// Classify `label` against a target value and a set of error sentinels
    pub fn classify(label: Option<&str>, target: &str, error_states: &[&str]) -> Self {
        let state = match label {
            Some(s) if s == target => PollState::Target,
            Some(s) if error_states.contains(&s) => PollState::Error,
            _ => PollState::Pending,
        };
        Self::new(state, label)
    }
}

/// Retry and backoff policy for a poll loop
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay before the second fetch
    pub initial_delay: Duration,

    /// Upper bound for the backoff delay
    pub max_delay: Duration,

    /// Backoff multiplier applied after every pending or failed fetch
    pub backoff_multiplier: f64,

    /// Maximum number of fetches (None = unbounded)
    pub max_attempts: Option<u32>,

    /// Overall deadline for the wait (None = unbounded)
    pub timeout: Option<Duration>,

    /// Consecutive transient fetch failures tolerated before giving up
    pub max_consecutive_failures: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            max_attempts: None,
            timeout: Some(Duration::from_secs(30 * 60)),
            max_consecutive_failures: Some(5),
        }
    }
}

impl PollPolicy {
    /// Poll back-to-back without sleeping
    pub fn no_delay() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_max_consecutive_failures(mut self, max: Option<u32>) -> Self {
        self.max_consecutive_failures = max;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(CloudError::Configuration(format!(
                "backoff multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.initial_delay.is_zero() && !self.max_delay.is_zero() {
            return Err(CloudError::Configuration(format!(
                "initial poll delay must be positive when max delay is {:?}",
                self.max_delay
            )));
        }
        if self.initial_delay > self.max_delay {
            return Err(CloudError::Configuration(format!(
                "initial poll delay {:?} exceeds max delay {:?}",
                self.initial_delay, self.max_delay
            )));
        }
        if self.max_attempts == Some(0) {
            return Err(CloudError::Configuration(
                "max poll attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Delay to use after `current`, saturating at `max_delay`
    pub fn next_delay(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_multiplier)
            .map_or(self.max_delay, |next| next.min(self.max_delay))
    }
}

/// Bounded state poller
#[derive(Debug, Clone, Default)]
pub struct StatePoller {
    policy: PollPolicy,
    cancel: Option<CancellationToken>,
}

struct Progress {
    started: Instant,
    attempts: u32,
    last_state: Option<String>,
    last_error: Option<String>,
}

impl Progress {
    fn timeout(&self, resource: &str) -> CloudError {
        CloudError::PollingTimeout {
            resource: resource.to_string(),
            attempts: self.attempts,
            elapsed: self.started.elapsed(),
            last_state: self.last_state.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

impl StatePoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Fetch until `classify` reports a terminal state.
    ///
    /// Returns the record that reached the target state. An error state fails
    /// with `ResourceProvisioning`; running out of attempts, time or tolerated
    /// transient failures fails with `PollingTimeout`. Non-transient fetch
    /// errors are returned as-is.
    pub async fn poll_until<T, F, Fut, C>(
        &self,
        resource: &str,
        mut fetch: F,
        classify: C,
    ) -> Result<T>
    where
        T: Serialize,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        C: Fn(&T) -> Observation,
    {
        self.policy.validate()?;

        let mut progress = Progress {
            started: Instant::now(),
            attempts: 0,
            last_state: None,
            last_error: None,
        };
        // a timeout past the end of the clock means no deadline
        let deadline = self
            .policy
            .timeout
            .and_then(|t| progress.started.checked_add(t));
        let mut delay = self.policy.initial_delay;
        let mut consecutive_failures = 0u32;

        loop {
            if let Some(max) = self.policy.max_attempts {
                if progress.attempts >= max {
                    return Err(progress.timeout(resource));
                }
            }

            progress.attempts += 1;
            let fetched = match self.race(resource, fetch(), deadline).await? {
                Some(fetched) => fetched,
                None => return Err(progress.timeout(resource)),
            };

            match fetched {
                Ok(record) => {
                    consecutive_failures = 0;
                    let observed = classify(&record);
                    progress.last_state = observed.label.clone();

                    match observed.state {
                        PollState::Target => {
                            tracing::info!(
                                resource,
                                state = observed.label.as_deref().unwrap_or(""),
                                attempts = progress.attempts,
                                "Target state reached"
                            );
                            return Ok(record);
                        }
                        PollState::Error => {
                            let state = observed.label.unwrap_or_default();
                            tracing::error!(resource, state = %state, "Error state reported");
                            return Err(CloudError::ResourceProvisioning {
                                resource: resource.to_string(),
                                state,
                                record: serde_json::to_value(&record)?,
                            });
                        }
                        PollState::Pending => {
                            tracing::debug!(
                                resource,
                                state = observed.label.as_deref().unwrap_or("unknown"),
                                attempt = progress.attempts,
                                "Not yet in target state"
                            );
                        }
                    }
                }
                Err(e) if e.is_transient() => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        resource,
                        attempt = progress.attempts,
                        consecutive_failures,
                        "Error checking status: {}",
                        e
                    );
                    progress.last_error = Some(e.to_string());

                    if let Some(max) = self.policy.max_consecutive_failures {
                        if consecutive_failures > max {
                            return Err(progress.timeout(resource));
                        }
                    }
                }
                Err(e) => return Err(e),
            }

            if !delay.is_zero() {
                let sleep = tokio::time::sleep(delay);
                if self.race(resource, sleep, deadline).await?.is_none() {
                    return Err(progress.timeout(resource));
                }
            } else if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(progress.timeout(resource));
                }
            }
            delay = self.policy.next_delay(delay);
        }
    }

    /// Run `fut` unless the token is cancelled or the deadline passes first.
    ///
    /// `Ok(None)` means the deadline passed.
    async fn race<F: Future>(
        &self,
        resource: &str,
        fut: F,
        deadline: Option<Instant>,
    ) -> Result<Option<F::Output>> {
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(CloudError::Cancelled(format!("waiting for {resource}"))),
            _ = expired => Ok(None),
            out = fut => Ok(Some(out)),
        }
    }
}
