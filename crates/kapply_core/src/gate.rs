//! Schema readiness gating.
//!
//! After a custom resource definition is submitted, instances of the new
//! type cannot be applied until the API server reports the definition as
//! established and its names as accepted. The gate polls the definition's
//! conditions at a fixed interval until it reaches a terminal state or
//! the overall deadline expires.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::cluster::{SchemaClient, SchemaStatus};
use crate::error::SchemaNotReadyError;

/// Readiness state of one submitted schema definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaReadiness {
    /// Submitted to the cluster, conditions not yet satisfied.
    Submitted,
    /// Established and names accepted; terminal.
    Established,
    /// Deadline expired before establishment; terminal.
    Failed,
}

impl SchemaReadiness {
    fn observe(status: &SchemaStatus) -> Self {
        if status.is_ready() {
            Self::Established
        } else {
            Self::Submitted
        }
    }
}

/// Bounded poll loop for schema establishment.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    poll_interval: Duration,
    timeout: Duration,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(60),
        }
    }
}

impl ReadinessGate {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }

    /// Block until the definition named `crd_name` is established, or the
    /// deadline expires.
    ///
    /// `group`/`kind` identify the custom resource type the definition
    /// serves; they only feed the diagnostic on failure. Transient status
    /// query errors count against the deadline rather than aborting.
    pub async fn wait_until_established(
        &self,
        schema: &dyn SchemaClient,
        crd_name: &str,
        group: &str,
        kind: &str,
    ) -> Result<(), SchemaNotReadyError> {
        let deadline = Instant::now() + self.timeout;
        let mut last_observed = "not yet observed".to_string();

        loop {
            match schema.status(crd_name).await {
                Ok(status) => {
                    last_observed = status.summary.clone();
                    if SchemaReadiness::observe(&status) == SchemaReadiness::Established {
                        info!("Schema definition {} established", crd_name);
                        return Ok(());
                    }
                    debug!("Schema definition {} not ready: {}", crd_name, last_observed);
                }
                Err(err) => {
                    last_observed = format!("status query failed: {err}");
                    debug!("{last_observed}");
                }
            }

            if Instant::now() >= deadline {
                warn!(
                    "Schema definition {} reached {:?} after {:?}",
                    crd_name,
                    SchemaReadiness::Failed,
                    self.timeout
                );
                return Err(SchemaNotReadyError {
                    group: group.to_string(),
                    kind: kind.to_string(),
                    last_observed,
                });
            }
            sleep(self.poll_interval).await;
        }
    }
}
