//! Per-resource apply outcomes and their aggregation.

use crate::error::ApplierError;
use crate::resource::ResourceIdent;

/// What happened to one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyAction {
    Created,
    Updated,
    /// The live object already matched the desired content.
    Unchanged,
    /// Dry run: validated without touching the cluster.
    Validated,
    /// Not attempted, because an earlier failure made it meaningless.
    Skipped,
    Failed,
}

impl std::fmt::Display for ApplyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ApplyAction::Created => "created",
            ApplyAction::Updated => "updated",
            ApplyAction::Unchanged => "unchanged",
            ApplyAction::Validated => "validated",
            ApplyAction::Skipped => "skipped",
            ApplyAction::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Outcome for one resource, in batch order.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub ident: ResourceIdent,
    pub action: ApplyAction,
    pub error: Option<String>,
}

impl ApplyOutcome {
    pub fn ok(ident: ResourceIdent, action: ApplyAction) -> Self {
        Self {
            ident,
            action,
            error: None,
        }
    }

    pub fn failed(ident: ResourceIdent, error: impl Into<String>) -> Self {
        Self {
            ident,
            action: ApplyAction::Failed,
            error: Some(error.into()),
        }
    }

    pub fn skipped(ident: ResourceIdent, reason: impl Into<String>) -> Self {
        Self {
            ident,
            action: ApplyAction::Skipped,
            error: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Ordered outcomes of one apply invocation.
#[derive(Debug, Clone, Default)]
pub struct ApplyResult {
    pub outcomes: Vec<ApplyOutcome>,
}

impl ApplyResult {
    pub fn push(&mut self, outcome: ApplyOutcome) {
        self.outcomes.push(outcome);
    }

    /// True only when every individual outcome succeeded.
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().all(ApplyOutcome::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ApplyOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Collapse into the aggregate success signal: an error naming every
    /// failed resource, or `Ok` when all outcomes succeeded.
    pub fn ensure_success(&self) -> Result<(), ApplierError> {
        if self.succeeded() {
            return Ok(());
        }
        let failed: Vec<&ApplyOutcome> = self.failures().collect();
        let details = failed
            .iter()
            .map(|o| {
                format!(
                    "{}: {}",
                    o.ident,
                    o.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect::<Vec<_>>()
            .join("; ");
        Err(ApplierError::Aggregate {
            failed: failed.len(),
            total: self.outcomes.len(),
            details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> ResourceIdent {
        ResourceIdent {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
            namespace: None,
            name: name.to_string(),
        }
    }

    #[test]
    fn empty_result_succeeds() {
        let result = ApplyResult::default();
        assert!(result.succeeded());
        assert!(result.ensure_success().is_ok());
    }

    #[test]
    fn one_failure_fails_the_aggregate() {
        let mut result = ApplyResult::default();
        result.push(ApplyOutcome::ok(ident("a"), ApplyAction::Created));
        result.push(ApplyOutcome::failed(ident("b"), "boom"));
        result.push(ApplyOutcome::ok(ident("c"), ApplyAction::Unchanged));

        assert!(!result.succeeded());
        assert_eq!(result.failures().count(), 1);
        let err = result.ensure_success().unwrap_err();
        match err {
            ApplierError::Aggregate {
                failed,
                total,
                details,
            } => {
                assert_eq!(failed, 1);
                assert_eq!(total, 3);
                assert!(details.contains("boom"));
                assert!(details.contains('b'));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn skipped_counts_as_failure() {
        let mut result = ApplyResult::default();
        result.push(ApplyOutcome::skipped(ident("a"), "schema never ready"));
        assert!(!result.succeeded());
    }
}
