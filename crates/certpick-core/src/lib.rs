//! Certificate selection and failover engine.
//!
//! A caller configures an ordered [`CertificateSet`], holds one
//! [`SelectionState`] per independent session, and loops: [`SelectionState::get`]
//! a candidate, attempt the TLS handshake outside this crate, then
//! [`SelectionState::report`] the outcome. Rejected certificates are skipped on
//! later picks until [`SelectionState::restore`] signals recovery. The engine
//! performs no I/O and no cryptography; it is a synchronous state machine.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod selection_state;

pub use selection_state::SelectionState;

/// Immutable identity of one certificate candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSpec {
    pub id: String,
    /// Configured priority; lower is preferred. No ties within a set.
    pub rank: u16,
}

/// Validated, rank-sorted certificate configuration.
///
/// Cloning is cheap and shares the underlying specs; all mutable selection
/// state lives in [`SelectionState`], never here.
#[derive(Debug, Clone)]
pub struct CertificateSet {
    specs: Arc<[CertificateSpec]>,
}

impl CertificateSet {
    pub fn new(mut specs: Vec<CertificateSpec>) -> Result<Self, SelectionError> {
        if specs.is_empty() {
            return Err(SelectionError::EmptyCertificateSet);
        }
        specs.sort_by_key(|spec| spec.rank);
        for pair in specs.windows(2) {
            if pair[0].rank == pair[1].rank {
                return Err(SelectionError::DuplicateRank { rank: pair[0].rank });
            }
        }
        let mut seen = HashSet::new();
        for spec in &specs {
            if !seen.insert(spec.id.as_str()) {
                return Err(SelectionError::DuplicateCertificateId {
                    id: spec.id.clone(),
                });
            }
        }
        Ok(Self {
            specs: specs.into(),
        })
    }

    /// Builds a set from ids in priority order, assigning ranks by position.
    pub fn from_ranked_ids<I, S>(ids: I) -> Result<Self, SelectionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let specs = ids
            .into_iter()
            .enumerate()
            .map(|(position, id)| CertificateSpec {
                id: id.into(),
                rank: position as u16,
            })
            .collect();
        Self::new(specs)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn specs(&self) -> &[CertificateSpec] {
        &self.specs
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.specs.iter().position(|spec| spec.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_of(id).is_some()
    }
}

/// Mutable per-candidate state, owned exclusively by one [`SelectionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// Never attempted since construction or the last reset.
    Unknown,
    /// Last known good.
    Available,
    /// Demoted by a classified rejection; excluded until restored.
    Skipped,
}

impl Health {
    pub fn code(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Available => "available",
            Self::Skipped => "skipped",
        }
    }
}

/// Candidate returned by [`SelectionState::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub rank: u16,
}

/// Caller-classified result of attempting the previously returned candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The certificate itself was refused; demote it until restored.
    Rejected { error_code: Option<u32> },
    /// Failure unrelated to certificate validity (connectivity, timeouts).
    /// Carries no evidence against the certificate, so it stays eligible.
    Transient { error_code: Option<u32> },
}

/// Whether an immediate failover attempt with another certificate is useful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAdvice {
    Done,
    TryAnother,
}

/// How long a sticky preference set by success or restoration survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintDurability {
    /// Consumed by the next `get`.
    #[default]
    OneShot,
    /// Held until the hinted certificate is rejected.
    UntilFailure,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("certificate set must contain at least one entry")]
    EmptyCertificateSet,
    #[error("duplicate certificate id {id}")]
    DuplicateCertificateId { id: String },
    #[error("duplicate certificate rank {rank}")]
    DuplicateRank { rank: u16 },
    #[error("certificate {id} is not part of the configured set")]
    UnknownCertificate { id: String },
    #[error("{operation} requires an outstanding selection")]
    InvalidState { operation: &'static str },
}

impl SelectionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyCertificateSet => "empty_certificate_set",
            Self::DuplicateCertificateId { .. } => "duplicate_certificate_id",
            Self::DuplicateRank { .. } => "duplicate_rank",
            Self::UnknownCertificate { .. } => "unknown_certificate",
            Self::InvalidState { .. } => "invalid_state",
        }
    }
}

#[cfg(test)]
mod tests {
    include!("tests_certificate_set.rs");
    include!("tests_selection_flow.rs");
}
