use certpick_policy::{OutcomeClass, OutcomeClassifier, TRANSPORT_SUCCESS};

use crate::{
    Candidate, CertificateSet, Health, HintDurability, Outcome, RetryAdvice, SelectionError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HealthRecord {
    health: Health,
    last_error_code: Option<u32>,
}

impl HealthRecord {
    const INITIAL: Self = Self {
        health: Health::Unknown,
        last_error_code: None,
    };

    const AVAILABLE: Self = Self {
        health: Health::Available,
        last_error_code: None,
    };
}

/// Per-caller failover state over a shared [`CertificateSet`].
///
/// Each independent session holds its own `SelectionState`; health, the
/// outstanding selection, and the sticky preference are never shared between
/// instances, even when they were built from the same set. Mutation goes
/// through `&mut self`, so a single instance is single-writer by
/// construction; wrap it in a lock to share one instance across threads.
#[derive(Debug, Clone)]
pub struct SelectionState {
    set: CertificateSet,
    records: Vec<HealthRecord>,
    pending: Option<usize>,
    active_hint: Option<usize>,
    hint_durability: HintDurability,
}

impl SelectionState {
    pub fn new(set: CertificateSet) -> Self {
        Self::with_hint_durability(set, HintDurability::OneShot)
    }

    pub fn with_hint_durability(set: CertificateSet, hint_durability: HintDurability) -> Self {
        let records = vec![HealthRecord::INITIAL; set.len()];
        Self {
            set,
            records,
            pending: None,
            active_hint: None,
            hint_durability,
        }
    }

    pub fn set(&self) -> &CertificateSet {
        &self.set
    }

    /// Id of the selection returned by `get` and not yet resolved by `report`.
    pub fn pending_id(&self) -> Option<&str> {
        self.pending
            .map(|index| self.set.specs()[index].id.as_str())
    }

    pub fn health(&self, id: &str) -> Option<Health> {
        self.set.index_of(id).map(|index| self.records[index].health)
    }

    /// Error code recorded by the rejection that demoted `id`, if any.
    pub fn last_error_code(&self, id: &str) -> Option<u32> {
        self.set
            .index_of(id)
            .and_then(|index| self.records[index].last_error_code)
    }

    /// Picks the candidate to offer next.
    ///
    /// Re-reading an unresolved selection returns the same candidate; the
    /// cursor never advances without an intervening `report`. When every
    /// entry is skipped the best-ranked one is offered anyway, so a caller
    /// that keeps trying can never be locked out entirely.
    pub fn get(&mut self) -> Candidate {
        if let Some(index) = self.pending {
            return self.candidate(index);
        }
        let index = self.select_index();
        self.pending = Some(index);
        self.candidate(index)
    }

    fn select_index(&mut self) -> usize {
        let everything_skipped = self
            .records
            .iter()
            .all(|record| record.health == Health::Skipped);

        if let Some(hinted) = self.active_hint {
            if everything_skipped || self.records[hinted].health != Health::Skipped {
                if self.hint_durability == HintDurability::OneShot {
                    self.active_hint = None;
                }
                return hinted;
            }
        }
        if everything_skipped {
            return 0;
        }
        // specs are rank-sorted, so the first non-skipped index is the best rank
        self.records
            .iter()
            .position(|record| record.health != Health::Skipped)
            .unwrap_or(0)
    }

    /// Resolves the outstanding selection with a caller-classified outcome.
    ///
    /// Fails with `InvalidState` and leaves everything unchanged when no
    /// selection is outstanding.
    pub fn report(&mut self, outcome: Outcome) -> Result<RetryAdvice, SelectionError> {
        let Some(index) = self.pending else {
            return Err(SelectionError::InvalidState {
                operation: "report",
            });
        };

        let advice = match outcome {
            Outcome::Success => {
                self.records[index] = HealthRecord::AVAILABLE;
                self.active_hint = Some(index);
                RetryAdvice::Done
            }
            Outcome::Rejected { error_code } => {
                self.records[index] = HealthRecord {
                    health: Health::Skipped,
                    last_error_code: error_code,
                };
                if self.active_hint == Some(index) {
                    self.active_hint = None;
                }
                let another_eligible = self
                    .records
                    .iter()
                    .enumerate()
                    .any(|(other, record)| other != index && record.health != Health::Skipped);
                if another_eligible {
                    RetryAdvice::TryAnother
                } else {
                    RetryAdvice::Done
                }
            }
            Outcome::Transient { .. } => RetryAdvice::Done,
        };
        self.pending = None;
        Ok(advice)
    }

    /// Classifies a raw transport status through the injected policy and
    /// applies it. [`TRANSPORT_SUCCESS`] reports success; statuses the
    /// classifier marks as certificate rejections demote the candidate,
    /// everything else is transient.
    pub fn report_transport(
        &mut self,
        status: u32,
        classifier: &dyn OutcomeClassifier,
    ) -> Result<RetryAdvice, SelectionError> {
        let outcome = if status == TRANSPORT_SUCCESS {
            Outcome::Success
        } else {
            match classifier.classify(status) {
                OutcomeClass::CertificateRejected => Outcome::Rejected {
                    error_code: Some(status),
                },
                OutcomeClass::TransientFailure => Outcome::Transient {
                    error_code: Some(status),
                },
            }
        };
        self.report(outcome)
    }

    /// Externally signalled recovery (renewal, re-provisioning, operator
    /// action). Clears the skip and grants the restored certificate the
    /// sticky preference. No-op when the certificate is not skipped;
    /// unknown ids are surfaced without mutating anything.
    pub fn restore(&mut self, id: &str) -> Result<(), SelectionError> {
        let index = self
            .set
            .index_of(id)
            .ok_or_else(|| SelectionError::UnknownCertificate { id: id.to_string() })?;
        if self.records[index].health == Health::Skipped {
            self.records[index] = HealthRecord::AVAILABLE;
            self.active_hint = Some(index);
        }
        Ok(())
    }

    fn candidate(&self, index: usize) -> Candidate {
        let spec = &self.set.specs()[index];
        Candidate {
            id: spec.id.clone(),
            rank: spec.rank,
        }
    }
}
