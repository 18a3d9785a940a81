use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use certpick_config::{load_engine_hint, uri_to_path, Manifest, SelectorSettings};
use certpick_core::{CertificateSet, Health, Outcome, RetryAdvice, SelectionState};
use certpick_creds::{CredentialStore, Passphrase};
use certpick_policy::{
    CodeTableClassifier, OutcomeClass, OutcomeClassifier, TRANSPORT_SUCCESS,
};

use crate::SelectError;

/// Filesystem evidence recorded when a certificate is demoted. A later
/// mismatch against the live file is the restoration signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileMark {
    NotMarked,
    /// File was absent when the certificate was skipped.
    Missing,
    /// Modification time observed when the certificate was skipped.
    ModifiedAt(SystemTime),
}

#[derive(Debug)]
struct SelectorEntry {
    uri: String,
    path: PathBuf,
    credential_ref: String,
    mark: FileMark,
}

/// Certificate handed out by [`CertSelector::pick`]. The passphrase buffer
/// is wiped when this value is dropped.
#[derive(Debug)]
pub struct PickedCert {
    pub id: String,
    pub rank: u16,
    pub uri: String,
    pub passphrase: Passphrase,
}

/// One failover session over a manifest group.
///
/// Each instance owns its selection state exclusively; two selectors built
/// from the same manifest never observe each other's health bookkeeping.
pub struct CertSelector {
    group: String,
    state: SelectionState,
    entries: Vec<SelectorEntry>,
    creds: Arc<dyn CredentialStore>,
    classifier: Box<dyn OutcomeClassifier>,
    engine_hint: Option<String>,
}

impl std::fmt::Debug for CertSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertSelector")
            .field("group", &self.group)
            .field("state", &self.state)
            .field("entries", &self.entries)
            .field("creds", &"<dyn CredentialStore>")
            .field("classifier", &"<dyn OutcomeClassifier>")
            .field("engine_hint", &self.engine_hint)
            .finish()
    }
}

impl CertSelector {
    pub fn new(
        settings: SelectorSettings,
        creds: Arc<dyn CredentialStore>,
    ) -> Result<Self, SelectError> {
        let classifier: Box<dyn OutcomeClassifier> = match &settings.rejection_codes {
            Some(codes) => Box::new(CodeTableClassifier::new(codes.clone())),
            None => Box::new(CodeTableClassifier::transport_default()),
        };
        Self::with_classifier(settings, creds, classifier)
    }

    pub fn with_classifier(
        settings: SelectorSettings,
        creds: Arc<dyn CredentialStore>,
        classifier: Box<dyn OutcomeClassifier>,
    ) -> Result<Self, SelectError> {
        settings.validate()?;
        let manifest = Manifest::load(Path::new(&settings.manifest_path))?;
        let engine_hint = match &settings.engine_hint_path {
            Some(path) => load_engine_hint(Path::new(path))?,
            None => None,
        };

        let selected = manifest.entries_for_group(&settings.group)?;
        let set = CertificateSet::from_ranked_ids(
            selected.iter().map(|entry| entry.reference.clone()),
        )?;
        // manifest order equals rank order, so these stay index-aligned
        // with the set's specs
        let entries = selected
            .iter()
            .map(|entry| SelectorEntry {
                uri: entry.uri.clone(),
                path: PathBuf::from(uri_to_path(&entry.uri)),
                credential_ref: entry.credential_ref.clone(),
                mark: FileMark::NotMarked,
            })
            .collect();

        let state = SelectionState::with_hint_durability(set, settings.hint_durability);
        Ok(Self {
            group: settings.group,
            state,
            entries,
            creds,
            classifier,
            engine_hint,
        })
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Crypto engine from the properties file, if one was configured.
    pub fn engine_hint(&self) -> Option<&str> {
        self.engine_hint.as_deref()
    }

    /// Read-only view of the underlying selection state.
    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    /// Picks the next usable certificate and fetches its passphrase.
    ///
    /// Candidates whose certificate file is missing or whose passphrase
    /// cannot be fetched are demoted and the walk continues. Re-picking an
    /// unresolved selection returns the same certificate. Skipped
    /// certificates whose files have appeared or changed since demotion are
    /// restored before the walk starts.
    pub fn pick(&mut self) -> Result<PickedCert, SelectError> {
        self.rescan_restored();

        // one full pass over the set plus the forced-retry candidate
        for _ in 0..=self.entries.len() {
            let candidate = self.state.get();
            let Some(index) = self.state.set().index_of(&candidate.id) else {
                debug_assert!(false, "candidate id must belong to the set");
                break;
            };

            if file_mtime(&self.entries[index].path).is_none() {
                tracing::debug!(
                    certificate = %candidate.id,
                    path = %self.entries[index].path.display(),
                    "certificate file missing, skipping"
                );
                self.entries[index].mark = FileMark::Missing;
                self.state.report(Outcome::Rejected { error_code: None })?;
                continue;
            }

            match self.creds.fetch(&self.entries[index].credential_ref) {
                Ok(passphrase) => {
                    return Ok(PickedCert {
                        id: candidate.id,
                        rank: candidate.rank,
                        uri: self.entries[index].uri.clone(),
                        passphrase,
                    });
                }
                Err(error) => {
                    tracing::warn!(
                        certificate = %candidate.id,
                        error = %error,
                        "credential fetch failed, skipping certificate"
                    );
                    self.entries[index].mark = match file_mtime(&self.entries[index].path) {
                        Some(modified) => FileMark::ModifiedAt(modified),
                        None => FileMark::Missing,
                    };
                    self.state.report(Outcome::Rejected { error_code: None })?;
                }
            }
        }

        Err(SelectError::NoUsableCertificate {
            group: self.group.clone(),
        })
    }

    /// Resolves the outstanding pick with a raw transport status:
    /// [`TRANSPORT_SUCCESS`] is success, statuses in the rejection table
    /// demote the certificate, everything else is transient.
    pub fn report_transport(
        &mut self,
        status: u32,
        endpoint: &str,
    ) -> Result<RetryAdvice, SelectError> {
        let outcome = if status == TRANSPORT_SUCCESS {
            Outcome::Success
        } else {
            match self.classifier.classify(status) {
                OutcomeClass::CertificateRejected => {
                    tracing::warn!(status, endpoint, "transport rejected the offered certificate");
                    Outcome::Rejected {
                        error_code: Some(status),
                    }
                }
                OutcomeClass::TransientFailure => {
                    tracing::debug!(
                        status,
                        endpoint,
                        "transient transport failure, certificate stays eligible"
                    );
                    Outcome::Transient {
                        error_code: Some(status),
                    }
                }
            }
        };
        self.report(outcome)
    }

    /// Resolves the outstanding pick with a pre-classified outcome.
    pub fn report(&mut self, outcome: Outcome) -> Result<RetryAdvice, SelectError> {
        if matches!(outcome, Outcome::Rejected { .. }) {
            let pending = self
                .state
                .pending_id()
                .and_then(|id| self.state.set().index_of(id));
            if let Some(index) = pending {
                self.entries[index].mark = match file_mtime(&self.entries[index].path) {
                    Some(modified) => FileMark::ModifiedAt(modified),
                    None => FileMark::Missing,
                };
            }
        }
        Ok(self.state.report(outcome)?)
    }

    /// Explicit out-of-band restoration signal for one certificate.
    pub fn restore(&mut self, id: &str) -> Result<(), SelectError> {
        self.state.restore(id)?;
        if let Some(index) = self.state.set().index_of(id) {
            self.entries[index].mark = FileMark::NotMarked;
        }
        Ok(())
    }

    /// Restores skipped certificates whose files have appeared or changed
    /// since they were demoted. Runs in reverse rank order so the
    /// best-ranked recovered certificate ends up holding the preference.
    fn rescan_restored(&mut self) {
        for index in (0..self.entries.len()).rev() {
            let id = self.state.set().specs()[index].id.clone();
            if self.state.health(&id) != Some(Health::Skipped) {
                continue;
            }
            let recovered = match (self.entries[index].mark, file_mtime(&self.entries[index].path))
            {
                (FileMark::Missing, Some(_)) => true,
                (FileMark::ModifiedAt(marked), Some(current)) => current != marked,
                _ => false,
            };
            if recovered {
                tracing::debug!(certificate = %id, "certificate file changed, restoring");
                self.entries[index].mark = FileMark::NotMarked;
                if self.state.restore(&id).is_err() {
                    debug_assert!(false, "restored id must belong to the set");
                }
            }
        }
    }
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|metadata| metadata.modified()).ok()
}
