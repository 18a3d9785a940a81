use std::fs;
use std::path::Path;
use std::sync::Arc;

use certpick_config::{load_engine_hint, uri_to_path, Manifest};
use certpick_creds::{CredentialStore, Passphrase};

use crate::SelectError;

/// Certificate resolved by [`CertLocator::locate`].
#[derive(Debug)]
pub struct LocatedCert {
    pub reference: String,
    pub uri: String,
    pub passphrase: Passphrase,
}

/// One-shot certificate lookup by reference name.
///
/// Unlike [`crate::CertSelector`] the locator keeps no failover memory:
/// every lookup re-reads nothing and re-ranks nothing, it either resolves
/// the reference or fails.
pub struct CertLocator {
    manifest: Manifest,
    creds: Arc<dyn CredentialStore>,
    engine_hint: Option<String>,
}

impl CertLocator {
    pub fn new(
        manifest_path: &Path,
        engine_hint_path: Option<&Path>,
        creds: Arc<dyn CredentialStore>,
    ) -> Result<Self, SelectError> {
        let manifest = Manifest::load(manifest_path)?;
        let engine_hint = match engine_hint_path {
            Some(path) => load_engine_hint(path)?,
            None => None,
        };
        Ok(Self {
            manifest,
            creds,
            engine_hint,
        })
    }

    pub fn engine_hint(&self) -> Option<&str> {
        self.engine_hint.as_deref()
    }

    /// Resolves a manifest entry by its reference field, requiring the
    /// certificate file to exist and the passphrase to be fetchable.
    pub fn locate(&self, reference: &str) -> Result<LocatedCert, SelectError> {
        if reference.is_empty() || reference.contains(',') {
            return Err(SelectError::BadReference {
                reference: reference.to_string(),
            });
        }
        let entry = self
            .manifest
            .entry_for_reference(reference)
            .ok_or_else(|| SelectError::UnknownReference {
                reference: reference.to_string(),
            })?;

        let path = Path::new(uri_to_path(&entry.uri));
        if fs::metadata(path).is_err() {
            return Err(SelectError::CertificateFileMissing {
                uri: entry.uri.clone(),
            });
        }

        let passphrase = self.creds.fetch(&entry.credential_ref)?;
        Ok(LocatedCert {
            reference: entry.reference.clone(),
            uri: entry.uri.clone(),
            passphrase,
        })
    }
}
