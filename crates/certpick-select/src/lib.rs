//! File-backed certificate selection.
//!
//! [`CertSelector`] binds the pure selection engine to a certificate
//! manifest, a credential store, and the filesystem: picking skips
//! certificates whose files or passphrases are unavailable, rejections
//! record the certificate file's modification time, and a later change to
//! that file counts as the restoration signal. [`CertLocator`] is the
//! one-shot lookup sibling with no failover memory.

use certpick_config::ConfigError;
use certpick_core::SelectionError;
use certpick_creds::CredentialError;
use thiserror::Error;

mod locator;
mod selector;

pub use locator::{CertLocator, LocatedCert};
pub use selector::{CertSelector, PickedCert};

#[derive(Debug, Error)]
pub enum SelectError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("no usable certificate left in group {group}")]
    NoUsableCertificate { group: String },
    #[error("certificate reference {reference:?} is empty or contains a delimiter")]
    BadReference { reference: String },
    #[error("no manifest entry for certificate reference {reference}")]
    UnknownReference { reference: String },
    #[error("certificate file for {uri} is missing")]
    CertificateFileMissing { uri: String },
}
