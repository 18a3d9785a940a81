//! Credential retrieval for certpick.
//!
//! Certificates in the manifest name their passphrase by reference; a
//! [`CredentialStore`] resolves that reference to a [`Passphrase`]. The
//! passphrase buffer is wiped when dropped and never appears in `Debug`
//! output.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::ptr;
use std::sync::atomic::{compiler_fence, Ordering};

use thiserror::Error;

/// Passphrases larger than this are treated as corrupt credential data.
pub const MAX_PASSPHRASE_LEN: usize = 256;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential reference {reference} not found")]
    NotFound { reference: String },
    #[error("credential {reference} is not valid UTF-8")]
    NotUtf8 { reference: String },
    #[error("credential {reference} exceeds the passphrase size limit")]
    TooLarge { reference: String },
    #[error("failed to read credential {reference}: {source}")]
    Io {
        reference: String,
        #[source]
        source: std::io::Error,
    },
}

/// A certificate passphrase. The buffer is zeroed on drop.
pub struct Passphrase {
    bytes: Vec<u8>,
}

impl Passphrase {
    /// Wraps a passphrase value, stripping one trailing newline if present.
    /// Credential payloads commonly carry one from their provisioning tool.
    pub fn new(value: String) -> Self {
        let mut bytes = value.into_bytes();
        if bytes.last() == Some(&b'\n') {
            bytes.pop();
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
        }
        Self { bytes }
    }

    pub fn expose(&self) -> &str {
        // constructed from a String and only ever truncated at newline bytes
        std::str::from_utf8(&self.bytes).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Drop for Passphrase {
    fn drop(&mut self) {
        for byte in self.bytes.iter_mut() {
            // volatile so the wipe is not optimized away
            unsafe { ptr::write_volatile(byte, 0) };
        }
        compiler_fence(Ordering::SeqCst);
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(*****)")
    }
}

/// Resolves credential references to passphrases.
pub trait CredentialStore: Send + Sync {
    fn fetch(&self, reference: &str) -> Result<Passphrase, CredentialError>;
}

/// Reads credentials from `<root>/<reference>`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    root: PathBuf,
}

impl FileCredentialStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl CredentialStore for FileCredentialStore {
    fn fetch(&self, reference: &str) -> Result<Passphrase, CredentialError> {
        let path = self.root.join(reference);
        let bytes = fs::read(&path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => CredentialError::NotFound {
                reference: reference.to_string(),
            },
            _ => CredentialError::Io {
                reference: reference.to_string(),
                source,
            },
        })?;
        if bytes.len() > MAX_PASSPHRASE_LEN {
            return Err(CredentialError::TooLarge {
                reference: reference.to_string(),
            });
        }
        let value = String::from_utf8(bytes).map_err(|_| CredentialError::NotUtf8 {
            reference: reference.to_string(),
        })?;
        Ok(Passphrase::new(value))
    }
}

/// In-memory store backing tests and the scenario harness.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    entries: HashMap<String, String>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(reference.into(), value.into());
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn fetch(&self, reference: &str) -> Result<Passphrase, CredentialError> {
        let value = self
            .entries
            .get(reference)
            .ok_or_else(|| CredentialError::NotFound {
                reference: reference.to_string(),
            })?;
        if value.len() > MAX_PASSPHRASE_LEN {
            return Err(CredentialError::TooLarge {
                reference: reference.to_string(),
            });
        }
        Ok(Passphrase::new(value.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::{
        CredentialError, CredentialStore, FileCredentialStore, MemoryCredentialStore, Passphrase,
        MAX_PASSPHRASE_LEN,
    };

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).expect("clock");
        std::env::temp_dir().join(format!(
            "{prefix}-{}-{}",
            std::process::id(),
            now.as_nanos()
        ))
    }

    #[test]
    fn passphrase_strips_one_trailing_newline() {
        assert_eq!(Passphrase::new("pc2pass\n".to_string()).expose(), "pc2pass");
        assert_eq!(
            Passphrase::new("pc2pass\r\n".to_string()).expose(),
            "pc2pass"
        );
        assert_eq!(Passphrase::new("pc1pass".to_string()).expose(), "pc1pass");
    }

    #[test]
    fn passphrase_debug_is_redacted() {
        let passphrase = Passphrase::new("supersecret".to_string());
        assert_eq!(format!("{passphrase:?}"), "Passphrase(*****)");
    }

    #[test]
    fn file_store_reads_and_classifies_errors() {
        let dir = unique_temp_dir("certpick-creds");
        fs::create_dir_all(&dir).expect("create temp dir");
        fs::write(dir.join("pc1"), "pc1pass\n").expect("write credential");
        fs::write(dir.join("huge"), "x".repeat(MAX_PASSPHRASE_LEN + 1)).expect("write credential");

        let store = FileCredentialStore::new(&dir);
        assert_eq!(store.fetch("pc1").expect("pc1").expose(), "pc1pass");
        assert!(matches!(
            store.fetch("absent"),
            Err(CredentialError::NotFound { .. })
        ));
        assert!(matches!(
            store.fetch("huge"),
            Err(CredentialError::TooLarge { .. })
        ));

        fs::remove_dir_all(&dir).expect("cleanup temp dir");
    }

    #[test]
    fn memory_store_round_trips() {
        let mut store = MemoryCredentialStore::new();
        store.insert("pc1", "pc1pass");
        assert_eq!(store.fetch("pc1").expect("pc1").expose(), "pc1pass");
        assert!(matches!(
            store.fetch("pc2"),
            Err(CredentialError::NotFound { .. })
        ));
    }
}
