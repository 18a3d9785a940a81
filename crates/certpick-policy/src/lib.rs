/// Transport status value reported for a successful handshake.
pub const TRANSPORT_SUCCESS: u32 = 0;

/// How a failed transport status bears on the certificate that was offered.
///
/// A `CertificateRejected` status is evidence against the certificate itself
/// and demotes it; a `TransientFailure` carries no such evidence and leaves
/// the certificate eligible for immediate reselection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeClass {
    CertificateRejected,
    TransientFailure,
}

impl OutcomeClass {
    pub fn code(self) -> &'static str {
        match self {
            Self::CertificateRejected => "certificate_rejected",
            Self::TransientFailure => "transient_failure",
        }
    }
}

/// Maps native transport error codes onto the two failover categories.
///
/// The set of codes that indict a certificate is environment-specific, so the
/// mapping is an injected policy rather than a constant of the engine.
pub trait OutcomeClassifier: Send + Sync {
    fn classify(&self, status: u32) -> OutcomeClass;
}

// Transport-layer statuses that implicate the local certificate or the TLS
// machinery around it. Everything else is treated as transient.
//   35 TLS connect error, handshake failed
//   53 crypto engine not found
//   54 cannot set crypto engine as default
//   58 problem with the local certificate
//   59 could not use the specified cipher
//   66 failed to initialize the TLS engine
//   80 failed to shut down the TLS connection
//   83 issuer check failed
//   90 public key does not match pinned public key
//   91 invalid certificate status
const DEFAULT_REJECTION_CODES: [u32; 10] = [35, 53, 54, 58, 59, 66, 80, 83, 90, 91];

/// Table-driven classifier: statuses in the table demote the certificate,
/// everything else is transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeTableClassifier {
    rejection_codes: Vec<u32>,
}

impl CodeTableClassifier {
    /// Builds a classifier from an explicit rejection-code table.
    /// The table is sorted and deduplicated.
    pub fn new(mut rejection_codes: Vec<u32>) -> Self {
        rejection_codes.sort_unstable();
        rejection_codes.dedup();
        Self { rejection_codes }
    }

    /// The default table of TLS-layer transport error codes.
    pub fn transport_default() -> Self {
        Self::new(DEFAULT_REJECTION_CODES.to_vec())
    }

    pub fn rejection_codes(&self) -> &[u32] {
        &self.rejection_codes
    }
}

impl Default for CodeTableClassifier {
    fn default() -> Self {
        Self::transport_default()
    }
}

impl OutcomeClassifier for CodeTableClassifier {
    fn classify(&self, status: u32) -> OutcomeClass {
        if self.rejection_codes.binary_search(&status).is_ok() {
            OutcomeClass::CertificateRejected
        } else {
            OutcomeClass::TransientFailure
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CodeTableClassifier, OutcomeClass, OutcomeClassifier};

    #[test]
    fn outcome_class_codes_are_stable() {
        assert_eq!(
            OutcomeClass::CertificateRejected.code(),
            "certificate_rejected"
        );
        assert_eq!(OutcomeClass::TransientFailure.code(), "transient_failure");
    }

    #[test]
    fn default_table_classifies_every_status_below_two_hundred() {
        let classifier = CodeTableClassifier::transport_default();
        let rejected: Vec<u32> = (0..200)
            .filter(|status| {
                classifier.classify(*status) == OutcomeClass::CertificateRejected
            })
            .collect();
        assert_eq!(rejected, vec![35, 53, 54, 58, 59, 66, 80, 83, 90, 91]);
    }

    #[test]
    fn connection_layer_failure_is_transient() {
        let classifier = CodeTableClassifier::transport_default();
        assert_eq!(classifier.classify(56), OutcomeClass::TransientFailure);
        assert_eq!(classifier.classify(7), OutcomeClass::TransientFailure);
    }

    #[test]
    fn neighbors_of_table_entries_are_transient() {
        let classifier = CodeTableClassifier::transport_default();
        for status in [34, 36, 57, 81, 82, 89, 92] {
            assert_eq!(
                classifier.classify(status),
                OutcomeClass::TransientFailure,
                "status {status} must not demote"
            );
        }
    }

    #[test]
    fn custom_table_overrides_the_default() {
        let classifier = CodeTableClassifier::new(vec![56, 7, 56]);
        assert_eq!(classifier.rejection_codes(), &[7, 56]);
        assert_eq!(
            classifier.classify(56),
            OutcomeClass::CertificateRejected
        );
        assert_eq!(classifier.classify(58), OutcomeClass::TransientFailure);
    }
}
