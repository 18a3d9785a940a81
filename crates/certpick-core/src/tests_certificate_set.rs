use super::{CertificateSet, CertificateSpec, Health, SelectionError};

fn spec(id: &str, rank: u16) -> CertificateSpec {
    CertificateSpec {
        id: id.to_string(),
        rank,
    }
}

#[test]
fn empty_set_is_rejected_at_construction() {
    let error = CertificateSet::new(Vec::new()).expect_err("empty set");
    assert_eq!(error, SelectionError::EmptyCertificateSet);
    assert_eq!(error.code(), "empty_certificate_set");
}

#[test]
fn duplicate_ids_are_rejected() {
    let error = CertificateSet::new(vec![spec("a", 0), spec("a", 1)]).expect_err("dup id");
    assert_eq!(
        error,
        SelectionError::DuplicateCertificateId {
            id: "a".to_string()
        }
    );
}

#[test]
fn tied_ranks_are_rejected() {
    let error = CertificateSet::new(vec![spec("a", 3), spec("b", 3)]).expect_err("dup rank");
    assert_eq!(error, SelectionError::DuplicateRank { rank: 3 });
}

#[test]
fn specs_are_sorted_by_rank_regardless_of_input_order() {
    let set = CertificateSet::new(vec![spec("c", 7), spec("a", 1), spec("b", 4)]).expect("set");
    let ids: Vec<&str> = set.specs().iter().map(|spec| spec.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(set.index_of("b"), Some(1));
    assert!(set.contains("c"));
    assert!(!set.contains("d"));
}

#[test]
fn from_ranked_ids_assigns_ranks_by_position() {
    let set = CertificateSet::from_ranked_ids(["first", "second"]).expect("set");
    assert_eq!(set.len(), 2);
    assert_eq!(set.specs()[0].rank, 0);
    assert_eq!(set.specs()[1].rank, 1);
}

#[test]
fn health_codes_are_stable() {
    assert_eq!(Health::Unknown.code(), "unknown");
    assert_eq!(Health::Available.code(), "available");
    assert_eq!(Health::Skipped.code(), "skipped");
}
