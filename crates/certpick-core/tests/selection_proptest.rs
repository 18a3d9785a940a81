use certpick_core::{CertificateSet, Health, Outcome, SelectionState};
use proptest::prelude::*;

const IDS: [&str; 4] = ["a", "b", "c", "d"];

fn outcome_strategy() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        Just(Outcome::Success),
        proptest::option::of(1_u32..120).prop_map(|error_code| Outcome::Rejected { error_code }),
        proptest::option::of(1_u32..120).prop_map(|error_code| Outcome::Transient { error_code }),
    ]
}

fn fresh_state() -> SelectionState {
    let set = CertificateSet::from_ranked_ids(IDS).expect("valid certificate set");
    SelectionState::new(set)
}

proptest! {
    #[test]
    fn get_never_offers_a_skipped_candidate_while_another_is_eligible(
        outcomes in proptest::collection::vec(outcome_strategy(), 0..64),
    ) {
        let mut state = fresh_state();
        for outcome in outcomes {
            let candidate = state.get();
            let everything_skipped = IDS
                .iter()
                .all(|id| state.health(id) == Some(Health::Skipped));
            if !everything_skipped {
                prop_assert_ne!(
                    state.health(&candidate.id),
                    Some(Health::Skipped),
                    "offered skipped candidate {} with eligible entries left",
                    candidate.id
                );
            }
            state.report(outcome).expect("selection is outstanding");
        }
    }

    #[test]
    fn double_get_is_idempotent_after_any_history(
        outcomes in proptest::collection::vec(outcome_strategy(), 0..32),
    ) {
        let mut state = fresh_state();
        for outcome in outcomes {
            state.get();
            state.report(outcome).expect("selection is outstanding");
        }
        let first = state.get();
        let second = state.get();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn a_rejected_candidate_is_not_reoffered_next(
        outcomes in proptest::collection::vec(outcome_strategy(), 0..32),
    ) {
        let mut state = fresh_state();
        for outcome in outcomes {
            let candidate = state.get();
            state.report(outcome).expect("selection is outstanding");
            if matches!(outcome, Outcome::Rejected { .. }) {
                let everything_skipped = IDS
                    .iter()
                    .all(|id| state.health(id) == Some(Health::Skipped));
                if !everything_skipped {
                    prop_assert_ne!(state.get().id.clone(), candidate.id);
                    state
                        .report(Outcome::Transient { error_code: None })
                        .expect("selection is outstanding");
                }
            }
        }
    }

    #[test]
    fn sibling_states_never_observe_each_others_mutations(
        outcomes in proptest::collection::vec(outcome_strategy(), 1..32),
    ) {
        let set = CertificateSet::from_ranked_ids(IDS).expect("valid certificate set");
        let mut driven = SelectionState::new(set.clone());
        let mut untouched = SelectionState::new(set);

        for outcome in outcomes {
            driven.get();
            driven.report(outcome).expect("selection is outstanding");
        }

        for id in IDS {
            prop_assert_eq!(untouched.health(id), Some(Health::Unknown));
        }
        prop_assert_eq!(untouched.get().id.clone(), "a");
    }
}
