use super::{Outcome, RetryAdvice, SelectionState};

fn ranked_abc() -> SelectionState {
    let set = CertificateSet::from_ranked_ids(["a", "b", "c"]).expect("set");
    SelectionState::new(set)
}

fn reject(state: &mut SelectionState) -> RetryAdvice {
    state
        .report(Outcome::Rejected {
            error_code: Some(58),
        })
        .expect("pending selection")
}

fn succeed(state: &mut SelectionState) {
    assert_eq!(state.report(Outcome::Success), Ok(RetryAdvice::Done));
}

// first goes bad, second takes over and stays selected
#[test]
fn failover_to_second_and_stick_with_it() {
    let mut state = ranked_abc();
    assert_eq!(state.get().id, "a");
    assert_eq!(reject(&mut state), RetryAdvice::TryAnother);
    assert_eq!(state.get().id, "b");
    succeed(&mut state);
    assert_eq!(state.get().id, "b");
    succeed(&mut state);
}

// second goes bad while first recovers, then first fails too and the third
// carries the session, skipping both demoted certificates afterwards
#[test]
fn fall_back_to_first_then_exhaust_into_third() {
    let mut state = ranked_abc();
    assert_eq!(state.get().id, "a");
    reject(&mut state);
    assert_eq!(state.get().id, "b");
    state.restore("a").expect("restore a");
    assert_eq!(reject(&mut state), RetryAdvice::TryAnother);
    assert_eq!(state.get().id, "a");
    assert_eq!(reject(&mut state), RetryAdvice::TryAnother);
    assert_eq!(state.get().id, "c");
    succeed(&mut state);
    assert_eq!(state.get().id, "c");
    succeed(&mut state);
}

// a restored certificate immediately regains preference
#[test]
fn restoration_regains_priority_over_the_active_certificate() {
    let mut state = ranked_abc();
    assert_eq!(state.get().id, "a");
    reject(&mut state);
    assert_eq!(state.get().id, "b");
    succeed(&mut state);
    state.restore("a").expect("restore a");
    assert_eq!(state.get().id, "a");
    succeed(&mut state);
    assert_eq!(state.get().id, "a");
}

// staged recovery: the better-ranked certificate wins only once it is
// itself restored, not when its neighbor is
#[test]
fn staged_restoration_prefers_each_recovered_certificate_in_turn() {
    let mut state = ranked_abc();
    assert_eq!(state.get().id, "a");
    reject(&mut state);
    assert_eq!(state.get().id, "b");
    reject(&mut state);
    assert_eq!(state.get().id, "c");
    succeed(&mut state);

    state.restore("b").expect("restore b");
    assert_eq!(state.get().id, "b", "restored b outranks active c, skips a");
    succeed(&mut state);

    state.restore("a").expect("restore a");
    assert_eq!(state.get().id, "a");
    succeed(&mut state);
    assert_eq!(state.get().id, "a");
}

// report with no outstanding selection must fail and change nothing, even
// right after a successful report
#[test]
fn second_consecutive_report_is_rejected_without_side_effects() {
    let mut state = ranked_abc();
    assert_eq!(state.get().id, "a");
    succeed(&mut state);
    let error = state.report(Outcome::Success).expect_err("stale report");
    assert_eq!(error.code(), "invalid_state");
    assert_eq!(state.get().id, "a");
}
