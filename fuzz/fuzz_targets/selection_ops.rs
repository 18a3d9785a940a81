#![no_main]

use certpick_core::{CertificateSet, Health, Outcome, SelectionState};
use libfuzzer_sys::fuzz_target;

const IDS: [&str; 3] = ["a", "b", "c"];

fuzz_target!(|data: &[u8]| {
    let set = CertificateSet::from_ranked_ids(IDS).expect("fixed set is valid");
    let mut state = SelectionState::new(set);

    for chunk in data.chunks(2) {
        let op = chunk[0] % 5;
        let arg = chunk.get(1).copied().unwrap_or(0);
        match op {
            0 => {
                let candidate = state.get();
                let everything_skipped = IDS
                    .iter()
                    .all(|id| state.health(id) == Some(Health::Skipped));
                assert!(
                    everything_skipped
                        || state.health(&candidate.id) != Some(Health::Skipped),
                    "offered a skipped candidate while another was eligible"
                );
            }
            1 => {
                let _ = state.report(Outcome::Success);
            }
            2 => {
                let _ = state.report(Outcome::Rejected {
                    error_code: Some(arg as u32),
                });
            }
            3 => {
                let _ = state.report(Outcome::Transient {
                    error_code: Some(arg as u32),
                });
            }
            _ => {
                let _ = state.restore(IDS[(arg % 3) as usize]);
            }
        }
    }
});
