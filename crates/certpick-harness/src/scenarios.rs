use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, ensure, Context, Result};
use certpick_config::SelectorSettings;
use certpick_core::{Outcome, RetryAdvice};
use certpick_creds::MemoryCredentialStore;
use certpick_select::{CertSelector, SelectError};

pub const SEQUENCE_COUNT: u32 = 8;

// transport statuses used by the scripted handshakes
const REJECT_STATUS: u32 = 58;
const TRANSIENT_STATUS: u32 = 56;
const SUCCESS_STATUS: u32 = 0;

const ENDPOINT: &str = "https://harness.invalid/sequence";
const ENGINE: &str = "e4tstdef";

const SEQUENCE_SUMMARIES: [&str; SEQUENCE_COUNT as usize] = [
    "first rejected, second takes over and stays selected",
    "second bad while first recovers, then first fails into third",
    "first rejected then renewed, regaining priority",
    "first missing and second rejected, staged restoration",
    "a network error does not demote the active certificate",
    "first and second rejected, third carries until first renews",
    "two parallel selectors never share health state",
    "double get is idempotent, double report is an error",
];

pub fn run_all() -> Result<()> {
    for sequence in 1..=SEQUENCE_COUNT {
        run_sequence(sequence)?;
    }
    Ok(())
}

pub fn run_sequence(sequence: u32) -> Result<()> {
    let summary = SEQUENCE_SUMMARIES
        .get((sequence as usize).wrapping_sub(1))
        .copied()
        .unwrap_or("unknown sequence");
    tracing::info!(sequence, summary, "running");

    let workspace = Workspace::new(sequence).context("failed to set up scratch workspace")?;
    let result = match sequence {
        1 => sequence_1(&workspace),
        2 => sequence_2(&workspace),
        3 => sequence_3(&workspace),
        4 => sequence_4(&workspace),
        5 => sequence_5(&workspace),
        6 => sequence_6(&workspace),
        7 => sequence_7(&workspace),
        8 => sequence_8(&workspace),
        _ => bail!("sequence {sequence} is not defined"),
    };
    result.with_context(|| format!("sequence {sequence} failed ({summary})"))?;
    tracing::info!(sequence, "passed");
    Ok(())
}

// first goes bad, uses second; next try skips first
fn sequence_1(workspace: &Workspace) -> Result<()> {
    let mut selector = workspace.selector("group1")?;
    workspace.drive(&mut selector, REJECT_STATUS, "first.pem", "pc1pass", RetryAdvice::TryAnother)?;
    workspace.drive(&mut selector, SUCCESS_STATUS, "second.pem", "pc2pass", RetryAdvice::Done)?;
    workspace.drive(&mut selector, SUCCESS_STATUS, "second.pem", "pc2pass", RetryAdvice::Done)?;
    Ok(())
}

// second goes bad while first is absent; first reappears and is used until
// it fails too, then the third carries while both stay skipped
fn sequence_2(workspace: &Workspace) -> Result<()> {
    let mut selector = workspace.selector("group1")?;
    workspace.remove("first.pem")?;
    workspace.drive(&mut selector, REJECT_STATUS, "second.pem", "pc2pass", RetryAdvice::TryAnother)?;
    workspace.recreate("first.pem")?;
    workspace.drive(&mut selector, SUCCESS_STATUS, "first.pem", "pc1pass", RetryAdvice::Done)?;
    workspace.drive(&mut selector, REJECT_STATUS, "first.pem", "pc1pass", RetryAdvice::TryAnother)?;
    workspace.drive(&mut selector, SUCCESS_STATUS, "third.pem", "pc3pass", RetryAdvice::Done)?;
    workspace.drive(&mut selector, SUCCESS_STATUS, "third.pem", "pc3pass", RetryAdvice::Done)?;
    Ok(())
}

// first goes bad, uses second; first renewed, preferred again
fn sequence_3(workspace: &Workspace) -> Result<()> {
    let mut selector = workspace.selector("group1")?;
    workspace.drive(&mut selector, REJECT_STATUS, "first.pem", "pc1pass", RetryAdvice::TryAnother)?;
    workspace.drive(&mut selector, SUCCESS_STATUS, "second.pem", "pc2pass", RetryAdvice::Done)?;
    workspace.bump_mtime("first.pem")?;
    workspace.drive(&mut selector, SUCCESS_STATUS, "first.pem", "pc1pass", RetryAdvice::Done)?;
    workspace.drive(&mut selector, SUCCESS_STATUS, "first.pem", "pc1pass", RetryAdvice::Done)?;
    Ok(())
}

// first missing and second bad, uses third; second renewed, used while the
// first is still skipped; first renewed, regains priority
fn sequence_4(workspace: &Workspace) -> Result<()> {
    let mut selector = workspace.selector("group1")?;
    workspace.remove("first.pem")?;
    workspace.drive(&mut selector, REJECT_STATUS, "second.pem", "pc2pass", RetryAdvice::TryAnother)?;
    workspace.drive(&mut selector, SUCCESS_STATUS, "third.pem", "pc3pass", RetryAdvice::Done)?;
    workspace.bump_mtime("second.pem")?;
    workspace.drive(&mut selector, SUCCESS_STATUS, "second.pem", "pc2pass", RetryAdvice::Done)?;
    workspace.drive(&mut selector, SUCCESS_STATUS, "second.pem", "pc2pass", RetryAdvice::Done)?;
    workspace.recreate("first.pem")?;
    workspace.drive(&mut selector, SUCCESS_STATUS, "first.pem", "pc1pass", RetryAdvice::Done)?;
    workspace.drive(&mut selector, SUCCESS_STATUS, "first.pem", "pc1pass", RetryAdvice::Done)?;
    Ok(())
}

// a connection-layer failure keeps the active certificate eligible
fn sequence_5(workspace: &Workspace) -> Result<()> {
    let mut selector = workspace.selector("group1")?;
    workspace.drive(&mut selector, REJECT_STATUS, "first.pem", "pc1pass", RetryAdvice::TryAnother)?;
    workspace.drive(&mut selector, SUCCESS_STATUS, "second.pem", "pc2pass", RetryAdvice::Done)?;
    workspace.drive(&mut selector, SUCCESS_STATUS, "second.pem", "pc2pass", RetryAdvice::Done)?;
    workspace.drive(&mut selector, TRANSIENT_STATUS, "second.pem", "pc2pass", RetryAdvice::Done)?;
    workspace.drive(&mut selector, TRANSIENT_STATUS, "second.pem", "pc2pass", RetryAdvice::Done)?;
    workspace.drive(&mut selector, SUCCESS_STATUS, "second.pem", "pc2pass", RetryAdvice::Done)?;
    workspace.drive(&mut selector, SUCCESS_STATUS, "second.pem", "pc2pass", RetryAdvice::Done)?;
    Ok(())
}

// first and second go bad, third carries; first renewed, used again
fn sequence_6(workspace: &Workspace) -> Result<()> {
    let mut selector = workspace.selector("group1")?;
    workspace.drive(&mut selector, REJECT_STATUS, "first.pem", "pc1pass", RetryAdvice::TryAnother)?;
    workspace.drive(&mut selector, REJECT_STATUS, "second.pem", "pc2pass", RetryAdvice::TryAnother)?;
    workspace.drive(&mut selector, SUCCESS_STATUS, "third.pem", "pc3pass", RetryAdvice::Done)?;
    workspace.bump_mtime("first.pem")?;
    workspace.drive(&mut selector, SUCCESS_STATUS, "first.pem", "pc1pass", RetryAdvice::Done)?;
    Ok(())
}

// two selectors run interleaved; failover on one never leaks into the other
fn sequence_7(workspace: &Workspace) -> Result<()> {
    let mut one = workspace.selector("group1")?;
    let mut two = workspace.selector("group2")?;
    workspace.drive(&mut one, REJECT_STATUS, "first.pem", "pc1pass", RetryAdvice::TryAnother)?;
    workspace.drive(&mut one, SUCCESS_STATUS, "second.pem", "pc2pass", RetryAdvice::Done)?;
    workspace.drive(&mut one, SUCCESS_STATUS, "second.pem", "pc2pass", RetryAdvice::Done)?;
    workspace.drive(&mut two, SUCCESS_STATUS, "alpha.pem", "pcalphapass", RetryAdvice::Done)?;
    workspace.drive(&mut two, SUCCESS_STATUS, "alpha.pem", "pcalphapass", RetryAdvice::Done)?;
    workspace.drive(&mut one, SUCCESS_STATUS, "second.pem", "pc2pass", RetryAdvice::Done)?;
    workspace.drive(&mut two, SUCCESS_STATUS, "alpha.pem", "pcalphapass", RetryAdvice::Done)?;
    Ok(())
}

// two consecutive picks return the same certificate; a second report with
// no pick in between fails loudly and changes nothing
fn sequence_8(workspace: &Workspace) -> Result<()> {
    let mut selector = workspace.selector("group1")?;

    let first = selector.pick()?;
    let again = selector.pick()?;
    ensure!(
        first.id == again.id && first.uri == again.uri,
        "consecutive picks must return the same certificate"
    );
    let advice = selector.report_transport(SUCCESS_STATUS, ENDPOINT)?;
    ensure!(advice == RetryAdvice::Done, "success must not advise retry");

    match selector.report(Outcome::Success) {
        Err(SelectError::Selection(error)) if error.code() == "invalid_state" => {}
        other => bail!("stale report must fail with invalid_state, got {other:?}"),
    }

    workspace.drive(&mut selector, SUCCESS_STATUS, "first.pem", "pc1pass", RetryAdvice::Done)?;
    Ok(())
}

struct Workspace {
    dir: PathBuf,
    creds: Arc<MemoryCredentialStore>,
}

impl Workspace {
    fn new(sequence: u32) -> Result<Self> {
        let dir = unique_scratch_dir(sequence);
        fs::create_dir_all(&dir).context("create scratch dir")?;
        for name in ["first.pem", "second.pem", "third.pem", "alpha.pem"] {
            fs::write(
                dir.join(name),
                format!("dummy certificate material: {name}\n"),
            )
            .with_context(|| format!("write {name}"))?;
        }
        let manifest = format!(
            "group1,first,MTLS,file://{dir}/first.pem,pc1\n\
             group1,second,MTLS,file://{dir}/second.pem,pc2\n\
             group1,third,MTLS,file://{dir}/third.pem,pc3\n\
             group2,alpha,MTLS,file://{dir}/alpha.pem,pcalpha\n",
            dir = dir.display()
        );
        fs::write(dir.join("manifest.cfg"), manifest).context("write manifest")?;
        fs::write(dir.join("engine.properties"), format!("engine={ENGINE}\n"))
            .context("write engine properties")?;

        let mut creds = MemoryCredentialStore::new();
        creds.insert("pc1", "pc1pass");
        // provisioning tools commonly leave a trailing newline; it must be stripped
        creds.insert("pc2", "pc2pass\n");
        creds.insert("pc3", "pc3pass");
        creds.insert("pcalpha", "pcalphapass");

        Ok(Self {
            dir,
            creds: Arc::new(creds),
        })
    }

    fn selector(&self, group: &str) -> Result<CertSelector> {
        let settings = SelectorSettings {
            manifest_path: self.dir.join("manifest.cfg").display().to_string(),
            engine_hint_path: Some(self.dir.join("engine.properties").display().to_string()),
            group: group.to_string(),
            ..SelectorSettings::default()
        };
        CertSelector::new(settings, self.creds.clone())
            .with_context(|| format!("build selector for {group}"))
    }

    /// One scripted handshake: pick, check what was offered, report the
    /// transport status, check the advice.
    fn drive(
        &self,
        selector: &mut CertSelector,
        status: u32,
        expected_cert: &str,
        expected_pass: &str,
        expected_advice: RetryAdvice,
    ) -> Result<()> {
        let picked = selector.pick().context("pick")?;
        let expected_uri = self.uri(expected_cert);
        ensure!(
            picked.uri == expected_uri,
            "offered {} instead of {expected_uri}",
            picked.uri
        );
        ensure!(
            picked.passphrase.expose() == expected_pass,
            "wrong passphrase for {}",
            picked.id
        );
        ensure!(
            selector.engine_hint() == Some(ENGINE),
            "engine hint mismatch: {:?}",
            selector.engine_hint()
        );
        let advice = selector.report_transport(status, ENDPOINT).context("report")?;
        ensure!(
            advice == expected_advice,
            "status {status} gave {advice:?}, expected {expected_advice:?}"
        );
        Ok(())
    }

    fn uri(&self, name: &str) -> String {
        format!("file://{}/{name}", self.dir.display())
    }

    fn remove(&self, name: &str) -> Result<()> {
        fs::remove_file(self.dir.join(name)).with_context(|| format!("remove {name}"))
    }

    fn recreate(&self, name: &str) -> Result<()> {
        fs::write(
            self.dir.join(name),
            "re-provisioned certificate material\n",
        )
        .with_context(|| format!("recreate {name}"))
    }

    fn bump_mtime(&self, name: &str) -> Result<()> {
        let file = fs::OpenOptions::new()
            .append(true)
            .open(self.dir.join(name))
            .with_context(|| format!("open {name}"))?;
        file.set_modified(SystemTime::now() + Duration::from_secs(2))
            .with_context(|| format!("bump mtime of {name}"))
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

fn unique_scratch_dir(sequence: u32) -> PathBuf {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).expect("clock");
    std::env::temp_dir().join(format!(
        "certpick-harness-{sequence}-{}-{}",
        std::process::id(),
        now.as_nanos()
    ))
}

#[cfg(test)]
mod tests {
    use super::{run_sequence, SEQUENCE_COUNT};

    #[test]
    fn every_sequence_passes() {
        for sequence in 1..=SEQUENCE_COUNT {
            run_sequence(sequence).expect("sequence must pass");
        }
    }
}
