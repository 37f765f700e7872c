//! Runs configured check commands and turns their exit status into signals.
//!
//! Each command runs synchronously through `sh -c` in the project root. The
//! child is polled until it exits or its timeout elapses, in which case its
//! whole process group is killed and the check is reported as
//! [`CheckStatus::TimedOut`]. Combined stdout and stderr go to
//! `.sdd/logs/<check>.log`.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{CheckSpec, CheckStatus, GateConfig, Signals};
use crate::error::{Result, SddError};
use crate::store::SDD_DIR;

const LOG_DIR: &str = "logs";

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const REAP_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of running one check command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRun {
    pub name: String,
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub elapsed_ms: u64,
    pub log_path: PathBuf,
}

/// Run every configured check that has a command and is not already in
/// `reported`. Checks without a command are left to the caller.
///
/// # Errors
///
/// Returns [`SddError::Io`] if the log directory or a log file cannot be
/// created or the shell cannot be spawned.
#[instrument(skip(config, reported), fields(root = %project_root.display()))]
pub fn run_checks(
    config: &GateConfig,
    project_root: &Path,
    reported: &Signals,
) -> Result<Vec<CheckRun>> {
    let log_dir = project_root.join(SDD_DIR).join(LOG_DIR);
    let mut runs = Vec::new();

    for spec in &config.checks {
        if reported.contains_key(&spec.name) {
            tracing::debug!(check = %spec.name, "signal supplied by caller, not running");
            continue;
        }
        let Some(command) = spec.command.as_deref() else {
            continue;
        };
        fs::create_dir_all(&log_dir).map_err(|source| SddError::Io {
            path: log_dir.clone(),
            source,
        })?;
        runs.push(run_one(spec, command, config.timeout_for(spec), project_root, &log_dir)?);
    }

    Ok(runs)
}

/// Caller-reported signals, with runner results filling in the rest.
#[must_use]
pub fn merge_signals(runs: &[CheckRun], reported: &Signals) -> Signals {
    let mut merged: Signals = runs.iter().map(|r| (r.name.clone(), r.status)).collect();
    merged.extend(reported.iter().map(|(k, v)| (k.clone(), *v)));
    merged
}

fn run_one(
    spec: &CheckSpec,
    command: &str,
    timeout: Duration,
    root: &Path,
    log_dir: &Path,
) -> Result<CheckRun> {
    let log_path = log_dir.join(format!("{}.log", log_file_stem(&spec.name)));
    let stdout = File::create(&log_path).map_err(io_err(&log_path))?;
    let stderr = stdout.try_clone().map_err(io_err(&log_path))?;

    tracing::info!(check = %spec.name, command, ?timeout, "running quality check");
    let start = Instant::now();
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr);
    // New group so a timeout reaches everything the command spawned.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    let mut child = cmd.spawn().map_err(io_err(root))?;

    let waited = wait_with_timeout(&mut child, timeout).map_err(io_err(root))?;
    let elapsed = start.elapsed();

    let (status, exit_code) = match waited {
        Some(exit) if exit.success() => (CheckStatus::Pass, exit.code()),
        Some(exit) => (CheckStatus::Fail, exit.code()),
        None => {
            tracing::warn!(check = %spec.name, ?timeout, "quality check timed out, killed");
            (CheckStatus::TimedOut, None)
        }
    };
    tracing::debug!(check = %spec.name, %status, ?exit_code, ?elapsed, "quality check finished");

    Ok(CheckRun {
        name: spec.name.clone(),
        status,
        exit_code,
        elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        log_path,
    })
}

/// Check names are free-form; keep the log file inside the log directory.
fn log_file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.trim_matches('.').is_empty() {
        "check".to_string()
    } else {
        stem
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SddError {
    let path = path.to_path_buf();
    move |source| SddError::Io { path, source }
}

/// Poll `child` until it exits or `timeout` elapses. `None` means the child
/// was killed.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    kill_process_group(child);
    let reap_deadline = Instant::now() + REAP_TIMEOUT;
    while Instant::now() < reap_deadline {
        if child.try_wait()?.is_some() {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }
    Ok(None)
}

/// SIGKILL the child's process group, falling back to the child alone.
fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let group_killed = i32::try_from(child.id())
            .ok()
            .is_some_and(|pid| killpg(Pid::from_raw(pid), Signal::SIGKILL).is_ok());
        if group_killed {
            return;
        }
    }
    let _ = child.kill();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(checks: Vec<CheckSpec>) -> GateConfig {
        GateConfig::with_checks(checks)
    }

    #[test]
    fn exit_status_maps_to_signal() {
        let root = tempfile::tempdir().unwrap();
        let cfg = config(vec![
            CheckSpec::required("ok").with_command("true"),
            CheckSpec::required("bad").with_command("exit 3"),
            CheckSpec::required("manual"),
        ]);

        let runs = run_checks(&cfg, root.path(), &Signals::new()).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].status, CheckStatus::Pass);
        assert_eq!(runs[1].status, CheckStatus::Fail);
        assert_eq!(runs[1].exit_code, Some(3));
    }

    #[test]
    fn slow_command_is_killed_and_timed_out() {
        let root = tempfile::tempdir().unwrap();
        let mut spec = CheckSpec::required("slow").with_command("sleep 5");
        spec.timeout_secs = Some(0);
        let cfg = config(vec![spec]);

        let started = Instant::now();
        let runs = run_checks(&cfg, root.path(), &Signals::new()).unwrap();
        assert_eq!(runs[0].status, CheckStatus::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_processes_spawned_by_the_check() {
        let root = tempfile::tempdir().unwrap();
        let marker = root.path().join("marker");
        let mut spec = CheckSpec::required("spawns").with_command("(sleep 1; touch marker); true");
        spec.timeout_secs = Some(0);
        let cfg = config(vec![spec]);

        let runs = run_checks(&cfg, root.path(), &Signals::new()).unwrap();
        assert_eq!(runs[0].status, CheckStatus::TimedOut);

        thread::sleep(Duration::from_secs(2));
        assert!(!marker.exists(), "subshell outlived the timed-out check");
    }

    #[test]
    fn check_names_are_safe_log_file_names() {
        assert_eq!(log_file_stem("tests"), "tests");
        assert_eq!(log_file_stem("lint/clippy"), "lint_clippy");
        assert_eq!(log_file_stem(".."), "check");

        let root = tempfile::tempdir().unwrap();
        let cfg = config(vec![CheckSpec::required("unit/fast").with_command("true")]);
        let runs = run_checks(&cfg, root.path(), &Signals::new()).unwrap();
        assert_eq!(runs[0].status, CheckStatus::Pass);
        assert_eq!(
            runs[0].log_path,
            root.path().join(SDD_DIR).join(LOG_DIR).join("unit_fast.log")
        );
    }

    #[test]
    fn output_is_captured_in_log() {
        let root = tempfile::tempdir().unwrap();
        let cfg = config(vec![CheckSpec::required("echo").with_command("echo hello; echo oops >&2")]);

        let runs = run_checks(&cfg, root.path(), &Signals::new()).unwrap();
        let log = fs::read_to_string(&runs[0].log_path).unwrap();
        assert!(log.contains("hello"));
        assert!(log.contains("oops"));
    }

    #[test]
    fn caller_signals_override_runner() {
        let root = tempfile::tempdir().unwrap();
        let cfg = config(vec![
            CheckSpec::required("tests").with_command("exit 1"),
            CheckSpec::required("lint").with_command("exit 1"),
        ]);
        let mut reported = Signals::new();
        reported.insert("tests".into(), CheckStatus::Pass);

        let runs = run_checks(&cfg, root.path(), &reported).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].name, "lint");

        let merged = merge_signals(&runs, &reported);
        assert_eq!(merged["tests"], CheckStatus::Pass);
        assert_eq!(merged["lint"], CheckStatus::Fail);
    }
}
