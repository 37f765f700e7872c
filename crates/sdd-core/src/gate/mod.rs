//! Quality gate: admission control for the `completed` transition.
//!
//! [`evaluate`] folds a map of check results ([`Signals`]) into one
//! [`Verdict`] using the configured [`CheckSpec`]s. It is pure and performs no
//! remediation. [`runner`] executes configured shell commands to produce
//! signals for checks the caller did not report.

#![allow(clippy::module_name_repetitions)]

pub mod runner;

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::model::item::ParseEnumError;

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Result reported for one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
    TimedOut,
}

impl CheckStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Skipped => "skipped",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pass" | "passed" => Ok(Self::Pass),
            "fail" | "failed" => Ok(Self::Fail),
            "skip" | "skipped" => Ok(Self::Skipped),
            "timed_out" | "timeout" => Ok(Self::TimedOut),
            _ => Err(ParseEnumError {
                expected: "check status",
                got: s.to_string(),
            }),
        }
    }
}

/// Check name to reported status.
pub type Signals = BTreeMap<String, CheckStatus>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// One configured check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckSpec {
    pub name: String,
    /// Shell command run by [`runner::run_checks`]. Without one the signal
    /// must come from the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl CheckSpec {
    #[must_use]
    pub fn required(name: &str) -> Self {
        Self {
            name: name.to_string(),
            command: None,
            required: true,
            timeout_secs: None,
        }
    }

    #[must_use]
    pub fn optional(name: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name)
        }
    }

    #[must_use]
    pub fn with_command(mut self, command: &str) -> Self {
        self.command = Some(command.to_string());
        self
    }
}

/// The `[quality_gates]` config section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateConfig {
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
    #[serde(default = "default_checks")]
    pub checks: Vec<CheckSpec>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout_secs(),
            checks: default_checks(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Optional,
}

impl GateConfig {
    /// A config with exactly these checks.
    #[must_use]
    pub fn with_checks(checks: Vec<CheckSpec>) -> Self {
        Self {
            default_timeout_secs: default_timeout_secs(),
            checks,
        }
    }

    #[must_use]
    pub fn check(&self, name: &str) -> Option<&CheckSpec> {
        self.checks.iter().find(|c| c.name == name)
    }

    /// Unconfigured names are required.
    #[must_use]
    pub fn requirement(&self, name: &str) -> Requirement {
        match self.check(name) {
            Some(spec) if !spec.required => Requirement::Optional,
            _ => Requirement::Required,
        }
    }

    #[must_use]
    pub fn timeout_for(&self, spec: &CheckSpec) -> Duration {
        Duration::from_secs(spec.timeout_secs.unwrap_or(self.default_timeout_secs))
    }
}

const fn default_true() -> bool {
    true
}

const fn default_timeout_secs() -> u64 {
    300
}

fn default_checks() -> Vec<CheckSpec> {
    vec![
        CheckSpec::required("tests"),
        CheckSpec::required("lint"),
        CheckSpec::required("acceptance_criteria"),
        CheckSpec::optional("coverage"),
    ]
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Why a check counted against the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The check reported `fail`.
    Failed,
    /// A required check reported nothing.
    Missing,
    /// The check did not finish within its timeout.
    TimedOut,
    /// A required check reported `skipped`.
    Skipped,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Failed => "failed",
            Self::Missing => "missing",
            Self::TimedOut => "timed_out",
            Self::Skipped => "skipped",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailingCheck {
    pub name: String,
    pub reason: FailureReason,
}

/// Aggregate gate result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    /// Required checks that did not pass, in config order then by name.
    pub failing_checks: Vec<FailingCheck>,
    /// Optional checks that failed or timed out.
    pub warnings: Vec<FailingCheck>,
}

impl Verdict {
    #[must_use]
    pub fn failing_names(&self) -> Vec<&str> {
        self.failing_checks.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Combine `signals` into a verdict under `config`.
///
/// The verdict passes iff every required check reports `pass`. `skipped`
/// passes only for optional checks. A required check with no signal fails as
/// [`FailureReason::Missing`]. Signals for unconfigured names are required.
#[must_use]
pub fn evaluate(config: &GateConfig, signals: &Signals) -> Verdict {
    let mut failing_checks = Vec::new();
    let mut warnings = Vec::new();

    let configured: BTreeSet<&str> = config.checks.iter().map(|c| c.name.as_str()).collect();
    let extra = signals
        .keys()
        .filter(|name| !configured.contains(name.as_str()))
        .map(String::as_str);

    let names = config.checks.iter().map(|c| c.name.as_str()).chain(extra);
    for name in names {
        let requirement = config.requirement(name);
        let reason = match (signals.get(name), requirement) {
            (Some(CheckStatus::Pass), _)
            | (Some(CheckStatus::Skipped) | None, Requirement::Optional) => None,
            (Some(CheckStatus::Fail), _) => Some(FailureReason::Failed),
            (Some(CheckStatus::TimedOut), _) => Some(FailureReason::TimedOut),
            (Some(CheckStatus::Skipped), Requirement::Required) => Some(FailureReason::Skipped),
            (None, Requirement::Required) => Some(FailureReason::Missing),
        };

        if let Some(reason) = reason {
            let failing = FailingCheck {
                name: name.to_string(),
                reason,
            };
            match requirement {
                Requirement::Required => failing_checks.push(failing),
                Requirement::Optional => warnings.push(failing),
            }
        }
    }

    let verdict = Verdict {
        passed: failing_checks.is_empty(),
        failing_checks,
        warnings,
    };
    tracing::debug!(
        passed = verdict.passed,
        failing = verdict.failing_checks.len(),
        warnings = verdict.warnings.len(),
        "quality gate evaluated"
    );
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(pairs: &[(&str, CheckStatus)]) -> Signals {
        pairs.iter().map(|(n, s)| ((*n).to_string(), *s)).collect()
    }

    fn three_checks() -> GateConfig {
        GateConfig::with_checks(vec![
            CheckSpec::required("tests"),
            CheckSpec::required("lint"),
            CheckSpec::optional("coverage"),
        ])
    }

    #[test]
    fn all_required_pass() {
        let verdict = evaluate(
            &three_checks(),
            &signals(&[("tests", CheckStatus::Pass), ("lint", CheckStatus::Pass)]),
        );
        assert!(verdict.passed);
        assert!(verdict.failing_checks.is_empty());
        assert!(verdict.warnings.is_empty());
    }

    #[test]
    fn one_required_failing_fails_with_that_check() {
        let verdict = evaluate(
            &three_checks(),
            &signals(&[
                ("tests", CheckStatus::Pass),
                ("lint", CheckStatus::Fail),
                ("coverage", CheckStatus::Pass),
            ]),
        );
        assert!(!verdict.passed);
        assert_eq!(
            verdict.failing_checks,
            vec![FailingCheck {
                name: "lint".into(),
                reason: FailureReason::Failed
            }]
        );
    }

    #[test]
    fn missing_required_signal_fails_as_missing() {
        let verdict = evaluate(&three_checks(), &signals(&[("tests", CheckStatus::Pass)]));
        assert!(!verdict.passed);
        assert_eq!(verdict.failing_checks[0].name, "lint");
        assert_eq!(verdict.failing_checks[0].reason, FailureReason::Missing);
    }

    #[test]
    fn skipped_passes_only_when_optional() {
        let verdict = evaluate(
            &three_checks(),
            &signals(&[
                ("tests", CheckStatus::Skipped),
                ("lint", CheckStatus::Pass),
                ("coverage", CheckStatus::Skipped),
            ]),
        );
        assert!(!verdict.passed);
        assert_eq!(verdict.failing_names(), ["tests"]);
        assert_eq!(verdict.failing_checks[0].reason, FailureReason::Skipped);
        assert!(verdict.warnings.is_empty());
    }

    #[test]
    fn timed_out_has_distinct_reason() {
        let verdict = evaluate(
            &three_checks(),
            &signals(&[("tests", CheckStatus::TimedOut), ("lint", CheckStatus::Pass)]),
        );
        assert!(!verdict.passed);
        assert_eq!(verdict.failing_checks[0].reason, FailureReason::TimedOut);
    }

    #[test]
    fn optional_failure_is_a_warning() {
        let verdict = evaluate(
            &three_checks(),
            &signals(&[
                ("tests", CheckStatus::Pass),
                ("lint", CheckStatus::Pass),
                ("coverage", CheckStatus::Fail),
            ]),
        );
        assert!(verdict.passed);
        assert_eq!(verdict.warnings.len(), 1);
        assert_eq!(verdict.warnings[0].name, "coverage");
    }

    #[test]
    fn unknown_signal_names_are_required() {
        let verdict = evaluate(
            &three_checks(),
            &signals(&[
                ("tests", CheckStatus::Pass),
                ("lint", CheckStatus::Pass),
                ("security_scan", CheckStatus::Fail),
            ]),
        );
        assert!(!verdict.passed);
        assert_eq!(verdict.failing_names(), ["security_scan"]);
    }

    #[test]
    fn empty_config_passes_with_no_signals() {
        let verdict = evaluate(&GateConfig::with_checks(Vec::new()), &Signals::new());
        assert!(verdict.passed);
    }

    #[test]
    fn check_status_parses_cli_forms() {
        assert_eq!("pass".parse::<CheckStatus>().unwrap(), CheckStatus::Pass);
        assert_eq!("timed-out".parse::<CheckStatus>().unwrap(), CheckStatus::TimedOut);
        assert_eq!("SKIPPED".parse::<CheckStatus>().unwrap(), CheckStatus::Skipped);
        assert!("maybe".parse::<CheckStatus>().is_err());
    }
}
