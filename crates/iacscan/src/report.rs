//! Scan results
use crate::graph::ResourceInstance;
use crate::rule::{Rule, Severity};
use crate::syntax::{ResourceKey, ResourceMode};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Passed,
    Failed,
    /// the check itself failed (returned an error or panicked)
    EvaluationError,
}

impl Display for ResultStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ResultStatus::Passed => "PASSED",
            ResultStatus::Failed => "FAILED",
            ResultStatus::EvaluationError => "ERROR",
        })
    }
}

/// Outcome of one rule on one block instance
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ScanResult {
    pub rule_code: String,
    pub severity: Severity,
    pub block_type: String,
    pub block_name: String,
    pub mode: ResourceMode,
    pub instance_index: Option<usize>,
    pub status: ResultStatus,
    pub message: Option<String>,
    pub source: Option<PathBuf>,
}

impl ScanResult {
    pub fn new(
        rule: &Rule,
        instance: &ResourceInstance,
        status: ResultStatus,
        message: Option<String>,
    ) -> Self {
        Self {
            rule_code: rule.code.to_string(),
            severity: rule.severity,
            block_type: instance.key.resource_type.clone(),
            block_name: instance.key.name.clone(),
            mode: instance.key.mode,
            instance_index: instance.index,
            status,
            message,
            source: instance.source.clone(),
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.mode, &self.block_type, &self.block_name)
    }

    /// `aws_s3_bucket.logs[0]`
    pub fn address(&self) -> String {
        match self.instance_index {
            Some(index) => format!("{}[{index}]", self.key()),
            None => self.key().to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status != ResultStatus::Passed
    }
}

impl Display for ScanResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<6} {:<8} {} {}",
            self.status,
            self.severity,
            self.rule_code,
            self.address()
        )?;
        if let Some(source) = &self.source {
            write!(f, " ({})", source.display())?;
        }
        if let Some(message) = &self.message {
            write!(f, "\n       {message}")?;
        }
        Ok(())
    }
}

/// Something about the configuration the scanner could not take at face value
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// `count` resolved to a negative number, treated as `0`
    NegativeCount { resource: String, count: f64 },
    /// `count` resolved to something that is not a number, the block is assumed present
    InvalidCount {
        resource: String,
        found: &'static str,
    },
    /// `count` above [MAX_COUNT_INSTANCES](crate::count::MAX_COUNT_INSTANCES), the block is assumed present
    CountTooLarge { resource: String, count: f64 },
    /// `count.index` used in a block without `count`, the attribute is unknown
    CountIndexWithoutCount { resource: String, attribute: String },
}

impl Display for Warning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::NegativeCount { resource, count } => {
                write!(f, "{resource}: negative count {count} treated as 0")
            }
            Warning::InvalidCount { resource, found } => write!(
                f,
                "{resource}: count must be a number, found {found}; assuming the resource exists"
            ),
            Warning::CountTooLarge { resource, count } => write!(
                f,
                "{resource}: count {count} is too large to scan; assuming the resource exists"
            ),
            Warning::CountIndexWithoutCount {
                resource,
                attribute,
            } => write!(
                f,
                "{resource}: `{attribute}` uses count.index but the block has no count"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ScanReport {
    pub results: Vec<ScanResult>,
    pub warnings: Vec<Warning>,
}

impl ScanReport {
    /// Failed results and evaluation errors
    pub fn failures(&self) -> impl Iterator<Item = &ScanResult> {
        self.results.iter().filter(|result| result.is_failure())
    }

    pub fn passed(&self) -> impl Iterator<Item = &ScanResult> {
        self.results
            .iter()
            .filter(|result| result.status == ResultStatus::Passed)
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Codes of all results with `status`, in result order
    pub fn codes_with_status(&self, status: ResultStatus) -> Vec<&str> {
        self.results
            .iter()
            .filter(|result| result.status == status)
            .map(|result| result.rule_code.as_str())
            .collect()
    }

    /// Whether a failure (or evaluation error) with `code` was reported
    pub fn has_failure(&self, code: &str) -> bool {
        self.failures().any(|result| result.rule_code == code)
    }
}
