//! Rules
//!
//! A [Rule] is plain data: an identity, the block types it applies to and a [Check]. Most checks are declarative
//! attribute tests, [Check::Custom] covers checks that need to look at other instances of the graph.
//!
//! Checks see resolved values only. A value that could not be resolved ([Value::Unknown]) must not be reported as a
//! failure, the declarative checks answer [Status::NotApplicable] instead.
use crate::graph::{ResourceGraph, ResourceInstance};
use crate::syntax::{ResourceKey, ResourceMode};
use crate::value::Value;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Outcome of a single check on a single instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Passed,
    Failed(String),
    /// the check has nothing to say about this instance, no result is reported
    NotApplicable,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        })
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown severity `{0}`, expected one of LOW, MEDIUM, HIGH, CRITICAL")]
pub struct ParseSeverityError(String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

/// Which blocks a rule applies to
#[derive(Debug, Clone, Copy)]
pub enum BlockMatcher {
    /// managed resources of the listed types
    Resource(&'static [&'static str]),
    /// data sources of the listed types
    Data(&'static [&'static str]),
    /// every managed resource
    AnyResource,
}

impl BlockMatcher {
    pub fn matches(&self, key: &ResourceKey) -> bool {
        match self {
            BlockMatcher::Resource(types) => {
                key.mode == ResourceMode::Managed && types.contains(&key.resource_type.as_str())
            }
            BlockMatcher::Data(types) => {
                key.mode == ResourceMode::Data && types.contains(&key.resource_type.as_str())
            }
            BlockMatcher::AnyResource => key.mode == ResourceMode::Managed,
        }
    }
}

/// A constant to compare resolved values against
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expected {
    Bool(bool),
    Str(&'static str),
    Int(i64),
}

impl Expected {
    /// `None` if `value` is not known
    pub fn matches(&self, value: &Value) -> Option<bool> {
        if value.is_unknown() {
            return None;
        }

        Some(match self {
            Expected::Bool(expected) => value.as_bool() == Some(*expected),
            Expected::Str(expected) => value.as_str() == Some(*expected),
            Expected::Int(expected) => value
                .as_number()
                .is_some_and(|number| number.as_f64() == *expected as f64),
        })
    }
}

impl Display for Expected {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Expected::Bool(b) => write!(f, "{b}"),
            Expected::Str(s) => write!(f, "\"{s}\""),
            Expected::Int(i) => write!(f, "{i}"),
        }
    }
}

/// What a check gets to see
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    pub instance: &'a ResourceInstance,
    pub graph: &'a ResourceGraph,
}

pub type CheckFn = fn(&CheckContext<'_>) -> anyhow::Result<Status>;

#[derive(Debug, Clone, Copy)]
pub enum Check {
    /// Every matching instance fails
    Forbidden { message: &'static str },

    /// The attribute must be present and not empty
    RequireAttribute {
        path: &'static [&'static str],
        message: &'static str,
    },

    /// The attribute must equal `expected`
    ///
    /// A missing attribute fails if `required`, otherwise the check does not apply.
    AttributeEquals {
        path: &'static [&'static str],
        expected: Expected,
        required: bool,
        message: &'static str,
    },

    /// The attribute (or any element of it, for lists) must not be one of `forbidden`
    AttributeNotIn {
        path: &'static [&'static str],
        forbidden: &'static [Expected],
        message: &'static str,
    },

    Custom(CheckFn),
}

impl Check {
    pub fn evaluate(&self, ctx: &CheckContext<'_>) -> anyhow::Result<Status> {
        let body = &ctx.instance.body;

        Ok(match *self {
            Check::Forbidden { message } => Status::Failed(message.to_string()),
            Check::RequireAttribute { path, message } => match body.find(path) {
                None => Status::Failed(message.to_string()),
                Some(Value::Unknown) => Status::NotApplicable,
                Some(value) if is_empty(&value) => Status::Failed(message.to_string()),
                Some(_) => Status::Passed,
            },
            Check::AttributeEquals {
                path,
                expected,
                required,
                message,
            } => match body.find(path) {
                None if required => Status::Failed(message.to_string()),
                None => Status::NotApplicable,
                Some(value) => match expected.matches(&value) {
                    Some(true) => Status::Passed,
                    Some(false) => Status::Failed(format!(
                        "{message}: `{}` is not {expected}",
                        path.join(".")
                    )),
                    None => Status::NotApplicable,
                },
            },
            Check::AttributeNotIn {
                path,
                forbidden,
                message,
            } => match body.find(path) {
                None => Status::Passed,
                Some(value) => {
                    let values = match value {
                        Value::Array(values) => values,
                        value => vec![value],
                    };

                    let mut unknown = false;
                    for value in &values {
                        for candidate in forbidden {
                            match candidate.matches(value) {
                                Some(true) => {
                                    return Ok(Status::Failed(format!(
                                        "{message}: `{}` is {candidate}",
                                        path.join(".")
                                    )))
                                }
                                Some(false) => {}
                                None => unknown = true,
                            }
                        }
                    }

                    if unknown {
                        Status::NotApplicable
                    } else {
                        Status::Passed
                    }
                }
            },
            Check::Custom(check) => check(ctx)?,
        })
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::String(s) => s.trim().is_empty(),
        Value::Array(array) => array.is_empty(),
        Value::Object(object) => object.is_empty(),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    /// unique, e.g. `aws-vpc-no-default-vpc`
    pub code: &'static str,
    pub summary: &'static str,
    pub resolution: &'static str,
    pub severity: Severity,
    pub applies_to: BlockMatcher,
    pub check: Check,
}

impl Rule {
    pub fn applies_to(&self, key: &ResourceKey) -> bool {
        self.applies_to.matches(key)
    }
}
