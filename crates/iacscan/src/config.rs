//! Scan configuration file
//!
//! ```yaml
//! exclude:
//!   - aws-s3-enable-versioning
//! severity_overrides:
//!   aws-vpc-no-default-vpc: CRITICAL
//! minimum_severity: MEDIUM
//! ```
//!
//! Files ending in `.json` are read as JSON, everything else as YAML.
use crate::registry::RuleRegistry;
use crate::report::ScanResult;
use crate::rule::Severity;
use indexmap::IndexMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// rule codes that are not run
    pub exclude: Vec<String>,
    /// severity reported for a rule code instead of the rule's own
    pub severity_overrides: IndexMap<String, Severity>,
    /// results below this severity are dropped
    pub minimum_severity: Option<Severity>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse yaml config")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Unable to parse json config")]
    Json(#[from] serde_json::Error),
}

impl ScanConfig {
    pub fn from_yaml(src: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(src)?)
    }

    pub fn from_json(src: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(src)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        tracing::info!(path=%path.display(), "loading scan config");
        let contents = std::fs::read_to_string(path)?;

        let is_json = path.extension().is_some_and(|ext| ext == "json");
        if is_json {
            Self::from_json(&contents)
        } else {
            Self::from_yaml(&contents)
        }
    }

    /// Combine with `other`, exclusions are joined and `other` wins for everything else
    pub fn merge(&mut self, other: ScanConfig) {
        for code in other.exclude {
            if !self.exclude.contains(&code) {
                self.exclude.push(code);
            }
        }
        self.severity_overrides.extend(other.severity_overrides);
        if other.minimum_severity.is_some() {
            self.minimum_severity = other.minimum_severity;
        }
    }

    pub fn is_excluded(&self, code: &str) -> bool {
        self.exclude.iter().any(|excluded| excluded == code)
    }

    /// The registry without excluded rules
    ///
    /// Unknown codes are logged and otherwise ignored.
    pub fn apply_to_registry(&self, registry: &RuleRegistry) -> RuleRegistry {
        for code in &self.exclude {
            if registry.get(code).is_none() {
                tracing::warn!(%code, "excluded rule does not exist");
            }
        }
        registry.without(|rule| self.is_excluded(rule.code))
    }

    /// Apply severity overrides and drop results below the minimum severity
    pub fn apply_to_results(&self, results: Vec<ScanResult>) -> Vec<ScanResult> {
        results
            .into_iter()
            .map(|mut result| {
                if let Some(severity) = self.severity_overrides.get(&result.rule_code) {
                    result.severity = *severity;
                }
                result
            })
            .filter(|result| {
                self.minimum_severity
                    .map_or(true, |minimum| result.severity >= minimum)
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graph::{ResolvedBody, ResourceInstance};
    use crate::report::ResultStatus;
    use crate::rules::aws;
    use crate::syntax::ResourceKey;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_yaml() {
        let config = ScanConfig::from_yaml(
            r#"
exclude:
  - aws-s3-enable-versioning
severity_overrides:
  aws-vpc-no-default-vpc: CRITICAL
minimum_severity: MEDIUM
"#,
        )
        .expect("valid config");

        assert_eq!(config.exclude, vec!["aws-s3-enable-versioning".to_string()]);
        assert_eq!(
            config.severity_overrides.get("aws-vpc-no-default-vpc"),
            Some(&Severity::Critical)
        );
        assert_eq!(config.minimum_severity, Some(Severity::Medium));
    }

    #[test]
    fn parse_json() {
        let config = ScanConfig::from_json(r#"{"exclude": ["aws-vpc-no-default-vpc"]}"#)
            .expect("valid config");
        assert!(config.is_excluded("aws-vpc-no-default-vpc"));
        assert_eq!(config.minimum_severity, None);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(ScanConfig::from_yaml("excludes: []").is_err());
        assert!(ScanConfig::from_yaml("minimum_severity: URGENT").is_err());
    }

    #[test]
    fn merge() {
        let mut config = ScanConfig {
            exclude: vec!["a".into()],
            minimum_severity: Some(Severity::High),
            ..Default::default()
        };
        config.merge(ScanConfig {
            exclude: vec!["a".into(), "b".into()],
            minimum_severity: None,
            ..Default::default()
        });

        assert_eq!(config.exclude, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(config.minimum_severity, Some(Severity::High));
    }

    #[test]
    fn results_filtering() {
        let instance = ResourceInstance {
            key: ResourceKey::managed("aws_s3_bucket", "logs"),
            index: None,
            body: ResolvedBody::default(),
            source: None,
        };
        let results = vec![
            ScanResult::new(&aws::ENABLE_VERSIONING, &instance, ResultStatus::Failed, None),
            ScanResult::new(&aws::NO_PUBLIC_ACL, &instance, ResultStatus::Passed, None),
            ScanResult::new(
                &aws::SPECIFY_PUBLIC_ACCESS_BLOCK,
                &instance,
                ResultStatus::Failed,
                None,
            ),
        ];

        let mut config = ScanConfig {
            minimum_severity: Some(Severity::Medium),
            ..Default::default()
        };
        config
            .severity_overrides
            .insert("aws-s3-enable-versioning".into(), Severity::Critical);

        let filtered = config.apply_to_results(results);
        let codes: Vec<_> = filtered
            .iter()
            .map(|result| (result.rule_code.as_str(), result.severity))
            .collect();
        assert_eq!(
            codes,
            vec![
                ("aws-s3-enable-versioning", Severity::Critical),
                ("aws-s3-no-public-access-with-acl", Severity::High),
            ]
        );
    }

    #[test]
    fn excluded_rules_are_removed_from_registry() {
        let config = ScanConfig {
            exclude: vec!["aws-vpc-no-default-vpc".into(), "does-not-exist".into()],
            ..Default::default()
        };
        let registry = config.apply_to_registry(&crate::rules::builtin());
        assert!(registry.get("aws-vpc-no-default-vpc").is_none());
        assert_eq!(registry.len(), aws::RULES.len() - 1);
    }
}
