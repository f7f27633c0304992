//! Rule registry
//!
//! Rules are registered once and read-only afterwards. A process-wide registry is available through [global], it is
//! initialized on first access, either explicitly with [install] or implicitly with the builtin rules.
use crate::rule::Rule;
use crate::syntax::ResourceKey;
use std::sync::OnceLock;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("rule `{0}` is already registered")]
    DuplicateCode(&'static str),
    #[error("the global rule registry is already initialized")]
    AlreadyInstalled,
}

/// Ordered set of rules with unique codes
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: impl IntoIterator<Item = Rule>) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for rule in rules {
            registry.register(rule)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, rule: Rule) -> Result<(), RegistryError> {
        if self.get(rule.code).is_some() {
            return Err(RegistryError::DuplicateCode(rule.code));
        }

        tracing::trace!(code = rule.code, "rule registered");
        self.rules.push(rule);
        Ok(())
    }

    pub fn get(&self, code: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.code == code)
    }

    /// All rules in registration order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rules applying to `key`, in registration order
    pub fn matching<'r>(&'r self, key: &'r ResourceKey) -> impl Iterator<Item = &'r Rule> {
        self.rules.iter().filter(move |rule| rule.applies_to(key))
    }

    /// A copy without the rules of `predicate`
    pub fn without(&self, predicate: impl Fn(&Rule) -> bool) -> Self {
        Self {
            rules: self
                .rules
                .iter()
                .filter(|rule| !predicate(rule))
                .copied()
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

static GLOBAL: OnceLock<RuleRegistry> = OnceLock::new();

/// Initialize the global registry with `registry`
///
/// Fails if the global registry was already initialized, by an earlier `install` or by [global].
pub fn install(registry: RuleRegistry) -> Result<&'static RuleRegistry, RegistryError> {
    GLOBAL
        .set(registry)
        .map_err(|_| RegistryError::AlreadyInstalled)?;
    Ok(global())
}

/// The global registry, the builtin rules unless [install] was called first
pub fn global() -> &'static RuleRegistry {
    GLOBAL.get_or_init(crate::rules::builtin)
}
