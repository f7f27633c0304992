//! Builtin rules
use crate::registry::RuleRegistry;

pub mod aws;

/// Registry with every builtin rule
pub fn builtin() -> RuleRegistry {
    let mut registry = RuleRegistry::new();
    for rule in aws::RULES {
        if let Err(err) = registry.register(*rule) {
            tracing::error!(%err, "skipping builtin rule");
        }
    }
    registry
}
