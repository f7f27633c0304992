//! Count evaluation
//!
//! Decides how many instances of a block exist and materializes them.
//!
//! | `count`                    | instances                                    |
//! |----------------------------|----------------------------------------------|
//! | absent                     | 1, without `count.index`                     |
//! | number `n`                 | `floor(n)`, negative numbers are `0`         |
//! | number above the limit     | [UNKNOWN_COUNT_INSTANCES] and a [Warning]    |
//! | numeric string             | as the number                                |
//! | unknown                    | [UNKNOWN_COUNT_INSTANCES]                    |
//! | bool, list, object, string | [UNKNOWN_COUNT_INSTANCES] and a [Warning]    |
//!
//! Only `count = 0` (known!) makes a block disappear. A count that depends on a variable without default or on
//! another resource is unknown, and an unknown count is treated as present. This is the one place where an unknown
//! value is not neutral: findings on such a block are reported rather than silently dropped.
use crate::graph::{ResolvedBody, ResourceInstance};
use crate::report::Warning;
use crate::resolve::{ContextError, Resolver};
use crate::syntax::{Block, ResourceKey};
use crate::value::{Number, Value};

/// Number of instances materialized for a block whose count cannot be determined
pub const UNKNOWN_COUNT_INSTANCES: usize = 1;

/// Largest count that is materialized instance by instance
pub const MAX_COUNT_INSTANCES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    /// no `count` attribute
    Implicit,
    Known(usize),
    /// count could not be determined
    Assumed,
}

impl Count {
    pub fn instances(self) -> usize {
        match self {
            Count::Implicit => 1,
            Count::Known(count) => count,
            Count::Assumed => UNKNOWN_COUNT_INSTANCES,
        }
    }

    /// Whether `count.index` is bound in the instances
    pub fn is_indexed(self) -> bool {
        self != Count::Implicit
    }
}

/// Evaluate the `count` attribute of `block`
///
/// `count` itself is resolved without `count.index`.
pub fn evaluate_count(
    block: &Block,
    key: &ResourceKey,
    resolver: &Resolver,
) -> (Count, Option<Warning>) {
    let Some(expr) = block.body.attribute("count") else {
        return (Count::Implicit, None);
    };

    let value = match resolver.try_resolve(expr) {
        Ok(value) => value,
        Err(ContextError) => {
            let warning = Warning::CountIndexWithoutCount {
                resource: key.to_string(),
                attribute: "count".to_string(),
            };
            return (Count::Assumed, Some(warning));
        }
    };

    count_from_value(&value, key)
}

fn count_from_value(value: &Value, key: &ResourceKey) -> (Count, Option<Warning>) {
    if value.is_unknown() {
        tracing::debug!(%key, "count unknown, assuming present");
        return (Count::Assumed, None);
    }

    let number = match value {
        // bools do not convert to numbers
        Value::Boolean(_) => None,
        value => value.as_number(),
    };

    match number {
        Some(Number::Integer(count)) if count < 0 => negative(key, count as f64),
        Some(Number::Decimal(count)) if count < 0.0 => negative(key, count),
        Some(number) => {
            let count = number.as_f64().floor();
            if count > MAX_COUNT_INSTANCES as f64 {
                return too_large(key, count);
            }
            (Count::Known(count as usize), None)
        }
        None => {
            tracing::warn!(%key, found = value.type_name(), "count is not a number");
            let warning = Warning::InvalidCount {
                resource: key.to_string(),
                found: value.type_name(),
            };
            (Count::Assumed, Some(warning))
        }
    }
}

fn negative(key: &ResourceKey, count: f64) -> (Count, Option<Warning>) {
    tracing::warn!(%key, count, "negative count");
    let warning = Warning::NegativeCount {
        resource: key.to_string(),
        count,
    };
    (Count::Known(0), Some(warning))
}

fn too_large(key: &ResourceKey, count: f64) -> (Count, Option<Warning>) {
    tracing::warn!(%key, count, limit = MAX_COUNT_INSTANCES, "count too large");
    let warning = Warning::CountTooLarge {
        resource: key.to_string(),
        count,
    };
    (Count::Assumed, Some(warning))
}

/// Evaluate the count of `block` and resolve the body of every instance
///
/// Instances are returned in index order. A `count.index` in a block without `count` makes the affected attribute
/// unknown and is reported as a [Warning].
pub fn materialize(
    block: &Block,
    key: &ResourceKey,
    resolver: &Resolver,
) -> (Vec<ResourceInstance>, Vec<Warning>) {
    let mut warnings = vec![];

    let (count, warning) = evaluate_count(block, key, resolver);
    warnings.extend(warning);
    tracing::trace!(%key, ?count, "count evaluated");

    let instances = (0..count.instances())
        .map(|index| {
            let index = count.is_indexed().then_some(index);
            let resolver = match index {
                Some(index) => resolver.with_instance(index),
                None => *resolver,
            };

            let mut on_error = |attribute: String, err: ContextError| {
                tracing::warn!(%key, %attribute, %err, "attribute resolved to unknown");
                warnings.push(Warning::CountIndexWithoutCount {
                    resource: key.to_string(),
                    attribute,
                });
            };
            let body = ResolvedBody::resolve(&block.body, &resolver, &mut on_error);

            ResourceInstance {
                key: key.clone(),
                index,
                body,
                source: block.source.clone(),
            }
        })
        .collect();

    (instances, warnings)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::expression::Expression;
    use crate::graph::ResourceGraph;
    use crate::syntax::{BlockKind, Body};
    use crate::variables::{Overrides, VariableContext, VariableDeclaration};
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn key() -> ResourceKey {
        ResourceKey::managed("aws_default_vpc", "this")
    }

    fn block(count: Option<Expression>) -> Block {
        let mut body = Body::default();
        if let Some(count) = count {
            body.attributes.insert("count".into(), count);
        }
        body.attributes
            .insert("index".into(), Expression::CountIndex);

        Block {
            kind: BlockKind::Resource,
            labels: vec!["aws_default_vpc".into(), "this".into()],
            body,
            source: None,
        }
    }

    fn count_of(count: impl Into<Value>) -> (Count, Option<Warning>) {
        evaluate_count(
            &block(Some(Expression::literal(count))),
            &key(),
            &Resolver::constant(),
        )
    }

    #[test]
    fn absent_count_is_one_unindexed_instance() {
        let (count, warning) = evaluate_count(&block(None), &key(), &Resolver::constant());
        assert_eq!(count, Count::Implicit);
        assert_eq!(count.instances(), 1);
        assert!(!count.is_indexed());
        assert_eq!(warning, None);
    }

    #[test]
    fn numbers() {
        assert_eq!(count_of(0i64), (Count::Known(0), None));
        assert_eq!(count_of(1i64), (Count::Known(1), None));
        assert_eq!(count_of(99i64), (Count::Known(99), None));
        assert_eq!(count_of(2.7), (Count::Known(2), None));
        assert_eq!(count_of("3"), (Count::Known(3), None));
    }

    #[test]
    fn negative_is_zero_with_warning() {
        assert_eq!(
            count_of(-1i64),
            (
                Count::Known(0),
                Some(Warning::NegativeCount {
                    resource: "aws_default_vpc.this".into(),
                    count: -1.0
                })
            )
        );
    }

    #[test]
    fn huge_count_is_assumed_present_with_warning() {
        assert_eq!(
            count_of(MAX_COUNT_INSTANCES as i64),
            (Count::Known(MAX_COUNT_INSTANCES), None)
        );

        for count in [Value::Decimal(1e30), Value::Integer(i64::MAX), Value::from("1000000000")] {
            let (count, warning) = count_of(count);
            assert_eq!(count, Count::Assumed);
            assert!(
                matches!(warning, Some(Warning::CountTooLarge { .. })),
                "{warning:?}"
            );
        }

        let (instances, _) = materialize(
            &block(Some(Expression::literal(1e30))),
            &key(),
            &Resolver::constant(),
        );
        assert_eq!(instances.len(), UNKNOWN_COUNT_INSTANCES);
    }

    #[test]
    fn unknown_is_assumed_present() {
        let (count, warning) = count_of(Value::Unknown);
        assert_eq!(count, Count::Assumed);
        assert_eq!(count.instances(), UNKNOWN_COUNT_INSTANCES);
        assert_eq!(warning, None);
    }

    #[test]
    fn bool_is_assumed_present_with_warning() {
        let (count, warning) = count_of(true);
        assert_eq!(count, Count::Assumed);
        assert_eq!(
            warning,
            Some(Warning::InvalidCount {
                resource: "aws_default_vpc.this".into(),
                found: "bool"
            })
        );
    }

    #[test]
    fn conditional_on_variable() {
        let declarations = vec![
            VariableDeclaration::new("enabled".into(), Some(Expression::literal(false))),
            VariableDeclaration::new("no_default".into(), None),
        ];
        let variables = VariableContext::new(&declarations, Overrides::default());
        let locals = IndexMap::new();
        let graph = ResourceGraph::default();
        let resolver = Resolver::new(&variables, &locals, &graph);

        let gated = |name: &str| {
            block(Some(Expression::conditional(
                Expression::variable(name),
                Expression::literal(1i64),
                Expression::literal(0i64),
            )))
        };

        assert_eq!(
            evaluate_count(&gated("enabled"), &key(), &resolver).0,
            Count::Known(0)
        );
        assert_eq!(
            evaluate_count(&gated("no_default"), &key(), &resolver).0,
            Count::Assumed
        );
    }

    #[test]
    fn materialize_binds_count_index() {
        let (instances, warnings) = materialize(
            &block(Some(Expression::literal(3i64))),
            &key(),
            &Resolver::constant(),
        );

        assert!(warnings.is_empty());
        let indices: Vec<_> = instances.iter().map(|i| i.index).collect();
        assert_eq!(indices, vec![Some(0), Some(1), Some(2)]);
        let values: Vec<_> = instances.iter().map(|i| i.body.get("index")).collect();
        assert_eq!(
            values,
            vec![Value::Integer(0), Value::Integer(1), Value::Integer(2)]
        );
        assert!(instances[0].attribute("count").is_none());
    }

    #[test]
    fn materialize_zero() {
        let (instances, warnings) = materialize(
            &block(Some(Expression::literal(0i64))),
            &key(),
            &Resolver::constant(),
        );
        assert!(instances.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn count_index_without_count() {
        let (instances, warnings) = materialize(&block(None), &key(), &Resolver::constant());

        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].index, None);
        assert_eq!(instances[0].body.get("index"), Value::Unknown);
        assert_eq!(
            warnings,
            vec![Warning::CountIndexWithoutCount {
                resource: "aws_default_vpc.this".into(),
                attribute: "index".into()
            }]
        );
    }
}
