//! Expression resolution
//!
//! [Resolver::resolve] turns an [Expression] into a [Value]. Resolution is total: a data shape mismatch (indexing a
//! string, adding a string to a number, a missing key, an out-of-bounds index, a reference to a block that was not
//! resolved yet) yields [Value::Unknown] instead of an error, and unknown values propagate through every operation.
//!
//! The only error is a [ContextError]: `count.index` evaluated outside of a block that declares `count`.
//!
//! A resolver is a plain copyable view of its context. Resolving the same expression twice with the same resolver
//! yields the same value.
use crate::expression::{Conditional, Expression, Operation, Operator, ResourceRef};
use crate::graph::ResourceGraph;
use crate::value::{Number, Value};
use crate::variables::VariableContext;
use indexmap::IndexMap;

/// `count.index` was used where no instance index exists
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("count.index used in a block without count")]
pub struct ContextError;

#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver<'a> {
    variables: Option<&'a VariableContext>,
    locals: Option<&'a IndexMap<String, Expression>>,
    graph: Option<&'a ResourceGraph>,
    /// index of the instance being resolved, bound to `count.index`
    instance: Option<usize>,
    /// locals currently being resolved, innermost first
    local_frames: Option<&'a LocalFrame<'a>>,
}

#[derive(Debug)]
struct LocalFrame<'f> {
    name: &'f str,
    parent: Option<&'f LocalFrame<'f>>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        variables: &'a VariableContext,
        locals: &'a IndexMap<String, Expression>,
        graph: &'a ResourceGraph,
    ) -> Self {
        Self {
            variables: Some(variables),
            locals: Some(locals),
            graph: Some(graph),
            instance: None,
            local_frames: None,
        }
    }

    /// A resolver without any bindings, every reference resolves to [Value::Unknown]
    pub fn constant() -> Resolver<'static> {
        Resolver::default()
    }

    /// The same context with `count.index` bound to `index`
    pub fn with_instance(&self, index: usize) -> Self {
        Self {
            instance: Some(index),
            ..*self
        }
    }

    /// Instance index a reference points to, `None` without explicit index or if the index is unknown
    pub fn reference_index(&self, reference: &ResourceRef) -> Option<usize> {
        let index = self.try_resolve(reference.index.as_deref()?).ok()?;
        index.as_number().and_then(Number::as_index)
    }

    /// Resolve an expression, treating a [ContextError] as [Value::Unknown]
    pub fn resolve(&self, expr: &Expression) -> Value {
        self.try_resolve(expr).unwrap_or_else(|err| {
            tracing::warn!(%err, "expression resolved to unknown");
            Value::Unknown
        })
    }

    pub fn try_resolve(&self, expr: &Expression) -> Result<Value, ContextError> {
        Ok(match expr {
            Expression::Literal(value) => value.clone(),
            Expression::Variable(name) => self
                .variables
                .map(|variables| variables.lookup(name).value)
                .unwrap_or_default(),
            Expression::Local(name) => self.resolve_local(name)?,
            Expression::Resource(reference) => self.resolve_reference(reference)?,
            Expression::Conditional(cond) => self.resolve_conditional(cond)?,
            Expression::Index { collection, key } => {
                let collection = self.try_resolve(collection)?;
                let key = self.try_resolve(key)?;
                collection.index(&key)
            }
            Expression::Operation(operation) => self.resolve_operation(operation)?,
            Expression::CountIndex => {
                let index = self.instance.ok_or(ContextError)?;
                i64::try_from(index).map(Value::Integer).unwrap_or_default()
            }
            Expression::Array(array) => Value::Array(
                array
                    .iter()
                    .map(|expr| self.try_resolve(expr))
                    .collect::<Result<_, _>>()?,
            ),
            Expression::Object(object) => {
                let mut map = IndexMap::with_capacity(object.len());
                let mut keys_known = true;
                for (key, value) in object {
                    let key = self.try_resolve(key)?.to_template_string();
                    let value = self.try_resolve(value)?;
                    match key {
                        Some(key) => {
                            map.insert(key, value);
                        }
                        None => keys_known = false,
                    }
                }
                if keys_known {
                    Value::Object(map)
                } else {
                    Value::Unknown
                }
            }
            Expression::Template(parts) => {
                let mut rendered = String::new();
                let mut known = true;
                for part in parts {
                    match self.try_resolve(part)?.to_template_string() {
                        Some(s) => rendered.push_str(&s),
                        None => known = false,
                    }
                }
                if known {
                    Value::String(rendered)
                } else {
                    Value::Unknown
                }
            }
            Expression::Unsupported(kind) => {
                tracing::trace!(kind, "unsupported expression");
                Value::Unknown
            }
        })
    }

    /// Only the taken branch is resolved
    fn resolve_conditional(&self, cond: &Conditional) -> Result<Value, ContextError> {
        let condition = self.try_resolve(&cond.condition)?;
        match condition.as_bool() {
            Some(true) => self.try_resolve(&cond.true_expr),
            Some(false) => self.try_resolve(&cond.false_expr),
            None => {
                tracing::trace!(condition = condition.type_name(), "condition not known");
                Ok(Value::Unknown)
            }
        }
    }

    fn resolve_local(&self, name: &str) -> Result<Value, ContextError> {
        let Some(expr) = self.locals.and_then(|locals| locals.get(name)) else {
            tracing::debug!(%name, "reference to undeclared local");
            return Ok(Value::Unknown);
        };

        let mut frame = self.local_frames;
        while let Some(current) = frame {
            if current.name == name {
                tracing::warn!(%name, "local value refers to itself");
                return Ok(Value::Unknown);
            }
            frame = current.parent;
        }

        // locals are shared by all instances and never see count.index
        let frame = LocalFrame {
            name,
            parent: self.local_frames,
        };
        let resolver = Resolver {
            variables: self.variables,
            locals: self.locals,
            graph: self.graph,
            instance: None,
            local_frames: Some(&frame),
        };
        resolver.try_resolve(expr)
    }

    fn resolve_reference(&self, reference: &ResourceRef) -> Result<Value, ContextError> {
        let index = match &reference.index {
            Some(expr) => {
                let index = self.try_resolve(expr)?;
                match index.as_number().and_then(Number::as_index) {
                    Some(index) => Some(index),
                    None => return Ok(Value::Unknown),
                }
            }
            None => None,
        };

        let Some(instance) = self
            .graph
            .and_then(|graph| graph.lookup(&reference.key, index))
        else {
            tracing::debug!(key = %reference.key, ?index, "reference to missing instance");
            return Ok(Value::Unknown);
        };

        Ok(instance.get_path(&reference.path))
    }

    fn resolve_operation(&self, operation: &Operation) -> Result<Value, ContextError> {
        let operands = operation
            .operands
            .iter()
            .map(|operand| self.try_resolve(operand))
            .collect::<Result<Vec<_>, _>>()?;

        if operands.len() != operation.operator.arity() {
            return Ok(Value::Unknown);
        }

        Ok(match operands.as_slice() {
            [operand] => unary(operation.operator, operand),
            [lhs, rhs] => binary(operation.operator, lhs, rhs),
            _ => Value::Unknown,
        })
    }
}

fn unary(operator: Operator, operand: &Value) -> Value {
    let value = match operator {
        Operator::Not => operand.as_bool().map(|b| Value::Boolean(!b)),
        Operator::Neg => match operand.as_number() {
            Some(Number::Integer(int)) => int.checked_neg().map(Value::Integer),
            Some(Number::Decimal(dec)) => Some(Value::Decimal(-dec)),
            None => None,
        },
        _ => None,
    };
    value.unwrap_or_default()
}

fn binary(operator: Operator, lhs: &Value, rhs: &Value) -> Value {
    if lhs.is_unknown() || rhs.is_unknown() {
        return Value::Unknown;
    }

    let value = match operator {
        Operator::Eq => lhs.loose_eq(rhs).map(Value::Boolean),
        Operator::NotEq => lhs.loose_eq(rhs).map(|eq| Value::Boolean(!eq)),
        Operator::And | Operator::Or => match (lhs.as_bool(), rhs.as_bool()) {
            (Some(l), Some(r)) if operator == Operator::And => Some(Value::Boolean(l && r)),
            (Some(l), Some(r)) => Some(Value::Boolean(l || r)),
            _ => None,
        },
        Operator::Less | Operator::LessEq | Operator::Greater | Operator::GreaterEq => {
            match (lhs.as_number(), rhs.as_number()) {
                (Some(l), Some(r)) => {
                    let (l, r) = (l.as_f64(), r.as_f64());
                    Some(Value::Boolean(match operator {
                        Operator::Less => l < r,
                        Operator::LessEq => l <= r,
                        Operator::Greater => l > r,
                        _ => l >= r,
                    }))
                }
                _ => None,
            }
        }
        Operator::Add | Operator::Sub | Operator::Mul | Operator::Div | Operator::Mod => {
            match (lhs.as_number(), rhs.as_number()) {
                (Some(l), Some(r)) => arithmetic(operator, l, r),
                _ => None,
            }
        }
        Operator::Not | Operator::Neg => None,
    };
    value.unwrap_or_default()
}

fn arithmetic(operator: Operator, lhs: Number, rhs: Number) -> Option<Value> {
    if let (Number::Integer(l), Number::Integer(r)) = (lhs, rhs) {
        let int = match operator {
            Operator::Add => l.checked_add(r),
            Operator::Sub => l.checked_sub(r),
            Operator::Mul => l.checked_mul(r),
            Operator::Mod => l.checked_rem(r),
            Operator::Div if l.checked_rem(r) == Some(0) => l.checked_div(r),
            // inexact division continues as decimal
            _ => None,
        };
        if let Some(int) = int {
            return Some(Value::Integer(int));
        }
        if matches!(operator, Operator::Mod | Operator::Div) && r == 0 {
            return None;
        }
    }

    let (l, r) = (lhs.as_f64(), rhs.as_f64());
    let dec = match operator {
        Operator::Add => l + r,
        Operator::Sub => l - r,
        Operator::Mul => l * r,
        Operator::Div if r != 0.0 => l / r,
        Operator::Mod if r != 0.0 => l % r,
        _ => return None,
    };

    dec.is_finite().then_some(Value::Decimal(dec))
}
