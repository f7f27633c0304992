//! Lowering of [hcl::Expression]s into [Expression] nodes
//!
//! Traversals are split by their root variable:
//!
//! | traversal                         | node                                      |
//! |-----------------------------------|-------------------------------------------|
//! | `var.name[0]`                     | `Index(Variable(name), 0)`                |
//! | `local.name`                      | `Local(name)`                             |
//! | `count.index`                     | `CountIndex`                              |
//! | `aws_s3_bucket.b[0].id`           | `Resource(aws_s3_bucket.b, 0, [id])`      |
//! | `data.aws_ami.ubuntu.id`          | `Resource(data.aws_ami.ubuntu, -, [id])`  |
//! | `each.key`, `path.module`, `x`    | `Unsupported`                             |
//!
//! Anything following the first non-attribute operator of a resource path becomes an [Expression::Index].
use crate::expression::{Expression, Operator, ResourceRef};
use crate::syntax::{ResourceKey, ResourceMode};
use crate::value::Value;
use hcl::expr::{BinaryOperator, UnaryOperator};
use hcl::template::Element;
use hcl::{Identifier, ObjectKey, Operation, Template, TemplateExpr, Traversal, TraversalOperator};

#[allow(unreachable_patterns)]
pub fn lower(expr: &hcl::Expression) -> Expression {
    use hcl::Expression as Hcl;

    match expr {
        Hcl::Null => Expression::Literal(Value::Unknown),
        Hcl::Bool(b) => Expression::literal(*b),
        Hcl::Number(num) => Expression::Literal(num.clone().into()),
        Hcl::String(s) => Expression::literal(s.as_str()),
        Hcl::Array(array) => Expression::Array(array.iter().map(lower).collect()),
        Hcl::Object(object) => Expression::Object(
            object
                .iter()
                .map(|(key, value)| (lower_object_key(key), lower(value)))
                .collect(),
        ),
        Hcl::TemplateExpr(template_expr) => lower_template(template_expr),
        // a standalone variable is a traversal with no operators
        Hcl::Variable(var) => lower_path(var.as_str(), &[]),
        Hcl::Traversal(traversal) => lower_traversal(traversal),
        Hcl::Parenthesis(inner) => lower(inner),
        Hcl::Conditional(cond) => Expression::conditional(
            lower(&cond.cond_expr),
            lower(&cond.true_expr),
            lower(&cond.false_expr),
        ),
        Hcl::Operation(operation) => lower_operation(operation),
        Hcl::FuncCall(_) => Expression::Unsupported("function call"),
        Hcl::ForExpr(_) => Expression::Unsupported("for expression"),
        _ => Expression::Unsupported("expression"),
    }
}

#[allow(unreachable_patterns)]
fn lower_object_key(key: &ObjectKey) -> Expression {
    match key {
        ObjectKey::Identifier(ident) => Expression::literal(ident.as_str()),
        // `{ (var.key) = ... }` and quoted keys
        ObjectKey::Expression(expr) => lower(expr),
        _ => Expression::Unsupported("object key"),
    }
}

fn lower_template(template_expr: &TemplateExpr) -> Expression {
    let Ok(template) = Template::from_expr(template_expr) else {
        tracing::debug!(?template_expr, "template did not parse");
        return Expression::Unsupported("template");
    };

    let mut parts = vec![];
    for element in template.elements() {
        match element {
            Element::Literal(literal) => parts.push(Expression::literal(literal.as_str())),
            Element::Interpolation(interpolation) => parts.push(lower(&interpolation.expr)),
            Element::Directive(_) => return Expression::Unsupported("template directive"),
        }
    }

    // "${expr}" evaluates to the value of expr itself, without string conversion
    match parts.len() {
        0 => Expression::literal(""),
        1 => parts.remove(0),
        _ => Expression::Template(parts),
    }
}

fn lower_traversal(traversal: &Traversal) -> Expression {
    let hcl::Expression::Variable(root) = &traversal.expr else {
        return apply_operators(lower(&traversal.expr), &traversal.operators);
    };

    lower_path(root.as_str(), &traversal.operators)
}

fn lower_path(root: &str, operators: &[TraversalOperator]) -> Expression {
    match (root, operators) {
        ("var", [TraversalOperator::GetAttr(name), rest @ ..]) => {
            apply_operators(Expression::Variable(name.to_string()), rest)
        }
        ("local", [TraversalOperator::GetAttr(name), rest @ ..]) => {
            apply_operators(Expression::Local(name.to_string()), rest)
        }
        ("count", [TraversalOperator::GetAttr(attr), rest @ ..]) if attr.as_str() == "index" => {
            apply_operators(Expression::CountIndex, rest)
        }
        ("data", [TraversalOperator::GetAttr(resource_type), TraversalOperator::GetAttr(name), rest @ ..]) => {
            lower_resource(ResourceMode::Data, resource_type.as_str(), name, rest)
        }
        ("var" | "local" | "count" | "data", _) => Expression::Unsupported("incomplete reference"),
        ("each", _) => Expression::Unsupported("each"),
        ("self", _) => Expression::Unsupported("self"),
        ("path", _) => Expression::Unsupported("path"),
        ("terraform", _) => Expression::Unsupported("terraform"),
        ("module", _) => Expression::Unsupported("module"),
        (resource_type, [TraversalOperator::GetAttr(name), rest @ ..]) => {
            lower_resource(ResourceMode::Managed, resource_type, name, rest)
        }
        (_, _) => Expression::Unsupported("bare identifier"),
    }
}

fn lower_resource(
    mode: ResourceMode,
    resource_type: &str,
    name: &Identifier,
    operators: &[TraversalOperator],
) -> Expression {
    let (index, mut rest) = match operators {
        [TraversalOperator::Index(expr), rest @ ..] => (Some(Box::new(lower(expr))), rest),
        [TraversalOperator::LegacyIndex(idx), rest @ ..] => {
            (Some(Box::new(legacy_index(*idx))), rest)
        }
        rest => (None, rest),
    };

    let mut path = vec![];
    while let [TraversalOperator::GetAttr(attr), tail @ ..] = rest {
        path.push(attr.to_string());
        rest = tail;
    }

    let reference = Expression::Resource(ResourceRef {
        key: ResourceKey::new(mode, resource_type, name.as_str()),
        index,
        path,
    });

    apply_operators(reference, rest)
}

#[allow(unreachable_patterns)]
fn apply_operators(mut expr: Expression, operators: &[TraversalOperator]) -> Expression {
    for operator in operators {
        expr = match operator {
            TraversalOperator::GetAttr(attr) => {
                Expression::index(expr, Expression::literal(attr.as_str()))
            }
            TraversalOperator::Index(idx) => Expression::index(expr, lower(idx)),
            TraversalOperator::LegacyIndex(idx) => Expression::index(expr, legacy_index(*idx)),
            TraversalOperator::AttrSplat | TraversalOperator::FullSplat => {
                return Expression::Unsupported("splat")
            }
            _ => return Expression::Unsupported("traversal operator"),
        };
    }

    expr
}

fn legacy_index(idx: u64) -> Expression {
    Expression::Literal(i64::try_from(idx).map(Value::Integer).unwrap_or_default())
}

#[allow(unreachable_patterns)]
fn lower_operation(operation: &Operation) -> Expression {
    match operation {
        Operation::Unary(unary) => {
            let operator = match &unary.operator {
                UnaryOperator::Neg => Operator::Neg,
                UnaryOperator::Not => Operator::Not,
                _ => return Expression::Unsupported("unary operator"),
            };
            Expression::operation(operator, vec![lower(&unary.expr)])
        }
        Operation::Binary(binary) => {
            let operator = match &binary.operator {
                BinaryOperator::Eq => Operator::Eq,
                BinaryOperator::NotEq => Operator::NotEq,
                BinaryOperator::LessEq => Operator::LessEq,
                BinaryOperator::GreaterEq => Operator::GreaterEq,
                BinaryOperator::Less => Operator::Less,
                BinaryOperator::Greater => Operator::Greater,
                BinaryOperator::Plus => Operator::Add,
                BinaryOperator::Minus => Operator::Sub,
                BinaryOperator::Mul => Operator::Mul,
                BinaryOperator::Div => Operator::Div,
                BinaryOperator::Mod => Operator::Mod,
                BinaryOperator::And => Operator::And,
                BinaryOperator::Or => Operator::Or,
                _ => return Expression::Unsupported("binary operator"),
            };
            Expression::operation(
                operator,
                vec![lower(&binary.lhs_expr), lower(&binary.rhs_expr)],
            )
        }
        _ => Expression::Unsupported("operation"),
    }
}
