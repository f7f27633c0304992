//! Expression nodes
//!
//! The unevaluated form of an attribute value. Nodes are produced from [hcl::Expression]s by [crate::lower] and
//! evaluated by [crate::resolve::Resolver]. They are immutable once built.
use crate::syntax::ResourceKey;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A constant
    Literal(Value),
    /// `var.<name>`
    Variable(String),
    /// `local.<name>`
    Local(String),
    /// `<type>.<name>[<index>].<path>` or `data.<type>.<name>[<index>].<path>`
    Resource(ResourceRef),
    /// `<condition> ? <true> : <false>`
    Conditional(Box<Conditional>),
    /// `<collection>[<key>]`, also used for attribute access on computed values
    Index {
        collection: Box<Expression>,
        key: Box<Expression>,
    },
    /// Arithmetic, comparison and logical operators
    Operation(Operation),
    /// `count.index`
    CountIndex,
    /// `[a, b, c]`
    Array(Vec<Expression>),
    /// `{ key = value }`, keys are expressions themselves
    Object(Vec<(Expression, Expression)>),
    /// A string with interpolations, `"${a}-${b}"`
    Template(Vec<Expression>),
    /// Anything outside the supported subset (function calls, for expressions, splats, ...)
    ///
    /// Always resolves to [Value::Unknown].
    Unsupported(&'static str),
}

impl Expression {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Variable(name.into())
    }

    pub fn conditional(condition: Expression, true_expr: Expression, false_expr: Expression) -> Self {
        Expression::Conditional(Box::new(Conditional {
            condition,
            true_expr,
            false_expr,
        }))
    }

    pub fn index(collection: Expression, key: Expression) -> Self {
        Expression::Index {
            collection: Box::new(collection),
            key: Box::new(key),
        }
    }

    pub fn operation(operator: Operator, operands: Vec<Expression>) -> Self {
        Expression::Operation(Operation { operator, operands })
    }
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        Expression::Literal(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub condition: Expression,
    pub true_expr: Expression,
    pub false_expr: Expression,
}

/// A reference to an attribute of another block
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRef {
    pub key: ResourceKey,
    /// Explicit instance index, `aws_s3_bucket.logs[0]`
    pub index: Option<Box<Expression>>,
    /// Attribute names following the (optional) index
    pub path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub operator: Operator,
    pub operands: Vec<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    // unary
    Not,
    Neg,
    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // comparison
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    // logical
    And,
    Or,
}

impl Operator {
    pub fn arity(self) -> usize {
        match self {
            Operator::Not | Operator::Neg => 1,
            _ => 2,
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Operator::Not => "!",
            Operator::Neg => "-",
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "%",
            Operator::Eq => "==",
            Operator::NotEq => "!=",
            Operator::Less => "<",
            Operator::LessEq => "<=",
            Operator::Greater => ">",
            Operator::GreaterEq => ">=",
            Operator::And => "&&",
            Operator::Or => "||",
        })
    }
}
