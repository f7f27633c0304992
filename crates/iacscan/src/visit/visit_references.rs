use super::Visit;
use crate::expression::{Expression, ResourceRef};
use crate::syntax::Body;

/// Recursively visit all [ResourceRef]s
///
/// Every branch is visited, including untaken conditional branches: this is a static view of what an expression
/// mentions, not of what it evaluates.
pub trait VisitReferences {
    fn visit_references(&self, visitor: &mut dyn Visit<ResourceRef>);

    /// Collect all references into a list, in visiting order
    fn references(&self) -> Vec<ResourceRef> {
        let mut references = vec![];
        self.visit_references(&mut |reference: &ResourceRef| references.push(reference.clone()));
        references
    }
}

impl VisitReferences for Body {
    fn visit_references(&self, visitor: &mut dyn Visit<ResourceRef>) {
        for expr in self.attributes.values() {
            expr.visit_references(visitor);
        }
        for block in &self.blocks {
            block.body.visit_references(visitor);
        }
    }
}

impl VisitReferences for Expression {
    fn visit_references(&self, visitor: &mut dyn Visit<ResourceRef>) {
        match self {
            Expression::Resource(reference) => {
                visitor.visit(reference);
                if let Some(index) = &reference.index {
                    index.visit_references(visitor);
                }
            }
            Expression::Conditional(cond) => {
                cond.condition.visit_references(visitor);
                cond.true_expr.visit_references(visitor);
                cond.false_expr.visit_references(visitor);
            }
            Expression::Index { collection, key } => {
                collection.visit_references(visitor);
                key.visit_references(visitor);
            }
            Expression::Operation(operation) => {
                for operand in &operation.operands {
                    operand.visit_references(visitor);
                }
            }
            Expression::Array(array) | Expression::Template(array) => {
                for expr in array {
                    expr.visit_references(visitor);
                }
            }
            Expression::Object(object) => {
                for (key, value) in object {
                    key.visit_references(visitor);
                    value.visit_references(visitor);
                }
            }
            Expression::Literal(_)
            | Expression::Variable(_)
            | Expression::Local(_)
            | Expression::CountIndex
            | Expression::Unsupported(_) => {}
        }
    }
}
