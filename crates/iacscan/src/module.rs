//! A single configuration unit
//!
//! All root blocks of a set of [HclDocuments] validated and sorted by kind. Block order is declaration order: the
//! order of [HclDocuments::blocks].
use crate::expression::Expression;
use crate::hcl_documents::HclDocuments;
use crate::syntax::{Block, BlockKind, ResourceKey};
use crate::value::Value;
use crate::variables::VariableDeclaration;
use indexmap::IndexMap;

#[derive(Debug, Default)]
pub struct Module {
    /// Resource and data blocks in declaration order
    resources: Vec<Block>,

    /// Declared input variables
    variables: IndexMap<String, VariableDeclaration>,

    /// Local values of all `locals` blocks
    locals: IndexMap<String, Expression>,

    /// Blocks without meaning to the scanner (`provider`, `output`, ...)
    others: Vec<Block>,
}

impl Module {
    pub fn new(hcl_documents: &HclDocuments) -> Result<Self, ModuleErrors> {
        let mut _self = Self::default();
        let mut e = ModuleErrors::new();

        // block index of each key, used to report collisions
        let mut resource_index: std::collections::HashMap<ResourceKey, usize> = Default::default();
        let mut variable_index: std::collections::HashMap<String, usize> = Default::default();
        let mut local_index: std::collections::HashMap<String, usize> = Default::default();

        for (index, _source, _attribute) in hcl_documents.attributes() {
            e.log(Issue::RootAttribute(index))
        }

        for (index, source, hcl_block) in hcl_documents.blocks() {
            let block = Block::from_hcl(hcl_block, source);

            match &block.kind {
                BlockKind::Resource | BlockKind::Data => {
                    let Some(key) = block.resource_key() else {
                        e.log(Issue::ResourceLabelsInvalid(index));
                        continue;
                    };

                    if let Some(existing) = resource_index.get(&key) {
                        e.log(Issue::ResourceCollision {
                            existing: *existing,
                            new: index,
                        });
                        continue;
                    }

                    tracing::trace!(%key, "add resource");
                    resource_index.insert(key, index);
                    _self.resources.push(block);
                }
                BlockKind::Variable => {
                    let [name] = block.labels.as_slice() else {
                        e.log(Issue::VariableLabelInvalid(index));
                        continue;
                    };

                    if let Some(existing) = variable_index.get(name) {
                        e.log(Issue::VariableCollision {
                            existing: *existing,
                            new: index,
                        });
                        continue;
                    }

                    // `default = null` declares no default
                    let default = block
                        .body
                        .attribute("default")
                        .filter(|expr| **expr != Expression::Literal(Value::Unknown))
                        .cloned();

                    tracing::trace!(%name, has_default = default.is_some(), "add variable");
                    variable_index.insert(name.clone(), index);
                    _self
                        .variables
                        .insert(name.clone(), VariableDeclaration::new(name.clone(), default));
                }
                BlockKind::Locals => {
                    for (name, expr) in &block.body.attributes {
                        if let Some(existing) = local_index.get(name) {
                            e.log(Issue::LocalCollision {
                                name: name.clone(),
                                existing: *existing,
                                new: index,
                            });
                            continue;
                        }

                        local_index.insert(name.clone(), index);
                        _self.locals.insert(name.clone(), expr.clone());
                    }
                }
                BlockKind::Other(ident) => {
                    tracing::trace!(%ident, "ignoring block");
                    _self.others.push(block);
                }
            }
        }

        if !e.issues.is_empty() {
            return Err(e);
        };

        Ok(_self)
    }

    pub fn resources(&self) -> &[Block] {
        &self.resources
    }

    pub fn variables(&self) -> &IndexMap<String, VariableDeclaration> {
        &self.variables
    }

    pub fn locals(&self) -> &IndexMap<String, Expression> {
        &self.locals
    }

    pub fn others(&self) -> &[Block] {
        &self.others
    }
}

#[derive(derive_new::new, Debug)]
pub struct ModuleErrors {
    #[new(default)]
    issues: Vec<Issue>,
}

impl ModuleErrors {
    pub fn log(&mut self, issue: Issue) {
        tracing::trace!(?issue, "issue found");
        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }
}

impl std::error::Error for ModuleErrors {}

impl std::fmt::Display for ModuleErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid configuration ({} issues)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  {issue}")?;
        }
        Ok(())
    }
}

/// A problem with the configuration structure
///
/// Numbers are block (or root attribute) indices of [HclDocuments].
#[derive(Debug, PartialEq)]
pub enum Issue {
    RootAttribute(usize),
    ResourceLabelsInvalid(usize),
    ResourceCollision { existing: usize, new: usize },
    VariableLabelInvalid(usize),
    VariableCollision { existing: usize, new: usize },
    LocalCollision { name: String, existing: usize, new: usize },
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Issue::RootAttribute(index) => write!(f, "root attribute #{index} is not allowed"),
            Issue::ResourceLabelsInvalid(index) => {
                write!(f, "block #{index} needs exactly two labels: type and name")
            }
            Issue::ResourceCollision { existing, new } => {
                write!(f, "block #{new} redeclares the resource of block #{existing}")
            }
            Issue::VariableLabelInvalid(index) => {
                write!(f, "variable block #{index} needs exactly one label")
            }
            Issue::VariableCollision { existing, new } => {
                write!(f, "variable block #{new} redeclares the variable of block #{existing}")
            }
            Issue::LocalCollision {
                name,
                existing,
                new,
            } => write!(
                f,
                "local `{name}` in block #{new} is already declared in block #{existing}"
            ),
        }
    }
}
