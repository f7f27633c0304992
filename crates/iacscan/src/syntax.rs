//! raw syntax model
//!
//! Root blocks of a configuration with their attributes already lowered to [Expression] nodes. Built once per scan
//! by [crate::module::Module::new] and never modified afterwards.
use crate::expression::Expression;
use crate::hcl_documents::Source;
use crate::lower::lower;
use hcl_edit::structure::Structure;
use indexmap::IndexMap;

/// Managed resources and data sources live in separate namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceMode {
    Managed,
    Data,
}

/// Address of a resource or data block, `aws_s3_bucket.logs` or `data.aws_iam_policy_document.read`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct ResourceKey {
    pub mode: ResourceMode,
    pub resource_type: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(mode: ResourceMode, resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mode,
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    pub fn managed(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ResourceMode::Managed, resource_type, name)
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.mode == ResourceMode::Data {
            f.write_str("data.")?;
        }
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Resource,
    Data,
    Variable,
    Locals,
    /// `provider`, `terraform`, `output`, `module`, ... - kept but not analyzed
    Other(String),
}

impl BlockKind {
    pub fn from_ident(ident: &str) -> Self {
        match ident {
            "resource" => BlockKind::Resource,
            "data" => BlockKind::Data,
            "variable" => BlockKind::Variable,
            "locals" => BlockKind::Locals,
            other => BlockKind::Other(other.to_string()),
        }
    }
}

/// A root block
#[derive(Debug, Clone)]
pub struct Block {
    pub kind: BlockKind,
    pub labels: Vec<String>,
    pub body: Body,
    pub source: Source,
}

impl Block {
    pub fn from_hcl(block: &hcl_edit::structure::Block, source: &Source) -> Self {
        Self {
            kind: BlockKind::from_ident(block.ident.value().as_str()),
            labels: block.labels.iter().map(|label| label.as_str().to_string()).collect(),
            body: Body::from(&block.body),
            source: source.clone(),
        }
    }

    /// Key of a resource or data block
    ///
    /// `None` for other kinds of blocks or when the labels are not `"<type>" "<name>"`.
    pub fn resource_key(&self) -> Option<ResourceKey> {
        let mode = match self.kind {
            BlockKind::Resource => ResourceMode::Managed,
            BlockKind::Data => ResourceMode::Data,
            _ => return None,
        };

        match self.labels.as_slice() {
            [resource_type, name] => Some(ResourceKey::new(mode, resource_type, name)),
            _ => None,
        }
    }
}

/// Attributes and nested blocks of a block
#[derive(Debug, Clone, Default)]
pub struct Body {
    pub attributes: IndexMap<String, Expression>,
    pub blocks: Vec<NestedBlock>,
}

impl Body {
    pub fn attribute(&self, name: &str) -> Option<&Expression> {
        self.attributes.get(name)
    }
}

impl From<&hcl_edit::structure::Body> for Body {
    fn from(value: &hcl_edit::structure::Body) -> Self {
        let mut body = Body::default();

        for structure in value.iter() {
            match structure {
                Structure::Attribute(attribute) => {
                    let expr: hcl::Expression = attribute.value.clone().into();
                    body.attributes
                        .insert(attribute.key.value().as_str().to_string(), lower(&expr));
                }
                Structure::Block(block) => body.blocks.push(NestedBlock {
                    ident: block.ident.value().as_str().to_string(),
                    labels: block.labels.iter().map(|label| label.as_str().to_string()).collect(),
                    body: Body::from(&block.body),
                }),
            }
        }

        body
    }
}

/// A block inside a block, `versioning { enabled = true }`
#[derive(Debug, Clone)]
pub struct NestedBlock {
    pub ident: String,
    pub labels: Vec<String>,
    pub body: Body,
}
