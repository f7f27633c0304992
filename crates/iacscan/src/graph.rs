//! Resource graph
//!
//! Maps every resource and data block to its materialized instances. The graph is filled in declaration order while
//! blocks are resolved, and read-only once resolution completes. A key mapped to an empty list is a block with
//! `count = 0`: it was resolved, it just does not exist.
use crate::hcl_documents::Source;
use crate::resolve::{ContextError, Resolver};
use crate::syntax::{Body, ResourceKey};
use crate::value::Value;
use crate::visit::VisitReferences;
use indexmap::IndexMap;

#[derive(Debug, Default)]
pub struct ResourceGraph {
    resources: IndexMap<ResourceKey, Vec<ResourceInstance>>,
}

impl ResourceGraph {
    /// Register the instances of a block
    ///
    /// A block is registered once. Registering the same key again keeps the first registration.
    pub fn insert(&mut self, key: ResourceKey, instances: Vec<ResourceInstance>) {
        if self.resources.contains_key(&key) {
            tracing::warn!(%key, "resource registered twice, keeping first");
            return;
        }

        tracing::debug!(%key, instances = instances.len(), "resource resolved");
        self.resources.insert(key, instances);
    }

    /// Instance lookup as done by references
    ///
    /// Without an explicit index a block resolves only if it has exactly one instance.
    pub fn lookup(&self, key: &ResourceKey, index: Option<usize>) -> Option<&ResourceInstance> {
        let instances = self.resources.get(key)?;
        match index {
            Some(index) => instances.get(index),
            None if instances.len() == 1 => instances.first(),
            None => None,
        }
    }

    /// Every instance, in declaration order
    pub fn instances(&self) -> impl Iterator<Item = &ResourceInstance> {
        self.resources.values().flatten()
    }

    /// Every instance of the given resource type (any name, any mode)
    pub fn instances_of_type<'g>(
        &'g self,
        resource_type: &'g str,
    ) -> impl Iterator<Item = &'g ResourceInstance> {
        self.resources
            .iter()
            .filter(move |(key, _)| key.resource_type == resource_type)
            .flat_map(|(_, instances)| instances)
    }

    /// Number of registered blocks, including blocks without instances
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Number of instances
    pub fn instance_count(&self) -> usize {
        self.resources.values().map(Vec::len).sum()
    }
}

/// One materialized copy of a block
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceInstance {
    pub key: ResourceKey,
    /// `count.index` of this instance, `None` for blocks without `count`
    pub index: Option<usize>,
    pub body: ResolvedBody,
    pub source: Source,
}

impl ResourceInstance {
    /// `aws_s3_bucket.logs[0]` or `aws_s3_bucket.logs`
    pub fn address(&self) -> String {
        match self.index {
            Some(index) => format!("{}[{index}]", self.key),
            None => self.key.to_string(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&ResolvedAttribute> {
        self.body.attributes.get(name)
    }

    /// Value at a path of attribute names, as seen by a reference
    pub fn get_path(&self, path: &[String]) -> Value {
        let Some((first, rest)) = path.split_first() else {
            return self.body.to_value();
        };

        rest.iter()
            .fold(self.body.get(first), |value, segment| value.get_attr(segment))
    }
}

/// An attribute value together with the blocks its expression refers to
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAttribute {
    pub value: Value,
    pub references: Vec<Reference>,
}

impl ResolvedAttribute {
    /// Whether the expression of this attribute may refer to `instance`
    pub fn refers_to(&self, instance: &ResourceInstance) -> bool {
        self.references
            .iter()
            .any(|reference| reference.may_target(instance))
    }
}

/// A referenced block and, if it is known, the referenced instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub key: ResourceKey,
    /// `None` without explicit index or if the index is unknown
    pub index: Option<usize>,
}

impl Reference {
    pub fn may_target(&self, instance: &ResourceInstance) -> bool {
        self.key == instance.key
            && match (self.index, instance.index) {
                (Some(index), Some(instance_index)) => index == instance_index,
                _ => true,
            }
    }
}

/// A nested block after resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBlock {
    pub ident: String,
    pub labels: Vec<String>,
    pub body: ResolvedBody,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedBody {
    pub attributes: IndexMap<String, ResolvedAttribute>,
    pub blocks: Vec<ResolvedBlock>,
}

/// Attributes that configure a block rather than describe it
const META_ARGUMENTS: &[&str] = &["count"];

impl ResolvedBody {
    /// Resolve all attributes and nested blocks of `body`
    ///
    /// An attribute that fails to resolve is stored as [Value::Unknown], the failure is passed to `on_error` with the
    /// dotted attribute path.
    pub fn resolve(
        body: &Body,
        resolver: &Resolver,
        on_error: &mut dyn FnMut(String, ContextError),
    ) -> Self {
        Self::resolve_nested(body, resolver, "", on_error)
    }

    fn resolve_nested(
        body: &Body,
        resolver: &Resolver,
        prefix: &str,
        on_error: &mut dyn FnMut(String, ContextError),
    ) -> Self {
        let mut resolved = ResolvedBody::default();

        for (name, expr) in &body.attributes {
            if prefix.is_empty() && META_ARGUMENTS.contains(&name.as_str()) {
                continue;
            }

            let value = resolver.try_resolve(expr).unwrap_or_else(|err| {
                on_error(format!("{prefix}{name}"), err);
                Value::Unknown
            });
            let mut references: Vec<Reference> = expr
                .references()
                .iter()
                .map(|reference| Reference {
                    key: reference.key.clone(),
                    index: resolver.reference_index(reference),
                })
                .collect();
            references.dedup();

            resolved
                .attributes
                .insert(name.clone(), ResolvedAttribute { value, references });
        }

        for block in &body.blocks {
            let prefix = format!("{prefix}{}.", block.ident);
            resolved.blocks.push(ResolvedBlock {
                ident: block.ident.clone(),
                labels: block.labels.clone(),
                body: Self::resolve_nested(&block.body, resolver, &prefix, on_error),
            });
        }

        resolved
    }

    pub fn attribute(&self, name: &str) -> Option<&ResolvedAttribute> {
        self.attributes.get(name)
    }

    pub fn blocks_named<'b>(&'b self, ident: &'b str) -> impl Iterator<Item = &'b ResolvedBlock> {
        self.blocks.iter().filter(move |block| block.ident == ident)
    }

    /// An attribute value, or all nested blocks of that name as a list of objects
    pub fn get(&self, name: &str) -> Value {
        if let Some(attribute) = self.attributes.get(name) {
            return attribute.value.clone();
        }

        let blocks: Vec<Value> = self
            .blocks_named(name)
            .map(|block| block.body.to_value())
            .collect();
        if blocks.is_empty() {
            Value::Unknown
        } else {
            Value::Array(blocks)
        }
    }

    /// Follow a path of attribute and nested block names
    ///
    /// Nested blocks are entered through the first block of a name. `None` if something along the path is absent,
    /// `Some(Value::Unknown)` if presence cannot be determined.
    pub fn find(&self, path: &[&str]) -> Option<Value> {
        let (first, rest) = path.split_first()?;

        if let Some(attribute) = self.attributes.get(*first) {
            let mut value = attribute.value.clone();
            for segment in rest {
                value = match value {
                    Value::Object(mut object) => object.shift_remove(*segment)?,
                    _ => return Some(Value::Unknown),
                };
            }
            return Some(value);
        }

        let block = self.blocks_named(first).next()?;
        if rest.is_empty() {
            return Some(block.body.to_value());
        }
        block.body.find(rest)
    }

    /// Object view of this body
    pub fn to_value(&self) -> Value {
        let mut object: IndexMap<String, Value> = self
            .attributes
            .iter()
            .map(|(name, attribute)| (name.clone(), attribute.value.clone()))
            .collect();

        for block in &self.blocks {
            if object.contains_key(&block.ident) {
                continue;
            }
            object.insert(block.ident.clone(), self.get(&block.ident));
        }

        Value::Object(object)
    }
}
