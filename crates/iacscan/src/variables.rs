//! Input variables
//!
//! A [VariableContext] binds every declared variable of a [crate::module::Module] to a value. Lookup order:
//!
//! 1. an override ([Overrides]) - from `TF_VAR_<name>` environment variables or `.tfvars` files
//! 2. the declared `default`
//! 3. [Value::Unknown]
//!
//! [Lookup::has_default] keeps track of whether a declared default exists. An undeclared default is what makes a
//! `count = var.x` unknown, see [crate::count].
use crate::expression::Expression;
use crate::hcl_documents::LoadError;
use crate::lower::lower;
use crate::resolve::Resolver;
use crate::value::Value;
use hcl_edit::structure::Structure;
use indexmap::IndexMap;
use std::path::Path;

/// Prefix of environment variables that set input variables
pub const ENV_PREFIX: &str = "TF_VAR_";

/// A `variable "<name>" { default = ... }` block
#[derive(Debug, Clone, derive_new::new)]
pub struct VariableDeclaration {
    pub name: String,
    pub default: Option<Expression>,
}

impl VariableDeclaration {
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Externally supplied variable values
///
/// Later insertions win, so sources should be merged from lowest to highest precedence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    values: IndexMap<String, Value>,
}

impl Overrides {
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Merge `other` into `self`, values of `other` win
    pub fn merge(&mut self, other: Overrides) {
        self.values.extend(other.values);
    }

    /// Collect `TF_VAR_<name>` entries
    ///
    /// Values are taken as strings, conversion happens where the value is used.
    pub fn from_env_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut overrides = Self::default();
        for (key, value) in vars {
            if let Some(name) = key.strip_prefix(ENV_PREFIX) {
                if !name.is_empty() {
                    tracing::debug!(%name, "variable set from environment");
                    overrides.set(name, value);
                }
            }
        }
        overrides
    }

    pub fn from_env() -> Self {
        Self::from_env_vars(std::env::vars())
    }

    /// Parse the contents of a `.tfvars` file
    ///
    /// Every root attribute is a variable assignment. Expressions are resolved without any context: references
    /// resolve to [Value::Unknown].
    pub fn parse_tfvars(src: &str) -> Result<Self, hcl_edit::parser::Error> {
        let body = hcl_edit::parser::parse_body(src)?;
        let resolver = Resolver::constant();

        let mut overrides = Self::default();
        for structure in body.iter() {
            let Structure::Attribute(attribute) = structure else {
                tracing::warn!("ignoring block in tfvars file");
                continue;
            };

            let expr: hcl::Expression = attribute.value.clone().into();
            let value = resolver.resolve(&lower(&expr));
            overrides.set(attribute.key.value().as_str(), value);
        }

        Ok(overrides)
    }

    pub fn load_tfvars(path: &Path) -> Result<Self, LoadError> {
        tracing::info!(path=%path.display(), "loading variables");
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::parse_tfvars(&contents)?)
    }
}

/// Result of [VariableContext::lookup]
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub value: Value,
    pub has_default: bool,
    pub declared: bool,
}

#[derive(Debug, Clone)]
struct Variable {
    /// resolved default, unknown without default
    default: Value,
    has_default: bool,
}

/// Variable bindings of one configuration unit
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    variables: IndexMap<String, Variable>,
    overrides: Overrides,
}

impl VariableContext {
    /// Bind declarations to overrides
    ///
    /// Defaults are constant expressions, they are resolved once here.
    pub fn new<'a>(
        declarations: impl IntoIterator<Item = &'a VariableDeclaration>,
        overrides: Overrides,
    ) -> Self {
        let resolver = Resolver::constant();
        let variables = declarations
            .into_iter()
            .map(|declaration| {
                let default = declaration
                    .default
                    .as_ref()
                    .map(|expr| resolver.resolve(expr))
                    .unwrap_or_default();
                let variable = Variable {
                    default,
                    has_default: declaration.has_default(),
                };
                (declaration.name.clone(), variable)
            })
            .collect();

        Self {
            variables,
            overrides,
        }
    }

    pub fn lookup(&self, name: &str) -> Lookup {
        let variable = self.variables.get(name);
        let has_default = variable.is_some_and(|v| v.has_default);
        let declared = variable.is_some();

        let value = match (self.overrides.get(name), variable) {
            (Some(value), _) => value.clone(),
            (None, Some(variable)) => variable.default.clone(),
            (None, None) => {
                tracing::debug!(%name, "reference to undeclared variable");
                Value::Unknown
            }
        };

        Lookup {
            value,
            has_default,
            declared,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn declarations() -> Vec<VariableDeclaration> {
        vec![
            VariableDeclaration::new("enabled".into(), Some(Expression::literal(false))),
            VariableDeclaration::new("count".into(), None),
        ]
    }

    #[test]
    fn default_is_used() {
        let context = VariableContext::new(&declarations(), Overrides::default());
        assert_eq!(
            context.lookup("enabled"),
            Lookup {
                value: Value::Boolean(false),
                has_default: true,
                declared: true
            }
        );
    }

    #[test]
    fn no_default_is_unknown() {
        let context = VariableContext::new(&declarations(), Overrides::default());
        assert_eq!(
            context.lookup("count"),
            Lookup {
                value: Value::Unknown,
                has_default: false,
                declared: true
            }
        );
        assert!(!context.lookup("undeclared").declared);
        assert_eq!(context.lookup("undeclared").value, Value::Unknown);
    }

    #[test]
    fn override_wins() {
        let mut overrides = Overrides::default();
        overrides.set("enabled", true);
        overrides.set("count", 3i64);

        let context = VariableContext::new(&declarations(), overrides);
        assert_eq!(context.lookup("enabled").value, Value::Boolean(true));
        assert_eq!(context.lookup("count").value, Value::Integer(3));
        assert!(!context.lookup("count").has_default);
    }

    #[test]
    fn env_vars() {
        let overrides = Overrides::from_env_vars([
            ("TF_VAR_enabled".to_string(), "true".to_string()),
            ("TF_VAR_".to_string(), "ignored".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ]);
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides.get("enabled"), Some(&Value::from("true")));
    }

    #[test]
    fn tfvars() {
        let overrides = Overrides::parse_tfvars(
            r#"
            enabled = true
            instances = 2
            rules = [{ to_port = "80" }]
            bucket = aws_s3_bucket.logs.id
            "#,
        )
        .expect("valid tfvars");

        assert_eq!(overrides.get("enabled"), Some(&Value::Boolean(true)));
        assert_eq!(overrides.get("instances"), Some(&Value::Integer(2)));
        assert_eq!(
            overrides
                .get("rules")
                .map(|rules| rules.index(&Value::Integer(0)).get_attr("to_port")),
            Some(Value::from("80"))
        );
        assert_eq!(overrides.get("bucket"), Some(&Value::Unknown));
    }

    #[test]
    fn merge_prefers_later() {
        let mut base = Overrides::default();
        base.set("enabled", "false");
        let mut later = Overrides::default();
        later.set("enabled", true);

        base.merge(later);
        assert_eq!(base.get("enabled"), Some(&Value::Boolean(true)));
    }
}
