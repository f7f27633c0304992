//! # iacscan - static security scanner for terraform configuration
//!
//! For CLI usage see `iacscan --help`.
//!
//! ## Introduction for developers
//!
//! Read this to understand how `iacscan` works internally.
//!
//! ### Loading files
//!
//! Every `.tf` file is parsed as a `body` ([hcl_edit::structure::Body]). All files of a directory form one
//! configuration unit. [hcl_documents::HclDocuments] stores all root attributes and blocks of all documents, tracks
//! their source path and assigns each an index. Files are loaded in file name order, which makes the block index the
//! declaration order.
//!
//! ### Structure
//!
//! see [module::Module::new]
//!
//! Root blocks are sorted by kind:
//!
//! - `resource` and `data` blocks, addressed by [syntax::ResourceKey] (`aws_s3_bucket.logs`, `data.aws_ami.ubuntu`)
//! - `variable` declarations, with their optional `default`
//! - `locals`, merged into one namespace
//! - everything else (`provider`, `output`, ...) which is kept but not analyzed
//!
//! Attribute values are lowered ([lower::lower]) from [hcl::Expression] into the small [expression::Expression] tree
//! the resolver understands. Unsupported syntax (function calls, `for` expressions, splats) becomes
//! [expression::Expression::Unsupported].
//!
//! ### Values
//!
//! [value::Value] is a JSON-like value with one addition: [value::Value::Unknown]. Anything that can not be known
//! statically is unknown: a variable without default, an attribute computed by the provider (`aws_s3_bucket.logs.id`),
//! a function call. Unknown values propagate through every operation, a conditional with an unknown condition is
//! unknown.
//!
//! ### Resolution
//!
//! see [scanner::resolve_module]
//!
//! Blocks are resolved one after another in declaration order:
//!
//! 1. evaluate `count` ([count::evaluate_count])
//! 2. resolve every attribute once per instance, `count.index` bound to the instance index ([resolve::Resolver])
//! 3. register the instances in the [graph::ResourceGraph]
//!
//! References to other blocks are looked up in the graph. A block that has not been resolved yet (declared later)
//! resolves to unknown.
//!
//! A block with a known `count = 0` has no instances, nothing is reported for it. An unknown count is assumed to be
//! `1` ([count::UNKNOWN_COUNT_INSTANCES]).
//!
//! ### Rules
//!
//! A [rule::Rule] is data: a code, a severity, the block types it applies to and a [rule::Check]. Rules live in a
//! [registry::RuleRegistry], the builtin ones in [rules]. [executor::Executor] runs every matching rule on every
//! instance and collects a [report::ScanResult] per pair, in graph order then registry order. Checks that can not
//! decide (the values they need are unknown) are not reported.
//!
//! ### Output
//!
//! A [report::ScanReport] holds results and configuration [report::Warning]s and serializes via [serde].
//!
pub mod config;
pub mod count;
pub mod executor;
pub mod expression;
pub mod graph;
pub mod hcl_documents;
pub mod lower;
pub mod module;
pub mod registry;
pub mod report;
pub mod resolve;
pub mod rule;
pub mod rules;
pub mod scanner;
pub mod syntax;
pub mod value;
pub mod variables;
mod visit;
