//! Scan orchestration
//!
//! 1. bind variables ([VariableContext])
//! 2. resolve blocks in declaration order, evaluating `count` ([crate::count::materialize]) and registering the
//!    instances in the [ResourceGraph]
//! 3. run the rules ([Executor])
//! 4. apply the [ScanConfig] filters
//!
//! Blocks are resolved strictly in declaration order: a reference to a block declared later resolves to
//! [crate::value::Value::Unknown].
use crate::config::ScanConfig;
use crate::count::materialize;
use crate::executor::Executor;
use crate::graph::ResourceGraph;
use crate::module::Module;
use crate::registry::RuleRegistry;
use crate::report::{ScanReport, Warning};
use crate::resolve::Resolver;
use crate::variables::{Overrides, VariableContext};

/// Resolved state of a module
#[derive(Debug)]
pub struct Resolution {
    pub graph: ResourceGraph,
    pub warnings: Vec<Warning>,
}

/// Resolve every resource and data block of `module`
#[tracing::instrument(skip_all, fields(overrides = overrides.len()))]
pub fn resolve_module(module: &Module, overrides: Overrides) -> Resolution {
    let variables = VariableContext::new(module.variables().values(), overrides);
    let mut graph = ResourceGraph::default();
    let mut warnings = vec![];

    for block in module.resources() {
        let Some(key) = block.resource_key() else {
            continue;
        };

        let (instances, block_warnings) = {
            let resolver = Resolver::new(&variables, module.locals(), &graph);
            materialize(block, &key, &resolver)
        };

        warnings.extend(block_warnings);
        graph.insert(key, instances);
    }

    tracing::debug!(
        resources = graph.resource_count(),
        instances = graph.instance_count(),
        warnings = warnings.len(),
        "module resolved"
    );
    Resolution { graph, warnings }
}

#[derive(Debug, Clone)]
pub struct Scanner<'r> {
    registry: &'r RuleRegistry,
    config: ScanConfig,
    parallel: bool,
}

impl<'r> Scanner<'r> {
    pub fn new(registry: &'r RuleRegistry) -> Self {
        Self {
            registry,
            config: ScanConfig::default(),
            parallel: true,
        }
    }

    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn scan(&self, module: &Module, overrides: Overrides) -> ScanReport {
        let Resolution { graph, warnings } = resolve_module(module, overrides);
        self.scan_graph(&graph, warnings)
    }

    /// Run the rules on an already resolved graph
    pub fn scan_graph(&self, graph: &ResourceGraph, warnings: Vec<Warning>) -> ScanReport {
        let registry = self.config.apply_to_registry(self.registry);
        let results = Executor::new(&registry)
            .parallel(self.parallel)
            .execute(graph);
        let results = self.config.apply_to_results(results);

        tracing::info!(results = results.len(), "scan complete");
        ScanReport { results, warnings }
    }
}
