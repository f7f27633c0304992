//! Rule execution
//!
//! Every rule of the registry is run against every instance it applies to. Results are ordered by instance
//! (declaration order, then instance index) and then by rule (registration order), independent of whether execution
//! was parallel.
//!
//! A check that returns an error or panics produces a [ResultStatus::EvaluationError] result, the remaining checks
//! still run.
use crate::graph::{ResourceGraph, ResourceInstance};
use crate::registry::RuleRegistry;
use crate::report::{ResultStatus, ScanResult};
use crate::rule::{CheckContext, Rule, Status};
use rayon::prelude::*;
use std::any::Any;
use std::panic::AssertUnwindSafe;

#[derive(Debug, Clone, Copy)]
pub struct Executor<'r> {
    registry: &'r RuleRegistry,
    parallel: bool,
}

impl<'r> Executor<'r> {
    pub fn new(registry: &'r RuleRegistry) -> Self {
        Self {
            registry,
            parallel: true,
        }
    }

    /// Run the checks of different instances on the rayon thread pool
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    #[tracing::instrument(skip_all)]
    pub fn execute(&self, graph: &ResourceGraph) -> Vec<ScanResult> {
        let instances: Vec<&ResourceInstance> = graph.instances().collect();
        tracing::debug!(
            instances = instances.len(),
            rules = self.registry.len(),
            parallel = self.parallel,
            "executing rules"
        );

        let results: Vec<Vec<ScanResult>> = if self.parallel {
            instances
                .par_iter()
                .map(|instance| self.execute_instance(instance, graph))
                .collect()
        } else {
            instances
                .iter()
                .map(|instance| self.execute_instance(instance, graph))
                .collect()
        };

        results.into_iter().flatten().collect()
    }

    fn execute_instance(&self, instance: &ResourceInstance, graph: &ResourceGraph) -> Vec<ScanResult> {
        self.registry
            .matching(&instance.key)
            .filter_map(|rule| run(rule, instance, graph))
            .collect()
    }
}

/// Run a single check, `None` if it does not apply
fn run(rule: &Rule, instance: &ResourceInstance, graph: &ResourceGraph) -> Option<ScanResult> {
    let ctx = CheckContext { instance, graph };
    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| rule.check.evaluate(&ctx)));

    let (status, message) = match outcome {
        Ok(Ok(Status::Passed)) => (ResultStatus::Passed, None),
        Ok(Ok(Status::Failed(message))) => (ResultStatus::Failed, Some(message)),
        Ok(Ok(Status::NotApplicable)) => {
            tracing::trace!(code = rule.code, address = %instance.address(), "not applicable");
            return None;
        }
        Ok(Err(err)) => {
            tracing::warn!(code = rule.code, address = %instance.address(), ?err, "check failed");
            (ResultStatus::EvaluationError, Some(format!("{err:#}")))
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(code = rule.code, address = %instance.address(), %message, "check panicked");
            (ResultStatus::EvaluationError, Some(message))
        }
    };

    Some(ScanResult::new(rule, instance, status, message))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("check panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("check panicked: {message}")
    } else {
        "check panicked".to_string()
    }
}
