//! Plan analysis
//!
//! The analyzer applies an ordered list of rules to a plan until it
//! stops changing, then runs validation rules over the stabilized tree.
//! Rule application order matters: each rule receives the output of the
//! previous one, and rules must leave a plan untouched once nothing
//! applies so the fixpoint test can terminate.

mod rules;
mod validation;

pub use rules::default_rules;
pub use validation::default_validation_rules;

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::plan::Node;
use std::sync::Arc;

/// The most fixpoint iterations the analyzer attempts before giving up.
pub const MAX_ANALYSIS_ITERATIONS: usize = 1000;

/// A plan rewrite rule.
pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&Analyzer, Node) -> Result<Node>,
}

/// A rule validating a single node of the final tree.
pub struct ValidationRule {
    pub name: &'static str,
    pub apply: fn(&Node) -> Result<()>,
}

/// Analyzes plan trees: resolves names against the catalog, normalizes
/// the tree, and validates the result.
pub struct Analyzer {
    pub rules: Vec<Rule>,
    pub validation_rules: Vec<ValidationRule>,
    pub catalog: Arc<Catalog>,
    pub current_database: String,
}

impl Analyzer {
    /// Creates an analyzer with the default rule sets.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Analyzer {
            rules: default_rules(),
            validation_rules: default_validation_rules(),
            catalog,
            current_database: String::new(),
        }
    }

    pub fn with_database(mut self, name: &str) -> Self {
        self.current_database = name.to_string();
        self
    }

    /// Analyze the plan: apply all rules until the tree is structurally
    /// stable, then validate it. Validation failures are combined into
    /// a single error carrying every violation.
    pub fn analyze(&self, node: Node) -> Result<Node> {
        let mut cur = node;
        for _ in 0..MAX_ANALYSIS_ITERATIONS {
            let next = self.analyze_once(cur.clone())?;
            if next == cur {
                let errors = self.validate(&next);
                if !errors.is_empty() {
                    return Err(Error::join(errors));
                }
                return Ok(next);
            }
            cur = next;
        }
        Err(Error::ExceededMaxAnalysisIterations(MAX_ANALYSIS_ITERATIONS))
    }

    /// Run every rule once, in order.
    pub fn analyze_once(&self, node: Node) -> Result<Node> {
        let mut result = node;
        for rule in &self.rules {
            result = (rule.apply)(self, result)?;
        }
        Ok(result)
    }

    /// Pre-order validation over the tree, collecting every violation.
    fn validate(&self, node: &Node) -> Vec<Error> {
        let mut errors: Vec<Error> = self
            .validation_rules
            .iter()
            .filter_map(|rule| (rule.apply)(node).err())
            .collect();
        for child in node.children() {
            errors.extend(self.validate(child));
        }
        errors
    }
}
