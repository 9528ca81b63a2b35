//! Default validation rules
//!
//! Validation runs after the rewrite rules reach a fixpoint. Each rule
//! inspects one node; the analyzer collects every violation across the
//! tree before reporting.

use super::ValidationRule;
use crate::error::{Error, Result};
use crate::plan::{DatabaseSource, Node};

pub fn default_validation_rules() -> Vec<ValidationRule> {
    vec![
        ValidationRule {
            name: "validate_resolved",
            apply: validate_resolved,
        },
        ValidationRule {
            name: "validate_order_by",
            apply: validate_order_by,
        },
    ]
}

/// Reports any table, column or function reference that survived
/// analysis unresolved.
fn validate_resolved(node: &Node) -> Result<()> {
    match node {
        Node::UnresolvedTable { name, database } => Err(Error::UnresolvedReference {
            name: name.clone(),
            table: database.clone(),
        }),
        Node::ShowTables {
            database: DatabaseSource::Unresolved(name),
        } => Err(Error::UnresolvedReference {
            name: name.clone().unwrap_or_else(|| "show tables".to_string()),
            table: None,
        }),
        Node::ShowDatabases { catalog: None } => Err(Error::UnresolvedReference {
            name: "show databases".to_string(),
            table: None,
        }),
        _ => {
            for expr in node.expressions() {
                if let Some((name, table)) = expr.first_unresolved() {
                    return Err(Error::UnresolvedReference { name, table });
                }
            }
            Ok(())
        }
    }
}

/// Sort keys must not contain aggregate expressions.
fn validate_order_by(node: &Node) -> Result<()> {
    if let Node::Sort { fields, .. } = node {
        for field in fields {
            if field.expr.contains_aggregate() {
                return Err(Error::Validation(
                    "sorting on aggregate expressions is not supported".to_string(),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{AggregateFunc, Expression};
    use crate::plan::{Direction, NullOrdering, SortField};
    use crate::types::{DataType, Value};

    #[test]
    fn test_validate_resolved_flags_placeholders() {
        let node = Node::filter(
            Expression::column("ghost"),
            Node::Unsupported {
                message: String::new(),
                schema: vec![],
                rows: vec![],
            },
        );
        assert_eq!(
            validate_resolved(&node).unwrap_err(),
            Error::UnresolvedReference {
                name: "ghost".into(),
                table: None,
            }
        );
    }

    #[test]
    fn test_validate_resolved_accepts_resolved_node() {
        let node = Node::filter(
            Expression::Literal(Value::Bool(true), DataType::Bool),
            Node::Unsupported {
                message: String::new(),
                schema: vec![],
                rows: vec![],
            },
        );
        assert!(validate_resolved(&node).is_ok());
    }

    #[test]
    fn test_validate_order_by_rejects_aggregates() {
        let node = Node::sort(
            vec![SortField {
                expr: Expression::Aggregate {
                    func: AggregateFunc::Count,
                    arg: Box::new(Expression::Star { table: None }),
                },
                direction: Direction::Ascending,
                null_ordering: NullOrdering::NullsFirst,
            }],
            Node::Unsupported {
                message: String::new(),
                schema: vec![],
                rows: vec![],
            },
        );
        assert!(matches!(
            validate_order_by(&node).unwrap_err(),
            Error::Validation(_)
        ));
    }
}
