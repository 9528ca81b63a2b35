//! Default analyzer rules
//!
//! Each rule normalizes one aspect of the plan and leaves everything
//! else untouched, so the analyzer can drive them to a fixpoint.

use super::{Analyzer, Rule};
use crate::catalog::{CatalogRef, DatabaseRef};
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::plan::{DatabaseSource, Node};
use crate::types::{column_index, Schema};

pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "resolve_database",
            apply: resolve_database,
        },
        Rule {
            name: "resolve_tables",
            apply: resolve_tables,
        },
        Rule {
            name: "qualify_columns",
            apply: qualify_columns,
        },
        Rule {
            name: "resolve_columns",
            apply: resolve_columns,
        },
        Rule {
            name: "resolve_functions",
            apply: resolve_functions,
        },
        Rule {
            name: "pushdown_filters",
            apply: pushdown_filters,
        },
        Rule {
            name: "reorder_projection",
            apply: reorder_projection,
        },
    ]
}

/// Binds SHOW DATABASES to the catalog and SHOW TABLES to the named or
/// current database.
fn resolve_database(a: &Analyzer, node: Node) -> Result<Node> {
    node.transform_up(&|n| match n {
        Node::ShowDatabases { catalog: None } => Ok(Node::ShowDatabases {
            catalog: Some(CatalogRef(a.catalog.clone())),
        }),
        Node::ShowTables {
            database: DatabaseSource::Unresolved(name),
        } => {
            let db_name = name.as_deref().unwrap_or(&a.current_database);
            let db = a.catalog.database(db_name)?;
            Ok(Node::ShowTables {
                database: DatabaseSource::Resolved(DatabaseRef(db)),
            })
        }
        other => Ok(other),
    })
}

/// Replaces unresolved table references with catalog tables.
fn resolve_tables(a: &Analyzer, node: Node) -> Result<Node> {
    node.transform_up(&|n| match n {
        Node::UnresolvedTable { name, database } => {
            let db_name = database.as_deref().unwrap_or(&a.current_database);
            let table = a.catalog.table(db_name, &name)?;
            Ok(Node::resolved_table(table))
        }
        other => Ok(other),
    })
}

/// Attaches the source table to unqualified column names when the name
/// belongs to exactly one table of the node's input.
fn qualify_columns(_a: &Analyzer, node: Node) -> Result<Node> {
    node.transform_up(&|n| {
        if n.children().iter().any(|c| !c.resolved()) {
            return Ok(n);
        }
        let schema = child_schema(&n);
        if schema.is_empty() {
            return Ok(n);
        }

        n.map_expressions(&|e| match e {
            Expression::UnresolvedColumn { name, table: None } => {
                let matches: Vec<&str> = schema
                    .iter()
                    .filter(|c| c.name == name)
                    .map(|c| c.source.as_str())
                    .collect();
                match matches.len() {
                    0 => Ok(Expression::UnresolvedColumn { name, table: None }),
                    1 if !matches[0].is_empty() => Ok(Expression::UnresolvedColumn {
                        table: Some(matches[0].to_string()),
                        name,
                    }),
                    1 => Ok(Expression::UnresolvedColumn { name, table: None }),
                    _ => Err(Error::AmbiguousColumn(name)),
                }
            }
            other => Ok(other),
        })
    })
}

/// Binds column references to field indices and types from the node's
/// child schemas. Names that match nothing are left unresolved for the
/// validator to report.
fn resolve_columns(_a: &Analyzer, node: Node) -> Result<Node> {
    node.transform_up(&|n| {
        if n.children().iter().any(|c| !c.resolved()) {
            return Ok(n);
        }
        let schema = child_schema(&n);
        if schema.is_empty() {
            return Ok(n);
        }

        n.map_expressions(&|e| match e {
            Expression::UnresolvedColumn { name, table } => {
                match column_index(&schema, table.as_deref(), &name) {
                    Some(index) => {
                        let column = &schema[index];
                        Ok(Expression::GetField {
                            index,
                            data_type: column.data_type,
                            name: column.name.clone(),
                            table: column.source.clone(),
                            nullable: column.nullable,
                        })
                    }
                    None => Ok(Expression::UnresolvedColumn { name, table }),
                }
            }
            other => Ok(other),
        })
    })
}

/// Replaces unresolved function calls with the output of the registered
/// function factory.
fn resolve_functions(a: &Analyzer, node: Node) -> Result<Node> {
    node.transform_expressions_up(&|e| match e {
        Expression::UnresolvedFunction { name, args, .. } => {
            let factory = a.catalog.function(&name)?;
            factory(args)
        }
        other => Ok(other),
    })
}

/// Swaps a filter below a projection of pure field references so it
/// runs closer to the source, remapping predicate field indices.
fn pushdown_filters(_a: &Analyzer, node: Node) -> Result<Node> {
    node.transform_up(&|n| {
        if let Node::Filter { predicate, child } = &n {
            if let Node::Project {
                projections,
                parallelism,
                child: inner,
            } = child.as_ref()
            {
                if predicate.resolved() && projections.iter().all(is_field_reference) {
                    if let Some(remapped) = remap_through(predicate, projections) {
                        return Ok(Node::Project {
                            projections: projections.clone(),
                            parallelism: *parallelism,
                            child: Box::new(Node::Filter {
                                predicate: remapped,
                                child: inner.clone(),
                            }),
                        });
                    }
                }
            }
        }
        Ok(n)
    })
}

fn is_field_reference(e: &Expression) -> bool {
    match e {
        Expression::GetField { .. } => true,
        Expression::Alias(inner, _) => matches!(**inner, Expression::GetField { .. }),
        _ => false,
    }
}

/// Rewrite field references over the projection's output to reference
/// the projection's input instead.
fn remap_through(predicate: &Expression, projections: &[Expression]) -> Option<Expression> {
    predicate
        .transform_up(&|e| match e {
            Expression::GetField { index, .. } => {
                let target = projections.get(index).ok_or_else(|| {
                    Error::RowEvaluation(format!(
                        "field index {index} out of range for projection of {} expressions",
                        projections.len()
                    ))
                })?;
                let target = match target {
                    Expression::Alias(inner, _) => inner.as_ref(),
                    other => other,
                };
                Ok(target.clone())
            }
            other => Ok(other),
        })
        .ok()
}

/// Moves a sort below a projection when its keys only bind to the
/// projection's input, so the keys can resolve.
fn reorder_projection(_a: &Analyzer, node: Node) -> Result<Node> {
    node.transform_up(&|n| {
        if let Node::Sort { fields, child } = &n {
            if let Node::Project {
                projections,
                parallelism,
                child: inner,
            } = child.as_ref()
            {
                if inner.resolved() && projections.iter().all(|p| p.resolved()) {
                    let project_schema = child.schema();
                    let inner_schema = inner.schema();
                    let binds_below = fields.iter().any(|f| {
                        unresolved_columns(&f.expr).iter().any(|(name, table)| {
                            column_index(&project_schema, table.as_deref(), name).is_none()
                                && column_index(&inner_schema, table.as_deref(), name).is_some()
                        })
                    });
                    if binds_below {
                        return Ok(Node::Project {
                            projections: projections.clone(),
                            parallelism: *parallelism,
                            child: Box::new(Node::Sort {
                                fields: fields.clone(),
                                child: inner.clone(),
                            }),
                        });
                    }
                }
            }
        }
        Ok(n)
    })
}

fn unresolved_columns(e: &Expression) -> Vec<(String, Option<String>)> {
    let mut found = Vec::new();
    collect_unresolved_columns(e, &mut found);
    found
}

fn collect_unresolved_columns(e: &Expression, found: &mut Vec<(String, Option<String>)>) {
    if let Expression::UnresolvedColumn { name, table } = e {
        found.push((name.clone(), table.clone()));
    }
    for child in e.children() {
        collect_unresolved_columns(child, found);
    }
}

fn child_schema(node: &Node) -> Schema {
    node.children()
        .iter()
        .flat_map(|c| c.schema())
        .collect()
}
