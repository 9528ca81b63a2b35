//! Logical plan nodes
//!
//! A plan is a tree of nodes. Each node knows its output schema, its
//! children, whether it is fully resolved, and how to execute itself as
//! a row iterator. Transforms are post-order and non-mutating: they
//! rebuild the tree and hand every node to the callback, root last.

use crate::catalog::{CatalogRef, DatabaseRef, TableRef};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::execution::{
    DistinctIter, FilterIter, GroupByIter, JoinIter, LimitIter, OffsetIter, ParallelProjectIter,
    ProjectIter, RowIter, RowsIter, SortIter, SpanIter, UnionIter,
};
use crate::expression::Expression;
use crate::types::{Column, Context, DataType, Row, Schema, Value};
use std::sync::Arc;

/// Sort direction of one ORDER BY key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Where nulls sort relative to non-null values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullOrdering {
    NullsFirst,
    NullsLast,
}

/// One ORDER BY key.
#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    pub expr: Expression,
    pub direction: Direction,
    pub null_ordering: NullOrdering,
}

/// Scope of a configuration update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Session,
    Global,
}

/// A single configuration update of a SET node.
#[derive(Debug, Clone, PartialEq)]
pub struct SetUpdate {
    pub name: String,
    pub value: Expression,
}

/// The database a SHOW TABLES node reads from.
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseSource {
    /// Not yet bound; `None` means the session's current database.
    Unresolved(Option<String>),
    Resolved(DatabaseRef),
}

/// A node of the logical execution tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A table bound in the catalog.
    ResolvedTable(TableRef),
    /// A table reference not yet bound.
    UnresolvedTable {
        name: String,
        database: Option<String>,
    },
    /// Projection of expressions over the child. `parallelism >= 1`
    /// evaluates projections with that many workers; output order is
    /// then not deterministic.
    Project {
        projections: Vec<Expression>,
        parallelism: usize,
        child: Box<Node>,
    },
    /// Drops rows whose predicate is not boolean true.
    Filter {
        predicate: Expression,
        child: Box<Node>,
    },
    /// Grouped aggregation. The aggregates list is the output row in
    /// declaration order; an empty grouping list yields a single row.
    GroupBy {
        aggregates: Vec<Expression>,
        grouping: Vec<Expression>,
        child: Box<Node>,
    },
    Sort {
        fields: Vec<SortField>,
        child: Box<Node>,
    },
    Limit {
        limit: u64,
        child: Box<Node>,
    },
    Offset {
        offset: u64,
        child: Box<Node>,
    },
    InnerJoin {
        condition: Expression,
        left: Box<Node>,
        right: Box<Node>,
    },
    CrossJoin {
        left: Box<Node>,
        right: Box<Node>,
    },
    Distinct {
        child: Box<Node>,
    },
    /// Bag concatenation of two inputs with compatible schemas.
    Union {
        left: Box<Node>,
        right: Box<Node>,
    },
    /// Configuration updates, written when the iterator is requested.
    Set {
        scope: Scope,
        updates: Vec<SetUpdate>,
    },
    ShowTables {
        database: DatabaseSource,
    },
    ShowDatabases {
        catalog: Option<CatalogRef>,
    },
    /// Registers a view; persistence belongs to an external registry,
    /// so executing it yields no rows.
    CreateView {
        name: String,
        plan: Box<Node>,
    },
    /// A table created from the result of a query. Output columns carry
    /// the view name as their source.
    View {
        name: String,
        plan: Box<Node>,
        schema: Schema,
    },
    /// An UPDATE statement. No updatable table capability exists in
    /// this core, so executing it fails with `NotUpdatable`.
    Update {
        updates: Vec<(String, Expression)>,
        child: Box<Node>,
    },
    /// A tolerated but unsupported statement: logs a warning and emits
    /// a fixed row set instead of failing the query.
    Unsupported {
        message: String,
        schema: Schema,
        rows: Vec<Row>,
    },
}

impl Node {
    pub fn resolved_table(table: Arc<dyn crate::catalog::Table>) -> Node {
        Node::ResolvedTable(TableRef(table))
    }

    pub fn unresolved_table(name: &str) -> Node {
        Node::UnresolvedTable {
            name: name.to_string(),
            database: None,
        }
    }

    pub fn project(projections: Vec<Expression>, child: Node) -> Node {
        Node::Project {
            projections,
            parallelism: 0,
            child: Box::new(child),
        }
    }

    pub fn filter(predicate: Expression, child: Node) -> Node {
        Node::Filter {
            predicate,
            child: Box::new(child),
        }
    }

    pub fn group_by(aggregates: Vec<Expression>, grouping: Vec<Expression>, child: Node) -> Node {
        Node::GroupBy {
            aggregates,
            grouping,
            child: Box::new(child),
        }
    }

    pub fn sort(fields: Vec<SortField>, child: Node) -> Node {
        Node::Sort {
            fields,
            child: Box::new(child),
        }
    }

    pub fn limit(limit: u64, child: Node) -> Node {
        Node::Limit {
            limit,
            child: Box::new(child),
        }
    }

    pub fn offset(offset: u64, child: Node) -> Node {
        Node::Offset {
            offset,
            child: Box::new(child),
        }
    }

    pub fn inner_join(condition: Expression, left: Node, right: Node) -> Node {
        Node::InnerJoin {
            condition,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn cross_join(left: Node, right: Node) -> Node {
        Node::CrossJoin {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn distinct(child: Node) -> Node {
        Node::Distinct {
            child: Box::new(child),
        }
    }

    pub fn union(left: Node, right: Node) -> Node {
        Node::Union {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Wraps a resolved plan as a view, rewriting every output column's
    /// source to the view name.
    pub fn view(name: &str, plan: Node) -> Node {
        let schema = plan
            .schema()
            .into_iter()
            .map(|mut c| {
                c.source = name.to_string();
                c
            })
            .collect();
        Node::View {
            name: name.to_string(),
            plan: Box::new(plan),
            schema,
        }
    }

    /// The node kind, used for tracing spans and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::ResolvedTable(_) => "resolved_table",
            Node::UnresolvedTable { .. } => "unresolved_table",
            Node::Project { .. } => "project",
            Node::Filter { .. } => "filter",
            Node::GroupBy { .. } => "group_by",
            Node::Sort { .. } => "sort",
            Node::Limit { .. } => "limit",
            Node::Offset { .. } => "offset",
            Node::InnerJoin { .. } => "inner_join",
            Node::CrossJoin { .. } => "cross_join",
            Node::Distinct { .. } => "distinct",
            Node::Union { .. } => "union",
            Node::Set { .. } => "set",
            Node::ShowTables { .. } => "show_tables",
            Node::ShowDatabases { .. } => "show_databases",
            Node::CreateView { .. } => "create_view",
            Node::View { .. } => "view",
            Node::Update { .. } => "update",
            Node::Unsupported { .. } => "unsupported",
        }
    }

    /// Immediate child nodes. Views hide their plan from transforms.
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::ResolvedTable(_)
            | Node::UnresolvedTable { .. }
            | Node::Set { .. }
            | Node::ShowTables { .. }
            | Node::ShowDatabases { .. }
            | Node::View { .. }
            | Node::Unsupported { .. } => vec![],
            Node::Project { child, .. }
            | Node::Filter { child, .. }
            | Node::GroupBy { child, .. }
            | Node::Sort { child, .. }
            | Node::Limit { child, .. }
            | Node::Offset { child, .. }
            | Node::Distinct { child }
            | Node::Update { child, .. } => vec![child],
            Node::CreateView { plan, .. } => vec![plan],
            Node::InnerJoin { left, right, .. }
            | Node::CrossJoin { left, right }
            | Node::Union { left, right } => vec![left, right],
        }
    }

    /// This node's own embedded expressions, not including descendants.
    pub fn expressions(&self) -> Vec<&Expression> {
        match self {
            Node::Project { projections, .. } => projections.iter().collect(),
            Node::Filter { predicate, .. } => vec![predicate],
            Node::GroupBy {
                aggregates,
                grouping,
                ..
            } => aggregates.iter().chain(grouping.iter()).collect(),
            Node::Sort { fields, .. } => fields.iter().map(|f| &f.expr).collect(),
            Node::InnerJoin { condition, .. } => vec![condition],
            Node::Set { updates, .. } => updates.iter().map(|u| &u.value).collect(),
            Node::Update { updates, .. } => updates.iter().map(|(_, e)| e).collect(),
            _ => vec![],
        }
    }

    /// Whether every child node and embedded expression is resolved.
    pub fn resolved(&self) -> bool {
        match self {
            Node::UnresolvedTable { .. } => false,
            Node::ShowTables { database } => {
                matches!(database, DatabaseSource::Resolved(_))
            }
            Node::ShowDatabases { catalog } => catalog.is_some(),
            _ => {
                self.children().iter().all(|c| c.resolved())
                    && self.expressions().iter().all(|e| e.resolved())
            }
        }
    }

    /// The schema this node produces. Stable under structural equality;
    /// requires the node to be resolved where types come from
    /// expressions.
    pub fn schema(&self) -> Schema {
        match self {
            Node::ResolvedTable(table) => table.0.schema().clone(),
            Node::UnresolvedTable { .. } => vec![],
            Node::Project { projections, .. } => expression_schema(projections),
            Node::GroupBy { aggregates, .. } => expression_schema(aggregates),
            Node::Filter { child, .. }
            | Node::Sort { child, .. }
            | Node::Limit { child, .. }
            | Node::Offset { child, .. }
            | Node::Distinct { child }
            | Node::Update { child, .. } => child.schema(),
            Node::InnerJoin { left, right, .. } | Node::CrossJoin { left, right } => {
                let mut schema = left.schema();
                schema.extend(right.schema());
                schema
            }
            Node::Union { left, .. } => left.schema(),
            Node::Set { .. } => vec![
                Column::new("name", DataType::Text, false),
                Column::new("value", DataType::Text, false),
            ],
            Node::ShowTables { .. } => vec![Column::new("table", DataType::Text, false)],
            Node::ShowDatabases { .. } => {
                vec![Column::new("database", DataType::Text, false)]
            }
            Node::CreateView { .. } => vec![],
            Node::View { schema, .. } => schema.clone(),
            Node::Unsupported { schema, .. } => schema.clone(),
        }
    }

    /// Rebuild this node with the given children, preserving all other
    /// attributes. The number of children must match.
    pub fn with_children(&self, mut children: Vec<Node>) -> Result<Node> {
        let want = self.children().len();
        if children.len() != want {
            return Err(Error::InvalidChildrenNumber {
                node: self.kind().to_string(),
                got: children.len(),
                want,
            });
        }

        Ok(match self {
            Node::ResolvedTable(_)
            | Node::UnresolvedTable { .. }
            | Node::Set { .. }
            | Node::ShowTables { .. }
            | Node::ShowDatabases { .. }
            | Node::View { .. }
            | Node::Unsupported { .. } => self.clone(),
            Node::Project {
                projections,
                parallelism,
                ..
            } => Node::Project {
                projections: projections.clone(),
                parallelism: *parallelism,
                child: Box::new(children.remove(0)),
            },
            Node::Filter { predicate, .. } => Node::Filter {
                predicate: predicate.clone(),
                child: Box::new(children.remove(0)),
            },
            Node::GroupBy {
                aggregates,
                grouping,
                ..
            } => Node::GroupBy {
                aggregates: aggregates.clone(),
                grouping: grouping.clone(),
                child: Box::new(children.remove(0)),
            },
            Node::Sort { fields, .. } => Node::Sort {
                fields: fields.clone(),
                child: Box::new(children.remove(0)),
            },
            Node::Limit { limit, .. } => Node::Limit {
                limit: *limit,
                child: Box::new(children.remove(0)),
            },
            Node::Offset { offset, .. } => Node::Offset {
                offset: *offset,
                child: Box::new(children.remove(0)),
            },
            Node::Distinct { .. } => Node::Distinct {
                child: Box::new(children.remove(0)),
            },
            Node::Update { updates, .. } => Node::Update {
                updates: updates.clone(),
                child: Box::new(children.remove(0)),
            },
            Node::CreateView { name, .. } => Node::CreateView {
                name: name.clone(),
                plan: Box::new(children.remove(0)),
            },
            Node::InnerJoin { condition, .. } => {
                let left = children.remove(0);
                Node::InnerJoin {
                    condition: condition.clone(),
                    left: Box::new(left),
                    right: Box::new(children.remove(0)),
                }
            }
            Node::CrossJoin { .. } => {
                let left = children.remove(0);
                Node::CrossJoin {
                    left: Box::new(left),
                    right: Box::new(children.remove(0)),
                }
            }
            Node::Union { .. } => {
                let left = children.remove(0);
                Node::Union {
                    left: Box::new(left),
                    right: Box::new(children.remove(0)),
                }
            }
        })
    }

    /// Apply `f` post-order over the node tree, rebuilding it. The
    /// final call is on the root.
    pub fn transform_up<F>(&self, f: &F) -> Result<Node>
    where
        F: Fn(Node) -> Result<Node>,
    {
        let children = self
            .children()
            .iter()
            .map(|c| c.transform_up(f))
            .collect::<Result<Vec<_>>>()?;
        f(self.with_children(children)?)
    }

    /// Apply `g` bottom-up to this node's own embedded expressions,
    /// leaving children untouched.
    pub fn map_expressions<F>(&self, g: &F) -> Result<Node>
    where
        F: Fn(Expression) -> Result<Expression>,
    {
        Ok(match self {
            Node::Project {
                projections,
                parallelism,
                child,
            } => Node::Project {
                projections: transform_all(projections, g)?,
                parallelism: *parallelism,
                child: child.clone(),
            },
            Node::Filter { predicate, child } => Node::Filter {
                predicate: predicate.transform_up(g)?,
                child: child.clone(),
            },
            Node::GroupBy {
                aggregates,
                grouping,
                child,
            } => Node::GroupBy {
                aggregates: transform_all(aggregates, g)?,
                grouping: transform_all(grouping, g)?,
                child: child.clone(),
            },
            Node::Sort { fields, child } => Node::Sort {
                fields: fields
                    .iter()
                    .map(|field| {
                        Ok(SortField {
                            expr: field.expr.transform_up(g)?,
                            direction: field.direction,
                            null_ordering: field.null_ordering,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
                child: child.clone(),
            },
            Node::InnerJoin {
                condition,
                left,
                right,
            } => Node::InnerJoin {
                condition: condition.transform_up(g)?,
                left: left.clone(),
                right: right.clone(),
            },
            Node::Set { scope, updates } => Node::Set {
                scope: *scope,
                updates: updates
                    .iter()
                    .map(|u| {
                        Ok(SetUpdate {
                            name: u.name.clone(),
                            value: u.value.transform_up(g)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
            },
            Node::Update { updates, child } => Node::Update {
                updates: updates
                    .iter()
                    .map(|(name, e)| Ok((name.clone(), e.transform_up(g)?)))
                    .collect::<Result<Vec<_>>>()?,
                child: child.clone(),
            },
            other => other.clone(),
        })
    }

    /// Apply `g` bottom-up to every expression reachable in the tree,
    /// rebuilding child nodes first.
    pub fn transform_expressions_up<F>(&self, g: &F) -> Result<Node>
    where
        F: Fn(Expression) -> Result<Expression>,
    {
        let children = self
            .children()
            .iter()
            .map(|c| c.transform_expressions_up(g))
            .collect::<Result<Vec<_>>>()?;
        self.with_children(children)?.map_expressions(g)
    }

    /// Execute the node as a row iterator. Every iterator is wrapped in
    /// a tracing span finished exactly once on close.
    pub fn row_iter(&self, ctx: &Context) -> Result<Box<dyn RowIter>> {
        let span = ctx.span(self.kind());
        let iter: Box<dyn RowIter> = match self {
            Node::ResolvedTable(table) => table.0.scan(ctx)?,

            Node::UnresolvedTable { name, database } => {
                return Err(Error::UnresolvedReference {
                    name: name.clone(),
                    table: database.clone(),
                })
            }

            Node::Project {
                projections,
                parallelism,
                child,
            } => {
                let child_iter = child.row_iter(ctx)?;
                if *parallelism >= 1 {
                    Box::new(ParallelProjectIter::new(
                        projections.clone(),
                        ctx,
                        child_iter,
                        *parallelism,
                    ))
                } else {
                    Box::new(ProjectIter::new(
                        projections.clone(),
                        ctx.clone(),
                        child_iter,
                    ))
                }
            }

            Node::Filter { predicate, child } => Box::new(FilterIter::new(
                predicate.clone(),
                ctx.clone(),
                child.row_iter(ctx)?,
            )),

            Node::GroupBy {
                aggregates,
                grouping,
                child,
            } => Box::new(GroupByIter::new(
                aggregates.clone(),
                grouping.clone(),
                ctx.clone(),
                child.row_iter(ctx)?,
            )),

            Node::Sort { fields, child } => Box::new(SortIter::new(
                fields.clone(),
                ctx.clone(),
                child.row_iter(ctx)?,
            )),

            Node::Limit { limit, child } => {
                Box::new(LimitIter::new(*limit, child.row_iter(ctx)?))
            }

            Node::Offset { offset, child } => {
                Box::new(OffsetIter::new(*offset, child.row_iter(ctx)?))
            }

            Node::InnerJoin {
                condition,
                left,
                right,
            } => Box::new(JoinIter::new(
                Some(condition.clone()),
                ctx.clone(),
                left.row_iter(ctx)?,
                right.row_iter(ctx)?,
            )),

            Node::CrossJoin { left, right } => Box::new(JoinIter::new(
                None,
                ctx.clone(),
                left.row_iter(ctx)?,
                right.row_iter(ctx)?,
            )),

            Node::Distinct { child } => Box::new(DistinctIter::new(child.row_iter(ctx)?)),

            Node::Union { left, right } => Box::new(UnionIter::new(
                left.row_iter(ctx)?,
                right.row_iter(ctx)?,
            )),

            Node::Set { scope, updates } => Box::new(set_rows(ctx, *scope, updates)?),

            Node::ShowTables { database } => {
                let db = match database {
                    DatabaseSource::Resolved(db) => db,
                    DatabaseSource::Unresolved(name) => {
                        return Err(Error::UnresolvedReference {
                            name: name.clone().unwrap_or_else(|| "show tables".to_string()),
                            table: None,
                        })
                    }
                };
                let mut names: Vec<String> = db.0.tables().keys().cloned().collect();
                names.sort();
                Box::new(RowsIter::new(
                    names.into_iter().map(|n| vec![Value::Str(n)]).collect(),
                ))
            }

            Node::ShowDatabases { catalog } => {
                let catalog = catalog.as_ref().ok_or_else(|| Error::UnresolvedReference {
                    name: "show databases".to_string(),
                    table: None,
                })?;
                let mut names: Vec<String> = catalog
                    .0
                    .databases()
                    .iter()
                    .map(|db| db.name().to_string())
                    .collect();
                names.sort();
                Box::new(RowsIter::new(
                    names.into_iter().map(|n| vec![Value::Str(n)]).collect(),
                ))
            }

            Node::CreateView { .. } => Box::new(RowsIter::empty()),

            Node::View { plan, .. } => plan.row_iter(ctx)?,

            Node::Update { .. } => return Err(Error::NotUpdatable),

            Node::Unsupported { message, rows, .. } => {
                tracing::warn!("{message}");
                Box::new(RowsIter::new(rows.clone()))
            }
        };

        Ok(Box::new(SpanIter::new(span, iter)))
    }
}

fn transform_all<F>(exprs: &[Expression], g: &F) -> Result<Vec<Expression>>
where
    F: Fn(Expression) -> Result<Expression>,
{
    exprs.iter().map(|e| e.transform_up(g)).collect()
}

fn expression_schema(exprs: &[Expression]) -> Schema {
    exprs
        .iter()
        .map(|e| Column {
            name: e.name(),
            data_type: e.data_type(),
            nullable: e.nullable(),
            source: e.table().unwrap_or_default().to_string(),
        })
        .collect()
}

/// Evaluate the SET updates, write them into the session or global
/// config, and produce one `(name, coerced value)` row per update. The
/// target type follows the value expression's declared type.
fn set_rows(ctx: &Context, scope: Scope, updates: &[SetUpdate]) -> Result<RowsIter> {
    let conf: Arc<Config> = match scope {
        Scope::Global => ctx
            .config()
            .parent()
            .cloned()
            .ok_or(Error::UnableToAccessGlobalConfig)?,
        Scope::Session => ctx.config().clone(),
    };

    let mut pairs = Vec::with_capacity(updates.len());
    for update in updates {
        let value = update.value.eval(ctx, &vec![])?;
        let data_type = update.value.data_type();

        let coerced = if data_type.is_numeric() {
            if data_type.is_decimal() {
                match DataType::F64.convert(&value)? {
                    Value::F64(f) => {
                        conf.set_float(&update.name, f);
                        Value::F64(f)
                    }
                    other => return Err(set_null_error(&update.name, &other)),
                }
            } else {
                match DataType::I64.convert(&value)? {
                    Value::I64(i) => {
                        conf.set_int(&update.name, i);
                        Value::I64(i)
                    }
                    other => return Err(set_null_error(&update.name, &other)),
                }
            }
        } else if data_type.is_boolean() {
            match DataType::Bool.convert(&value)? {
                Value::Bool(b) => {
                    conf.set_bool(&update.name, b);
                    Value::Bool(b)
                }
                other => return Err(set_null_error(&update.name, &other)),
            }
        } else {
            match DataType::Text.convert(&value)? {
                Value::Str(s) => {
                    conf.set_string(&update.name, &s);
                    Value::Str(s)
                }
                other => return Err(set_null_error(&update.name, &other)),
            }
        };

        pairs.push(vec![Value::Str(update.name.clone()), coerced]);
    }

    Ok(RowsIter::new(pairs))
}

fn set_null_error(name: &str, value: &Value) -> Error {
    Error::InvalidValue(format!("cannot set configuration key {name} to {value}"))
}
