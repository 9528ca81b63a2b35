//! Expression trees
//!
//! An expression is a scalar computation over a row, made up of nested
//! operations and values. Unresolved placeholder variants stand in for
//! names the analyzer has not bound yet; they participate in transforms
//! by child arity only and fail loudly when typed or evaluated.

mod eval;

pub mod aggregate;

pub use aggregate::{AggBuffer, AggregateFunc};

use crate::error::{Error, Result};
use crate::plan::Node;
use crate::types::{DataType, Value};
use std::fmt;

/// Comparison operators. Every comparison dispatches through the LEFT
/// operand's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equals,
    LessThan,
    GreaterThan,
    LessThanOrEquals,
    GreaterThanOrEquals,
    Regexp,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Equals => "=",
            CompareOp::LessThan => "<",
            CompareOp::GreaterThan => ">",
            CompareOp::LessThanOrEquals => "<=",
            CompareOp::GreaterThanOrEquals => ">=",
            CompareOp::Regexp => "REGEXP",
        }
    }
}

/// Arithmetic operators over numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
}

impl ArithmeticOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
            ArithmeticOp::Remainder => "%",
        }
    }
}

/// Builtin scalar functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFunc {
    Lower,
    Upper,
    Length,
    Concat,
}

impl ScalarFunc {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarFunc::Lower => "lower",
            ScalarFunc::Upper => "upper",
            ScalarFunc::Length => "length",
            ScalarFunc::Concat => "concat",
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ScalarFunc::Length => DataType::I64,
            _ => DataType::Text,
        }
    }
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A constant value with its declared type.
    Literal(Value, DataType),
    /// A resolved column reference, bound to a field index in the row.
    GetField {
        index: usize,
        data_type: DataType,
        name: String,
        table: String,
        nullable: bool,
    },
    /// A renamed expression.
    Alias(Box<Expression>, String),
    /// All columns, optionally qualified. Only valid once resolved away,
    /// except as the argument of COUNT.
    Star { table: Option<String> },
    /// A column reference not yet bound to a field index.
    UnresolvedColumn {
        name: String,
        table: Option<String>,
    },
    /// A function call not yet bound to a registered function.
    UnresolvedFunction {
        name: String,
        aggregate: bool,
        args: Vec<Expression>,
    },
    /// A field access on a value whose shape is not yet known.
    UnresolvedField {
        base: Box<Expression>,
        name: String,
    },
    /// A comparison between two expressions.
    Compare {
        op: CompareOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// An arithmetic operation between two expressions.
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    /// A fixed-size collection of expressions. A tuple of arity 1 is
    /// treated as the expression itself.
    Tuple(Vec<Expression>),
    /// A call to a builtin scalar function.
    Scalar {
        func: ScalarFunc,
        args: Vec<Expression>,
    },
    /// An aggregation over the rows of a group.
    Aggregate {
        func: AggregateFunc,
        arg: Box<Expression>,
    },
    /// A subquery placeholder. Evaluates to null; real subquery
    /// execution belongs to the planner front-end.
    Subquery(Box<Node>),
}

impl Expression {
    pub fn literal(value: Value, data_type: DataType) -> Expression {
        Expression::Literal(value, data_type)
    }

    pub fn column(name: &str) -> Expression {
        Expression::UnresolvedColumn {
            name: name.to_string(),
            table: None,
        }
    }

    pub fn qualified_column(table: &str, name: &str) -> Expression {
        Expression::UnresolvedColumn {
            name: name.to_string(),
            table: Some(table.to_string()),
        }
    }

    /// Whether all names in this expression have been bound.
    pub fn resolved(&self) -> bool {
        match self {
            Expression::Literal(..) | Expression::GetField { .. } | Expression::Subquery(_) => true,
            Expression::Star { .. }
            | Expression::UnresolvedColumn { .. }
            | Expression::UnresolvedFunction { .. }
            | Expression::UnresolvedField { .. } => false,
            // COUNT(*) keeps the star as its argument.
            Expression::Aggregate {
                func: AggregateFunc::Count,
                arg,
            } if matches!(**arg, Expression::Star { .. }) => true,
            other => other.children().iter().all(|c| c.resolved()),
        }
    }

    /// The declared type of the expression. Must only be queried on
    /// resolved expressions.
    pub fn data_type(&self) -> DataType {
        match self {
            Expression::Literal(_, dt) => *dt,
            Expression::GetField { data_type, .. } => *data_type,
            Expression::Alias(child, _) => child.data_type(),
            Expression::Compare { .. }
            | Expression::And(..)
            | Expression::Or(..)
            | Expression::Not(_) => DataType::Bool,
            Expression::Arithmetic { left, right, .. } => {
                promote(left.data_type(), right.data_type())
            }
            Expression::Tuple(exprs) if exprs.len() == 1 => exprs[0].data_type(),
            Expression::Tuple(_) => DataType::Tuple,
            Expression::Scalar { func, .. } => func.data_type(),
            Expression::Aggregate { func, arg } => func.data_type(arg),
            Expression::Subquery(_) => DataType::Tuple,
            Expression::Star { .. } => {
                panic!("star is a placeholder expression, but data_type was called")
            }
            Expression::UnresolvedColumn { .. } => {
                panic!("unresolved column is a placeholder expression, but data_type was called")
            }
            Expression::UnresolvedFunction { .. } => {
                panic!("unresolved function is a placeholder expression, but data_type was called")
            }
            Expression::UnresolvedField { .. } => {
                panic!("unresolved field is a placeholder expression, but data_type was called")
            }
        }
    }

    /// Whether the expression can evaluate to null. Must only be queried
    /// on resolved expressions.
    pub fn nullable(&self) -> bool {
        match self {
            Expression::Literal(value, _) => value.is_null(),
            Expression::GetField { nullable, .. } => *nullable,
            Expression::Alias(child, _) | Expression::Not(child) => child.nullable(),
            Expression::Compare { left, right, .. }
            | Expression::Arithmetic { left, right, .. } => left.nullable() || right.nullable(),
            Expression::And(left, right) | Expression::Or(left, right) => {
                left.nullable() || right.nullable()
            }
            Expression::Tuple(exprs) if exprs.len() == 1 => exprs[0].nullable(),
            Expression::Tuple(_) => false,
            Expression::Scalar { args, .. } => args.iter().any(|a| a.nullable()),
            Expression::Aggregate { func, .. } => func.nullable(),
            Expression::Subquery(_) => true,
            Expression::Star { .. } => {
                panic!("star is a placeholder expression, but nullable was called")
            }
            Expression::UnresolvedColumn { .. } => {
                panic!("unresolved column is a placeholder expression, but nullable was called")
            }
            Expression::UnresolvedFunction { .. } => {
                panic!("unresolved function is a placeholder expression, but nullable was called")
            }
            Expression::UnresolvedField { .. } => {
                panic!("unresolved field is a placeholder expression, but nullable was called")
            }
        }
    }

    /// The output column name this expression produces.
    pub fn name(&self) -> String {
        match self {
            Expression::Alias(_, name) => name.clone(),
            Expression::GetField { name, .. } => name.clone(),
            Expression::UnresolvedColumn { name, .. } => name.clone(),
            Expression::Tuple(exprs) if exprs.len() == 1 => exprs[0].name(),
            other => other.to_string(),
        }
    }

    /// The source table of the column this expression forwards, if any.
    pub fn table(&self) -> Option<&str> {
        match self {
            Expression::GetField { table, .. } if !table.is_empty() => Some(table),
            Expression::Tuple(exprs) if exprs.len() == 1 => exprs[0].table(),
            _ => None,
        }
    }

    /// Immediate child expressions.
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Literal(..)
            | Expression::GetField { .. }
            | Expression::Star { .. }
            | Expression::UnresolvedColumn { .. }
            | Expression::Subquery(_) => vec![],
            Expression::Alias(child, _)
            | Expression::Not(child)
            | Expression::UnresolvedField { base: child, .. }
            | Expression::Aggregate { arg: child, .. } => vec![child],
            Expression::Compare { left, right, .. }
            | Expression::Arithmetic { left, right, .. }
            | Expression::And(left, right)
            | Expression::Or(left, right) => vec![left, right],
            Expression::Tuple(exprs) => exprs.iter().collect(),
            Expression::Scalar { args, .. } => args.iter().collect(),
            Expression::UnresolvedFunction { args, .. } => args.iter().collect(),
        }
    }

    /// Rebuild this expression with the given children, preserving all
    /// non-child attributes. The number of children must match.
    pub fn with_children(&self, mut children: Vec<Expression>) -> Result<Expression> {
        let want = self.children().len();
        if children.len() != want {
            return Err(Error::InvalidChildrenNumber {
                node: self.to_string(),
                got: children.len(),
                want,
            });
        }

        Ok(match self {
            Expression::Literal(..)
            | Expression::GetField { .. }
            | Expression::Star { .. }
            | Expression::UnresolvedColumn { .. }
            | Expression::Subquery(_) => self.clone(),
            Expression::Alias(_, name) => {
                Expression::Alias(Box::new(children.remove(0)), name.clone())
            }
            Expression::Not(_) => Expression::Not(Box::new(children.remove(0))),
            Expression::UnresolvedField { name, .. } => Expression::UnresolvedField {
                base: Box::new(children.remove(0)),
                name: name.clone(),
            },
            Expression::Aggregate { func, .. } => Expression::Aggregate {
                func: *func,
                arg: Box::new(children.remove(0)),
            },
            Expression::Compare { op, .. } => Expression::Compare {
                op: *op,
                left: Box::new(children.remove(0)),
                right: Box::new(children.remove(0)),
            },
            Expression::Arithmetic { op, .. } => Expression::Arithmetic {
                op: *op,
                left: Box::new(children.remove(0)),
                right: Box::new(children.remove(0)),
            },
            Expression::And(..) => {
                let left = children.remove(0);
                Expression::And(Box::new(left), Box::new(children.remove(0)))
            }
            Expression::Or(..) => {
                let left = children.remove(0);
                Expression::Or(Box::new(left), Box::new(children.remove(0)))
            }
            Expression::Tuple(_) => Expression::Tuple(children),
            Expression::Scalar { func, .. } => Expression::Scalar {
                func: *func,
                args: children,
            },
            Expression::UnresolvedFunction {
                name, aggregate, ..
            } => Expression::UnresolvedFunction {
                name: name.clone(),
                aggregate: *aggregate,
                args: children,
            },
        })
    }

    /// Apply `f` to every expression in the tree, children first, and
    /// return the rebuilt tree. The final call is on the root.
    pub fn transform_up<F>(&self, f: &F) -> Result<Expression>
    where
        F: Fn(Expression) -> Result<Expression>,
    {
        let children = self
            .children()
            .iter()
            .map(|c| c.transform_up(f))
            .collect::<Result<Vec<_>>>()?;
        f(self.with_children(children)?)
    }

    /// Whether this expression or any descendant is an aggregation.
    pub fn contains_aggregate(&self) -> bool {
        matches!(self, Expression::Aggregate { .. })
            || self.children().iter().any(|c| c.contains_aggregate())
    }

    /// Whether this expression or any descendant is an unresolved
    /// placeholder, yielding its name and qualifier.
    pub fn first_unresolved(&self) -> Option<(String, Option<String>)> {
        match self {
            Expression::UnresolvedColumn { name, table } => {
                Some((name.clone(), table.clone()))
            }
            Expression::UnresolvedFunction { name, .. } => Some((name.clone(), None)),
            Expression::UnresolvedField { name, .. } => Some((name.clone(), None)),
            Expression::Star { table } => Some(("*".to_string(), table.clone())),
            Expression::Aggregate {
                func: AggregateFunc::Count,
                arg,
            } if matches!(**arg, Expression::Star { .. }) => None,
            other => other
                .children()
                .iter()
                .find_map(|c| c.first_unresolved()),
        }
    }
}

fn promote(left: DataType, right: DataType) -> DataType {
    if left == DataType::Decimal || right == DataType::Decimal {
        DataType::Decimal
    } else if left.is_decimal() || right.is_decimal() {
        DataType::F64
    } else {
        DataType::I64
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(value, _) => write!(f, "{value}"),
            Expression::GetField { name, table, .. } => {
                if table.is_empty() {
                    write!(f, "{name}")
                } else {
                    write!(f, "{table}.{name}")
                }
            }
            Expression::Alias(child, name) => write!(f, "{child} as {name}"),
            Expression::Star { table: Some(t) } => write!(f, "{t}.*"),
            Expression::Star { table: None } => write!(f, "*"),
            Expression::UnresolvedColumn { name, table } => match table {
                Some(t) => write!(f, "{t}.{name}"),
                None => write!(f, "{name}"),
            },
            Expression::UnresolvedFunction { name, args, .. } => {
                write!(f, "{name}(")?;
                fmt_list(f, args)?;
                write!(f, ")")
            }
            Expression::UnresolvedField { base, name } => write!(f, "{base}.{name}"),
            Expression::Compare { op, left, right } => {
                write!(f, "{left} {} {right}", op.symbol())
            }
            Expression::Arithmetic { op, left, right } => {
                write!(f, "{left} {} {right}", op.symbol())
            }
            Expression::And(left, right) => write!(f, "{left} AND {right}"),
            Expression::Or(left, right) => write!(f, "{left} OR {right}"),
            Expression::Not(child) => write!(f, "NOT {child}"),
            Expression::Tuple(exprs) => {
                write!(f, "(")?;
                fmt_list(f, exprs)?;
                write!(f, ")")
            }
            Expression::Scalar { func, args } => {
                write!(f, "{}(", func.name())?;
                fmt_list(f, args)?;
                write!(f, ")")
            }
            Expression::Aggregate { func, arg } => write!(f, "{}({arg})", func.name()),
            Expression::Subquery(_) => write!(f, "subquery"),
        }
    }
}

fn fmt_list(f: &mut fmt::Formatter<'_>, exprs: &[Expression]) -> fmt::Result {
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{e}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(index: usize, name: &str) -> Expression {
        Expression::GetField {
            index,
            data_type: DataType::Text,
            name: name.to_string(),
            table: "t".to_string(),
            nullable: true,
        }
    }

    #[test]
    fn test_transform_up_identity() {
        let expr = Expression::Compare {
            op: CompareOp::Equals,
            left: Box::new(field(0, "a")),
            right: Box::new(Expression::Literal(
                Value::Str("x".into()),
                DataType::Text,
            )),
        };

        let transformed = expr.transform_up(&Ok).unwrap();
        assert_eq!(transformed, expr);
    }

    #[test]
    fn test_transform_up_bottom_up_order() {
        let expr = Expression::Not(Box::new(field(0, "a")));

        // Replace fields with literals; the Not node must be rebuilt
        // around the transformed child.
        let transformed = expr
            .transform_up(&|e| match e {
                Expression::GetField { .. } => {
                    Ok(Expression::Literal(Value::Bool(true), DataType::Bool))
                }
                other => Ok(other),
            })
            .unwrap();

        assert_eq!(
            transformed,
            Expression::Not(Box::new(Expression::Literal(
                Value::Bool(true),
                DataType::Bool
            )))
        );
    }

    #[test]
    fn test_tuple_arity_one_is_transparent() {
        let inner = field(2, "col");
        let tuple = Expression::Tuple(vec![inner.clone()]);

        assert_eq!(tuple.data_type(), inner.data_type());
        assert_eq!(tuple.nullable(), inner.nullable());
        assert_eq!(tuple.name(), inner.name());
        assert_eq!(tuple.table(), inner.table());
    }

    #[test]
    fn test_tuple_wider_arity() {
        let tuple = Expression::Tuple(vec![
            Expression::Literal(Value::I64(1), DataType::I64),
            Expression::Literal(Value::F64(3.14), DataType::F64),
            Expression::Literal(Value::Str("foo".into()), DataType::Text),
        ]);

        assert!(tuple.resolved());
        assert!(!tuple.nullable());
        assert_eq!(tuple.data_type(), DataType::Tuple);
    }

    #[test]
    fn test_unresolved_not_resolved() {
        assert!(!Expression::column("a").resolved());
        let tuple = Expression::Tuple(vec![
            Expression::column("bar"),
            Expression::Literal(Value::Str("bar".into()), DataType::Text),
        ]);
        assert!(!tuple.resolved());
    }

    #[test]
    #[should_panic(expected = "placeholder")]
    fn test_unresolved_data_type_panics() {
        Expression::column("a").data_type();
    }

    #[test]
    #[should_panic(expected = "placeholder")]
    fn test_unresolved_nullable_panics() {
        Expression::column("a").nullable();
    }

    #[test]
    fn test_count_star_resolved() {
        let count = Expression::Aggregate {
            func: AggregateFunc::Count,
            arg: Box::new(Expression::Star { table: None }),
        };
        assert!(count.resolved());
        assert_eq!(count.data_type(), DataType::I64);
        assert!(!count.nullable());
    }

    #[test]
    fn test_with_children_arity_check() {
        let expr = Expression::Not(Box::new(field(0, "a")));
        let err = expr.with_children(vec![]).unwrap_err();
        assert!(matches!(err, Error::InvalidChildrenNumber { got: 0, want: 1, .. }));
    }

    #[test]
    fn test_display() {
        let expr = Expression::Compare {
            op: CompareOp::GreaterThanOrEquals,
            left: Box::new(field(0, "a")),
            right: Box::new(Expression::Literal(Value::I64(3), DataType::I64)),
        };
        assert_eq!(expr.to_string(), "t.a >= 3");

        let agg = Expression::Aggregate {
            func: AggregateFunc::Count,
            arg: Box::new(Expression::Star { table: None }),
        };
        assert_eq!(agg.to_string(), "count(*)");
    }

    #[test]
    fn test_first_unresolved() {
        let expr = Expression::And(
            Box::new(Expression::Literal(Value::Bool(true), DataType::Bool)),
            Box::new(Expression::qualified_column("t", "missing")),
        );
        assert_eq!(
            expr.first_unresolved(),
            Some(("missing".to_string(), Some("t".to_string())))
        );

        let resolved = field(0, "a");
        assert_eq!(resolved.first_unresolved(), None);
    }
}
