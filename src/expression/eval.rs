//! Expression evaluation
//!
//! Evaluation is a pure function of the expression, the row and the
//! session configuration. Null operands propagate through comparisons
//! and arithmetic unless an operator is explicitly null-aware.

use super::{CompareOp, Expression, ScalarFunc};
use crate::error::{Error, Result};
use crate::types::{Context, DataType, Row, Value};
use std::cmp::Ordering;

impl Expression {
    /// Evaluate the expression against a row.
    pub fn eval(&self, ctx: &Context, row: &Row) -> Result<Value> {
        match self {
            Expression::Literal(value, _) => Ok(value.clone()),

            Expression::GetField { index, name, .. } => {
                row.get(*index).cloned().ok_or_else(|| {
                    Error::RowEvaluation(format!(
                        "field index {index} ({name}) out of range for row of {} values",
                        row.len()
                    ))
                })
            }

            Expression::Alias(child, _) => child.eval(ctx, row),

            Expression::Compare { op, left, right } => {
                let a = left.eval(ctx, row)?;
                let b = right.eval(ctx, row)?;
                if a.is_null() || b.is_null() {
                    return Ok(Value::Null);
                }
                eval_compare(*op, &left.data_type(), &a, &b)
            }

            Expression::Arithmetic { op, left, right } => {
                let a = left.eval(ctx, row)?;
                let b = right.eval(ctx, row)?;
                use super::ArithmeticOp::*;
                match op {
                    Add => a.add(&b),
                    Subtract => a.subtract(&b),
                    Multiply => a.multiply(&b),
                    Divide => a.divide(&b),
                    Remainder => a.remainder(&b),
                }
            }

            Expression::And(left, right) => {
                let a = left.eval(ctx, row)?;
                let b = right.eval(ctx, row)?;
                if a.is_null() || b.is_null() {
                    return Ok(Value::Null);
                }
                Ok(Value::Bool(a.to_bool()? && b.to_bool()?))
            }

            Expression::Or(left, right) => {
                let a = left.eval(ctx, row)?;
                let b = right.eval(ctx, row)?;
                if a.is_null() || b.is_null() {
                    return Ok(Value::Null);
                }
                Ok(Value::Bool(a.to_bool()? || b.to_bool()?))
            }

            Expression::Not(child) => {
                let v = child.eval(ctx, row)?;
                if v.is_null() {
                    return Ok(Value::Null);
                }
                Ok(Value::Bool(!v.to_bool()?))
            }

            Expression::Tuple(exprs) => {
                if exprs.len() == 1 {
                    return exprs[0].eval(ctx, row);
                }
                let values = exprs
                    .iter()
                    .map(|e| e.eval(ctx, row))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Tuple(values))
            }

            Expression::Scalar { func, args } => {
                let values = args
                    .iter()
                    .map(|e| e.eval(ctx, row))
                    .collect::<Result<Vec<_>>>()?;
                eval_scalar(*func, &values)
            }

            Expression::Aggregate { func, .. } => Err(Error::RowEvaluation(format!(
                "aggregate {} must be evaluated against a group buffer",
                func.name()
            ))),

            Expression::Subquery(_) => Ok(Value::Null),

            Expression::Star { .. } => {
                panic!("star is a placeholder expression, but eval was called")
            }
            Expression::UnresolvedColumn { .. } => {
                panic!("unresolved column is a placeholder expression, but eval was called")
            }
            Expression::UnresolvedFunction { .. } => {
                panic!("unresolved function is a placeholder expression, but eval was called")
            }
            Expression::UnresolvedField { .. } => {
                panic!("unresolved field is a placeholder expression, but eval was called")
            }
        }
    }
}

fn eval_compare(op: CompareOp, left_type: &DataType, a: &Value, b: &Value) -> Result<Value> {
    if op == CompareOp::Regexp {
        return eval_regexp(left_type, a, b);
    }

    let ord = left_type.compare(a, b)?;
    let result = match op {
        CompareOp::Equals => ord == Ordering::Equal,
        CompareOp::LessThan => ord == Ordering::Less,
        CompareOp::GreaterThan => ord == Ordering::Greater,
        CompareOp::LessThanOrEquals => ord != Ordering::Greater,
        CompareOp::GreaterThanOrEquals => ord != Ordering::Less,
        CompareOp::Regexp => unreachable!("handled above"),
    };
    Ok(Value::Bool(result))
}

// A pattern that fails to compile yields false rather than an error.
// Non-string operands degrade to an equality check.
fn eval_regexp(left_type: &DataType, a: &Value, b: &Value) -> Result<Value> {
    let (s, pattern) = match (a, b) {
        (Value::Str(s), Value::Str(p)) => (s, p),
        _ => {
            let ord = left_type.compare(a, b)?;
            return Ok(Value::Bool(ord == Ordering::Equal));
        }
    };

    match regex::Regex::new(pattern) {
        Ok(re) => Ok(Value::Bool(re.is_match(s))),
        Err(_) => Ok(Value::Bool(false)),
    }
}

fn eval_scalar(func: ScalarFunc, args: &[Value]) -> Result<Value> {
    let first = args.first().ok_or_else(|| {
        Error::RowEvaluation(format!("{} takes at least one argument", func.name()))
    })?;

    match func {
        ScalarFunc::Lower | ScalarFunc::Upper => {
            let arg = first;
            if arg.is_null() {
                return Ok(Value::Null);
            }
            let text = match DataType::Text.convert(arg)? {
                Value::Str(s) => s,
                _ => return Ok(Value::Null),
            };
            Ok(Value::Str(if func == ScalarFunc::Lower {
                text.to_lowercase()
            } else {
                text.to_uppercase()
            }))
        }
        ScalarFunc::Length => match first {
            Value::Null => Ok(Value::Null),
            Value::Str(s) => Ok(Value::I64(s.len() as i64)),
            Value::Bytea(b) => Ok(Value::I64(b.len() as i64)),
            other => Err(Error::RowEvaluation(format!(
                "length is not defined for {other}"
            ))),
        },
        ScalarFunc::Concat => {
            let mut out = String::new();
            for arg in args {
                if arg.is_null() {
                    return Ok(Value::Null);
                }
                match DataType::Text.convert(arg)? {
                    Value::Str(s) => out.push_str(&s),
                    _ => return Ok(Value::Null),
                }
            }
            Ok(Value::Str(out))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ArithmeticOp;

    fn lit(v: Value, dt: DataType) -> Expression {
        Expression::Literal(v, dt)
    }

    fn text(s: &str) -> Expression {
        lit(Value::Str(s.into()), DataType::Text)
    }

    fn int(i: i64) -> Expression {
        lit(Value::I64(i), DataType::I64)
    }

    fn compare(op: CompareOp, left: Expression, right: Expression) -> Expression {
        Expression::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[test]
    fn test_eval_comparison() {
        let ctx = Context::empty();
        let row = vec![];

        let expr = compare(CompareOp::Equals, int(3), int(3));
        assert_eq!(expr.eval(&ctx, &row).unwrap(), Value::Bool(true));

        let expr = compare(CompareOp::LessThan, int(3), int(2));
        assert_eq!(expr.eval(&ctx, &row).unwrap(), Value::Bool(false));

        let expr = compare(CompareOp::GreaterThanOrEquals, int(3), int(3));
        assert_eq!(expr.eval(&ctx, &row).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_eval_comparison_uses_left_type() {
        let ctx = Context::empty();
        // 2 < "10" numerically, but "2" > "10" lexicographically.
        let expr = compare(CompareOp::LessThan, int(2), text("10"));
        assert_eq!(expr.eval(&ctx, &vec![]).unwrap(), Value::Bool(true));

        let expr = compare(CompareOp::LessThan, text("2"), int(10));
        assert_eq!(expr.eval(&ctx, &vec![]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_eval_comparison_null_propagates() {
        let ctx = Context::empty();
        let expr = compare(
            CompareOp::Equals,
            int(1),
            lit(Value::Null, DataType::I64),
        );
        assert_eq!(expr.eval(&ctx, &vec![]).unwrap(), Value::Null);
    }

    #[test]
    fn test_eval_arithmetic() {
        let ctx = Context::empty();
        let expr = Expression::Arithmetic {
            op: ArithmeticOp::Add,
            left: Box::new(int(2)),
            right: Box::new(int(3)),
        };
        assert_eq!(expr.eval(&ctx, &vec![]).unwrap(), Value::I64(5));
    }

    #[test]
    fn test_eval_get_field() {
        let ctx = Context::empty();
        let row = vec![Value::Str("foo".into()), Value::I64(7)];
        let expr = Expression::GetField {
            index: 1,
            data_type: DataType::I64,
            name: "n".into(),
            table: String::new(),
            nullable: false,
        };
        assert_eq!(expr.eval(&ctx, &row).unwrap(), Value::I64(7));

        let oob = Expression::GetField {
            index: 9,
            data_type: DataType::I64,
            name: "n".into(),
            table: String::new(),
            nullable: false,
        };
        assert!(oob.eval(&ctx, &row).is_err());
    }

    #[test]
    fn test_eval_regexp() {
        let ctx = Context::empty();
        let expr = compare(CompareOp::Regexp, text("hello world"), text("^hel+o"));
        assert_eq!(expr.eval(&ctx, &vec![]).unwrap(), Value::Bool(true));

        let expr = compare(CompareOp::Regexp, text("abc"), text("^z"));
        assert_eq!(expr.eval(&ctx, &vec![]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_eval_regexp_bad_pattern_is_false() {
        let ctx = Context::empty();
        let expr = compare(CompareOp::Regexp, text("abc"), text("("));
        assert_eq!(expr.eval(&ctx, &vec![]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_eval_logic() {
        let ctx = Context::empty();
        let t = lit(Value::Bool(true), DataType::Bool);
        let f = lit(Value::Bool(false), DataType::Bool);

        let expr = Expression::And(Box::new(t.clone()), Box::new(f.clone()));
        assert_eq!(expr.eval(&ctx, &vec![]).unwrap(), Value::Bool(false));

        let expr = Expression::Or(Box::new(t.clone()), Box::new(f.clone()));
        assert_eq!(expr.eval(&ctx, &vec![]).unwrap(), Value::Bool(true));

        let expr = Expression::Not(Box::new(f));
        assert_eq!(expr.eval(&ctx, &vec![]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_eval_tuple() {
        let ctx = Context::empty();

        let single = Expression::Tuple(vec![text("foo")]);
        assert_eq!(
            single.eval(&ctx, &vec![]).unwrap(),
            Value::Str("foo".into())
        );

        let pair = Expression::Tuple(vec![int(1), text("bar")]);
        assert_eq!(
            pair.eval(&ctx, &vec![]).unwrap(),
            Value::Tuple(vec![Value::I64(1), Value::Str("bar".into())])
        );
    }

    #[test]
    fn test_eval_scalar_functions() {
        let ctx = Context::empty();

        let expr = Expression::Scalar {
            func: ScalarFunc::Upper,
            args: vec![text("foo")],
        };
        assert_eq!(expr.eval(&ctx, &vec![]).unwrap(), Value::Str("FOO".into()));

        let expr = Expression::Scalar {
            func: ScalarFunc::Length,
            args: vec![text("four")],
        };
        assert_eq!(expr.eval(&ctx, &vec![]).unwrap(), Value::I64(4));

        let expr = Expression::Scalar {
            func: ScalarFunc::Concat,
            args: vec![text("a"), int(1), text("b")],
        };
        assert_eq!(expr.eval(&ctx, &vec![]).unwrap(), Value::Str("a1b".into()));

        let expr = Expression::Scalar {
            func: ScalarFunc::Concat,
            args: vec![text("a"), lit(Value::Null, DataType::Text)],
        };
        assert_eq!(expr.eval(&ctx, &vec![]).unwrap(), Value::Null);
    }

    #[test]
    #[should_panic(expected = "placeholder")]
    fn test_eval_unresolved_panics() {
        let ctx = Context::empty();
        let _ = Expression::column("a").eval(&ctx, &vec![]);
    }
}
