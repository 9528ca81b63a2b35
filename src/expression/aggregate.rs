//! Aggregate functions and their mergeable buffers
//!
//! Every aggregate exposes an explicit buffer so grouped execution can
//! be partitioned: `merge` is associative and commutative, which lets a
//! caller combine buffers built over disjoint row sets.

use super::Expression;
use crate::error::{Error, Result};
use crate::types::{Context, DataType, Row, Value};
use std::cmp::Ordering;

/// The builtin aggregation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    First,
}

/// Accumulation state for one aggregate over one group.
#[derive(Debug, Clone, PartialEq)]
pub enum AggBuffer {
    Count(i64),
    Sum(Value),
    Avg { sum: f64, count: i64 },
    Min(Value),
    Max(Value),
    First(Option<Value>),
}

impl AggregateFunc {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "count",
            AggregateFunc::Sum => "sum",
            AggregateFunc::Avg => "avg",
            AggregateFunc::Min => "min",
            AggregateFunc::Max => "max",
            AggregateFunc::First => "first",
        }
    }

    /// The declared type of the aggregate result.
    pub fn data_type(&self, arg: &Expression) -> DataType {
        match self {
            AggregateFunc::Count => DataType::I64,
            AggregateFunc::Avg => DataType::F64,
            _ => arg.data_type(),
        }
    }

    pub fn nullable(&self) -> bool {
        !matches!(self, AggregateFunc::Count)
    }

    /// A fresh, empty accumulation buffer.
    pub fn new_buffer(&self) -> AggBuffer {
        match self {
            AggregateFunc::Count => AggBuffer::Count(0),
            AggregateFunc::Sum => AggBuffer::Sum(Value::Null),
            AggregateFunc::Avg => AggBuffer::Avg { sum: 0.0, count: 0 },
            AggregateFunc::Min => AggBuffer::Min(Value::Null),
            AggregateFunc::Max => AggBuffer::Max(Value::Null),
            AggregateFunc::First => AggBuffer::First(None),
        }
    }

    /// Fold one row into the buffer. COUNT over a star argument counts
    /// every row; over an expression it counts non-null evaluations.
    pub fn update(
        &self,
        ctx: &Context,
        buf: &mut AggBuffer,
        arg: &Expression,
        row: &Row,
    ) -> Result<()> {
        match (self, buf) {
            (AggregateFunc::Count, AggBuffer::Count(n)) => {
                if matches!(arg, Expression::Star { .. }) {
                    *n += 1;
                } else if !arg.eval(ctx, row)?.is_null() {
                    *n += 1;
                }
            }
            (AggregateFunc::Sum, AggBuffer::Sum(sum)) => {
                let v = arg.eval(ctx, row)?;
                if !v.is_null() {
                    *sum = if sum.is_null() { v } else { sum.add(&v)? };
                }
            }
            (AggregateFunc::Avg, AggBuffer::Avg { sum, count }) => {
                let v = arg.eval(ctx, row)?;
                if !v.is_null() {
                    *sum += v.to_f64()?;
                    *count += 1;
                }
            }
            (AggregateFunc::Min, AggBuffer::Min(min)) => {
                let v = arg.eval(ctx, row)?;
                if !v.is_null()
                    && (min.is_null() || arg.data_type().compare(&v, min)? == Ordering::Less)
                {
                    *min = v;
                }
            }
            (AggregateFunc::Max, AggBuffer::Max(max)) => {
                let v = arg.eval(ctx, row)?;
                if !v.is_null()
                    && (max.is_null() || arg.data_type().compare(&v, max)? == Ordering::Greater)
                {
                    *max = v;
                }
            }
            (AggregateFunc::First, AggBuffer::First(first)) => {
                if first.is_none() {
                    *first = Some(arg.eval(ctx, row)?);
                }
            }
            (func, buf) => {
                return Err(Error::InvalidValue(format!(
                    "buffer {buf:?} does not belong to aggregate {}",
                    func.name()
                )))
            }
        }
        Ok(())
    }

    /// Combine two buffers built over disjoint partitions of the input.
    pub fn merge(&self, dst: &mut AggBuffer, src: AggBuffer) -> Result<()> {
        match (dst, src) {
            (AggBuffer::Count(a), AggBuffer::Count(b)) => *a += b,
            (AggBuffer::Sum(a), AggBuffer::Sum(b)) => {
                if !b.is_null() {
                    *a = if a.is_null() { b } else { a.add(&b)? };
                }
            }
            (
                AggBuffer::Avg { sum, count },
                AggBuffer::Avg {
                    sum: other_sum,
                    count: other_count,
                },
            ) => {
                *sum += other_sum;
                *count += other_count;
            }
            (AggBuffer::Min(a), AggBuffer::Min(b)) => {
                if !b.is_null() && (a.is_null() || b.natural_cmp(a) == Ordering::Less) {
                    *a = b;
                }
            }
            (AggBuffer::Max(a), AggBuffer::Max(b)) => {
                if !b.is_null() && (a.is_null() || b.natural_cmp(a) == Ordering::Greater) {
                    *a = b;
                }
            }
            (AggBuffer::First(a), AggBuffer::First(b)) => {
                if a.is_none() {
                    *a = b;
                }
            }
            (dst, src) => {
                return Err(Error::InvalidValue(format!(
                    "cannot merge aggregate buffers {dst:?} and {src:?}"
                )))
            }
        }
        Ok(())
    }

    /// Produce the aggregate result. An empty buffer yields 0 for COUNT
    /// and null for every other aggregate.
    pub fn eval_buffer(&self, buf: &AggBuffer) -> Result<Value> {
        match buf {
            AggBuffer::Count(n) => Ok(Value::I64(*n)),
            AggBuffer::Sum(v) => Ok(v.clone()),
            AggBuffer::Avg { count: 0, .. } => Ok(Value::Null),
            AggBuffer::Avg { sum, count } => Ok(Value::F64(sum / *count as f64)),
            AggBuffer::Min(v) | AggBuffer::Max(v) => Ok(v.clone()),
            AggBuffer::First(v) => Ok(v.clone().unwrap_or(Value::Null)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(index: usize) -> Expression {
        Expression::GetField {
            index,
            data_type: DataType::I64,
            name: "n".into(),
            table: String::new(),
            nullable: true,
        }
    }

    fn feed(func: AggregateFunc, arg: &Expression, rows: &[Row]) -> AggBuffer {
        let ctx = Context::empty();
        let mut buf = func.new_buffer();
        for row in rows {
            func.update(&ctx, &mut buf, arg, row).unwrap();
        }
        buf
    }

    #[test]
    fn test_count_star_counts_all_rows() {
        let star = Expression::Star { table: None };
        let rows = vec![vec![Value::Null], vec![Value::I64(1)], vec![Value::I64(2)]];
        let buf = feed(AggregateFunc::Count, &star, &rows);
        assert_eq!(
            AggregateFunc::Count.eval_buffer(&buf).unwrap(),
            Value::I64(3)
        );
    }

    #[test]
    fn test_count_expression_skips_nulls() {
        let rows = vec![vec![Value::Null], vec![Value::I64(1)], vec![Value::Null]];
        let buf = feed(AggregateFunc::Count, &field(0), &rows);
        assert_eq!(
            AggregateFunc::Count.eval_buffer(&buf).unwrap(),
            Value::I64(1)
        );
    }

    #[test]
    fn test_empty_buffers() {
        assert_eq!(
            AggregateFunc::Count
                .eval_buffer(&AggregateFunc::Count.new_buffer())
                .unwrap(),
            Value::I64(0)
        );
        assert_eq!(
            AggregateFunc::Avg
                .eval_buffer(&AggregateFunc::Avg.new_buffer())
                .unwrap(),
            Value::Null
        );
        assert_eq!(
            AggregateFunc::First
                .eval_buffer(&AggregateFunc::First.new_buffer())
                .unwrap(),
            Value::Null
        );
        assert_eq!(
            AggregateFunc::Sum
                .eval_buffer(&AggregateFunc::Sum.new_buffer())
                .unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_sum_and_minmax() {
        let rows: Vec<Row> = [5, 2, 8, 1]
            .iter()
            .map(|i| vec![Value::I64(*i)])
            .collect();

        let buf = feed(AggregateFunc::Sum, &field(0), &rows);
        assert_eq!(
            AggregateFunc::Sum.eval_buffer(&buf).unwrap(),
            Value::I64(16)
        );

        let buf = feed(AggregateFunc::Min, &field(0), &rows);
        assert_eq!(AggregateFunc::Min.eval_buffer(&buf).unwrap(), Value::I64(1));

        let buf = feed(AggregateFunc::Max, &field(0), &rows);
        assert_eq!(AggregateFunc::Max.eval_buffer(&buf).unwrap(), Value::I64(8));
    }

    #[test]
    fn test_first() {
        let rows = vec![vec![Value::I64(7)], vec![Value::I64(9)]];
        let buf = feed(AggregateFunc::First, &field(0), &rows);
        assert_eq!(
            AggregateFunc::First.eval_buffer(&buf).unwrap(),
            Value::I64(7)
        );
    }

    #[test]
    fn test_avg_merge_matches_partitioned_sums() {
        let left: Vec<Row> = [1, 2, 3].iter().map(|i| vec![Value::I64(*i)]).collect();
        let right: Vec<Row> = [4, 5].iter().map(|i| vec![Value::I64(*i)]).collect();

        let mut a = feed(AggregateFunc::Avg, &field(0), &left);
        let b = feed(AggregateFunc::Avg, &field(0), &right);
        AggregateFunc::Avg.merge(&mut a, b).unwrap();

        // (1+2+3+4+5) / 5
        assert_eq!(
            AggregateFunc::Avg.eval_buffer(&a).unwrap(),
            Value::F64(3.0)
        );
    }

    #[test]
    fn test_merge_is_commutative() {
        let left: Vec<Row> = [1, 2].iter().map(|i| vec![Value::I64(*i)]).collect();
        let right: Vec<Row> = [30].iter().map(|i| vec![Value::I64(*i)]).collect();

        for func in [
            AggregateFunc::Count,
            AggregateFunc::Sum,
            AggregateFunc::Avg,
            AggregateFunc::Min,
            AggregateFunc::Max,
        ] {
            let a = feed(func, &field(0), &left);
            let b = feed(func, &field(0), &right);

            let mut ab = a.clone();
            func.merge(&mut ab, b.clone()).unwrap();
            let mut ba = b;
            func.merge(&mut ba, a).unwrap();

            assert_eq!(
                func.eval_buffer(&ab).unwrap(),
                func.eval_buffer(&ba).unwrap(),
                "merge of {} is not commutative",
                func.name()
            );
        }
    }

    #[test]
    fn test_merge_empty_buffer_is_identity() {
        let rows: Vec<Row> = [4, 5].iter().map(|i| vec![Value::I64(*i)]).collect();
        let full = feed(AggregateFunc::Sum, &field(0), &rows);

        let mut merged = full.clone();
        AggregateFunc::Sum
            .merge(&mut merged, AggregateFunc::Sum.new_buffer())
            .unwrap();
        assert_eq!(merged, full);
    }

    #[test]
    fn test_mismatched_buffer_errors() {
        let ctx = Context::empty();
        let mut buf = AggregateFunc::Count.new_buffer();
        let err = AggregateFunc::Sum.update(&ctx, &mut buf, &field(0), &vec![Value::I64(1)]);
        assert!(err.is_err());
    }
}
