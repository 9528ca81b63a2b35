//! Grouped aggregation iterator

use super::RowIter;
use crate::error::Result;
use crate::expression::{AggBuffer, AggregateFunc, Expression};
use crate::types::{Context, Row, Value};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// One output expression's accumulation state. Non-aggregate output
/// expressions take the value of the group's first row.
struct Accumulator {
    func: AggregateFunc,
    arg: Expression,
    buf: AggBuffer,
}

impl Accumulator {
    fn for_expression(expr: &Expression) -> Accumulator {
        let (func, arg) = match unwrap_alias(expr) {
            Expression::Aggregate { func, arg } => (*func, (**arg).clone()),
            other => (AggregateFunc::First, other.clone()),
        };
        Accumulator {
            func,
            arg,
            buf: func.new_buffer(),
        }
    }

    fn update(&mut self, ctx: &Context, row: &Row) -> Result<()> {
        self.func.update(ctx, &mut self.buf, &self.arg, row)
    }

    fn eval(&self) -> Result<Value> {
        self.func.eval_buffer(&self.buf)
    }
}

fn unwrap_alias(expr: &Expression) -> &Expression {
    match expr {
        Expression::Alias(child, _) => unwrap_alias(child),
        other => other,
    }
}

/// Partitions child rows by the grouping expressions and emits one row
/// per group with the aggregate results in declaration order. An empty
/// grouping list produces exactly one output row.
pub struct GroupByIter {
    aggregates: Vec<Expression>,
    grouping: Vec<Expression>,
    ctx: Context,
    child: Option<Box<dyn RowIter>>,
    output: Option<std::vec::IntoIter<Row>>,
}

impl GroupByIter {
    pub fn new(
        aggregates: Vec<Expression>,
        grouping: Vec<Expression>,
        ctx: Context,
        child: Box<dyn RowIter>,
    ) -> Self {
        GroupByIter {
            aggregates,
            grouping,
            ctx,
            child: Some(child),
            output: None,
        }
    }

    fn aggregate_all(&mut self, mut child: Box<dyn RowIter>) -> Result<Vec<Row>> {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Accumulator>> = HashMap::new();

        loop {
            let row = match child.next() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(err) => {
                    let _ = child.close();
                    return Err(err);
                }
            };

            let key = self.group_key(&row)?;
            let accumulators = match groups.entry(key) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    order.push(entry.key().clone());
                    entry.insert(
                        self.aggregates
                            .iter()
                            .map(Accumulator::for_expression)
                            .collect(),
                    )
                }
            };

            for acc in accumulators.iter_mut() {
                acc.update(&self.ctx, &row)?;
            }
        }
        child.close()?;

        if self.grouping.is_empty() && order.is_empty() {
            // No input rows: a global aggregation still emits one row
            // of empty-buffer results.
            let accumulators: Vec<Accumulator> = self
                .aggregates
                .iter()
                .map(Accumulator::for_expression)
                .collect();
            let row = accumulators
                .iter()
                .map(|acc| acc.eval())
                .collect::<Result<Row>>()?;
            return Ok(vec![row]);
        }

        order
            .into_iter()
            .filter_map(|key| groups.remove(&key))
            .map(|accumulators| {
                accumulators
                    .iter()
                    .map(|acc| acc.eval())
                    .collect::<Result<Row>>()
            })
            .collect()
    }

    fn group_key(&self, row: &Row) -> Result<String> {
        if self.grouping.is_empty() {
            return Ok(String::new());
        }
        let values = self
            .grouping
            .iter()
            .map(|e| e.eval(&self.ctx, row))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("{values:?}"))
    }
}

impl RowIter for GroupByIter {
    fn next(&mut self) -> Result<Option<Row>> {
        if self.output.is_none() {
            let child = match self.child.take() {
                Some(child) => child,
                None => return Ok(None),
            };
            let rows = self.aggregate_all(child)?;
            self.output = Some(rows.into_iter());
        }
        Ok(self.output.as_mut().and_then(|o| o.next()))
    }

    fn close(&mut self) -> Result<()> {
        self.output = None;
        match self.child.take() {
            Some(mut child) => child.close(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{collect_rows, RowsIter};
    use crate::types::DataType;

    fn field(index: usize, data_type: DataType) -> Expression {
        Expression::GetField {
            index,
            data_type,
            name: format!("f{index}"),
            table: String::new(),
            nullable: true,
        }
    }

    fn aggregate(func: AggregateFunc, arg: Expression) -> Expression {
        Expression::Aggregate {
            func,
            arg: Box::new(arg),
        }
    }

    fn input() -> Vec<Row> {
        // (category, amount)
        vec![
            vec![Value::Str("a".into()), Value::I64(10)],
            vec![Value::Str("b".into()), Value::I64(20)],
            vec![Value::Str("a".into()), Value::I64(30)],
            vec![Value::Str("b".into()), Value::I64(40)],
            vec![Value::Str("a".into()), Value::I64(50)],
        ]
    }

    #[test]
    fn test_group_by_counts() {
        let mut iter = GroupByIter::new(
            vec![
                field(0, DataType::Text),
                aggregate(AggregateFunc::Count, Expression::Star { table: None }),
            ],
            vec![field(0, DataType::Text)],
            Context::empty(),
            Box::new(RowsIter::new(input())),
        );

        let mut rows = collect_rows(&mut iter).unwrap();
        rows.sort_by(|a, b| a[0].natural_cmp(&b[0]));
        assert_eq!(
            rows,
            vec![
                vec![Value::Str("a".into()), Value::I64(3)],
                vec![Value::Str("b".into()), Value::I64(2)],
            ]
        );
    }

    #[test]
    fn test_group_by_emits_groups_in_first_seen_order() {
        let mut iter = GroupByIter::new(
            vec![field(0, DataType::Text)],
            vec![field(0, DataType::Text)],
            Context::empty(),
            Box::new(RowsIter::new(input())),
        );

        let rows = collect_rows(&mut iter).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Str("a".into())],
                vec![Value::Str("b".into())],
            ]
        );
    }

    #[test]
    fn test_empty_grouping_emits_one_row() {
        let mut iter = GroupByIter::new(
            vec![
                aggregate(AggregateFunc::Count, Expression::Star { table: None }),
                aggregate(AggregateFunc::Sum, field(1, DataType::I64)),
            ],
            vec![],
            Context::empty(),
            Box::new(RowsIter::new(input())),
        );

        let rows = collect_rows(&mut iter).unwrap();
        assert_eq!(rows, vec![vec![Value::I64(5), Value::I64(150)]]);
    }

    #[test]
    fn test_empty_grouping_over_empty_input() {
        let mut iter = GroupByIter::new(
            vec![
                aggregate(AggregateFunc::Count, Expression::Star { table: None }),
                aggregate(AggregateFunc::Avg, field(1, DataType::I64)),
            ],
            vec![],
            Context::empty(),
            Box::new(RowsIter::empty()),
        );

        let rows = collect_rows(&mut iter).unwrap();
        assert_eq!(rows, vec![vec![Value::I64(0), Value::Null]]);
    }

    #[test]
    fn test_avg_per_group() {
        let mut iter = GroupByIter::new(
            vec![
                field(0, DataType::Text),
                aggregate(AggregateFunc::Avg, field(1, DataType::I64)),
            ],
            vec![field(0, DataType::Text)],
            Context::empty(),
            Box::new(RowsIter::new(input())),
        );

        let mut rows = collect_rows(&mut iter).unwrap();
        rows.sort_by(|a, b| a[0].natural_cmp(&b[0]));
        assert_eq!(
            rows,
            vec![
                vec![Value::Str("a".into()), Value::F64(30.0)],
                vec![Value::Str("b".into()), Value::F64(30.0)],
            ]
        );
    }
}
