//! Sort iterator

use super::RowIter;
use crate::error::Result;
use crate::plan::{Direction, NullOrdering, SortField};
use crate::types::{Context, Row, Value};
use std::cmp::Ordering;

/// Buffers all child rows, sorts them stably by the sort fields, then
/// emits. Sort keys are converted to each field's declared type while
/// buffering so the comparator itself cannot fail.
pub struct SortIter {
    fields: Vec<SortField>,
    ctx: Context,
    child: Option<Box<dyn RowIter>>,
    output: Option<std::vec::IntoIter<Row>>,
}

impl SortIter {
    pub fn new(fields: Vec<SortField>, ctx: Context, child: Box<dyn RowIter>) -> Self {
        SortIter {
            fields,
            ctx,
            child: Some(child),
            output: None,
        }
    }

    fn sort_all(&mut self, mut child: Box<dyn RowIter>) -> Result<Vec<Row>> {
        let mut keyed: Vec<(Vec<Value>, Row)> = Vec::new();
        loop {
            let row = match child.next() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(err) => {
                    let _ = child.close();
                    return Err(err);
                }
            };

            let mut keys = Vec::with_capacity(self.fields.len());
            for field in &self.fields {
                let value = field.expr.eval(&self.ctx, &row)?;
                let key = if value.is_null() {
                    Value::Null
                } else {
                    field.expr.data_type().convert(&value)?
                };
                keys.push(key);
            }
            keyed.push((keys, row));
        }
        child.close()?;

        let fields = self.fields.clone();
        keyed.sort_by(|(a, _), (b, _)| compare_keys(&fields, a, b));

        Ok(keyed.into_iter().map(|(_, row)| row).collect())
    }
}

fn compare_keys(fields: &[SortField], a: &[Value], b: &[Value]) -> Ordering {
    for (i, field) in fields.iter().enumerate() {
        let ord = match (a[i].is_null(), b[i].is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => match field.null_ordering {
                NullOrdering::NullsFirst => Ordering::Less,
                NullOrdering::NullsLast => Ordering::Greater,
            },
            (false, true) => match field.null_ordering {
                NullOrdering::NullsFirst => Ordering::Greater,
                NullOrdering::NullsLast => Ordering::Less,
            },
            (false, false) => {
                let ord = a[i].natural_cmp(&b[i]);
                match field.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

impl RowIter for SortIter {
    fn next(&mut self) -> Result<Option<Row>> {
        if self.output.is_none() {
            let child = match self.child.take() {
                Some(child) => child,
                None => return Ok(None),
            };
            let rows = self.sort_all(child)?;
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
