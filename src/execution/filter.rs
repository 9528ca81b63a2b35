//! Filter iterator

use super::RowIter;
use crate::error::Result;
use crate::expression::Expression;
use crate::types::{Context, Row, Value};

/// Emits only the rows whose predicate evaluates to boolean true. Null
/// and non-boolean predicate results drop the row.
pub struct FilterIter {
    predicate: Expression,
    ctx: Context,
    child: Box<dyn RowIter>,
}

impl FilterIter {
    pub fn new(predicate: Expression, ctx: Context, child: Box<dyn RowIter>) -> Self {
        FilterIter {
            predicate,
            ctx,
            child,
        }
    }
}

impl RowIter for FilterIter {
    fn next(&mut self) -> Result<Option<Row>> {
        while let Some(row) = self.child.next()? {
            if self.predicate.eval(&self.ctx, &row)? == Value::Bool(true) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        self.child.close()
    }
}
