//! Nested-loop join iterator
//!
//! The right side is materialized once on the first pull, so the right
//! child does not need to be re-iterable.

use super::{collect_rows, RowIter};
use crate::error::Result;
use crate::expression::Expression;
use crate::types::{Context, Row, Value};

/// Nested-loop join. With no condition this is a cross join; with a
/// condition, combined rows are kept only when it evaluates to true.
pub struct JoinIter {
    condition: Option<Expression>,
    ctx: Context,
    left: Box<dyn RowIter>,
    right: Option<Box<dyn RowIter>>,
    right_rows: Vec<Row>,
    current_left: Option<Row>,
    right_pos: usize,
}

impl JoinIter {
    pub fn new(
        condition: Option<Expression>,
        ctx: Context,
        left: Box<dyn RowIter>,
        right: Box<dyn RowIter>,
    ) -> Self {
        JoinIter {
            condition,
            ctx,
            left,
            right: Some(right),
            right_rows: Vec::new(),
            current_left: None,
            right_pos: 0,
        }
    }
}

impl RowIter for JoinIter {
    fn next(&mut self) -> Result<Option<Row>> {
        if let Some(mut right) = self.right.take() {
            self.right_rows = collect_rows(right.as_mut())?;
        }

        loop {
            if self.current_left.is_none() {
                self.current_left = self.left.next()?;
                self.right_pos = 0;
            }
            let left_row = match &self.current_left {
                Some(row) => row,
                None => return Ok(None),
            };

            while self.right_pos < self.right_rows.len() {
                let right_row = &self.right_rows[self.right_pos];
                self.right_pos += 1;

                let mut combined = left_row.clone();
                combined.extend(right_row.iter().cloned());

                match &self.condition {
                    None => return Ok(Some(combined)),
                    Some(cond) => {
                        if cond.eval(&self.ctx, &combined)? == Value::Bool(true) {
                            return Ok(Some(combined));
                        }
                    }
                }
            }

            self.current_left = None;
        }
    }

    fn close(&mut self) -> Result<()> {
        self.right_rows = Vec::new();
        if let Some(mut right) = self.right.take() {
            right.close()?;
        }
        self.left.close()
    }
}
