//! Limit and offset iterators

use super::RowIter;
use crate::error::Result;
use crate::types::Row;

/// Passes through at most `limit` rows.
pub struct LimitIter {
    remaining: u64,
    child: Box<dyn RowIter>,
}

impl LimitIter {
    pub fn new(limit: u64, child: Box<dyn RowIter>) -> Self {
        LimitIter {
            remaining: limit,
            child,
        }
    }
}

impl RowIter for LimitIter {
    fn next(&mut self) -> Result<Option<Row>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        match self.child.next()? {
            Some(row) => {
                self.remaining -= 1;
                Ok(Some(row))
            }
            None => {
                self.remaining = 0;
                Ok(None)
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.child.close()
    }
}

/// Skips the first `offset` rows, then passes through.
pub struct OffsetIter {
    to_skip: u64,
    child: Box<dyn RowIter>,
}

impl OffsetIter {
    pub fn new(offset: u64, child: Box<dyn RowIter>) -> Self {
        OffsetIter {
            to_skip: offset,
            child,
        }
    }
}

impl RowIter for OffsetIter {
    fn next(&mut self) -> Result<Option<Row>> {
        while self.to_skip > 0 {
            if self.child.next()?.is_none() {
                self.to_skip = 0;
                return Ok(None);
            }
            self.to_skip -= 1;
        }
        self.child.next()
    }

    fn close(&mut self) -> Result<()> {
        self.child.close()
    }
}
