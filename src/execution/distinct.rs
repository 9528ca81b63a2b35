//! Distinct and union iterators

use super::RowIter;
use crate::error::Result;
use crate::types::Row;
use std::collections::HashSet;

/// Drops rows whose canonical rendering has been seen before.
pub struct DistinctIter {
    seen: HashSet<String>,
    child: Box<dyn RowIter>,
}

impl DistinctIter {
    pub fn new(child: Box<dyn RowIter>) -> Self {
        DistinctIter {
            seen: HashSet::new(),
            child,
        }
    }
}

impl RowIter for DistinctIter {
    fn next(&mut self) -> Result<Option<Row>> {
        while let Some(row) = self.child.next()? {
            if self.seen.insert(format!("{row:?}")) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        self.seen = HashSet::new();
        self.child.close()
    }
}

/// Bag concatenation: the left side first, then the right.
pub struct UnionIter {
    left: Box<dyn RowIter>,
    right: Box<dyn RowIter>,
    on_right: bool,
}

impl UnionIter {
    pub fn new(left: Box<dyn RowIter>, right: Box<dyn RowIter>) -> Self {
        UnionIter {
            left,
            right,
            on_right: false,
        }
    }
}

impl RowIter for UnionIter {
    fn next(&mut self) -> Result<Option<Row>> {
        if !self.on_right {
            if let Some(row) = self.left.next()? {
                return Ok(Some(row));
            }
            self.on_right = true;
        }
        self.right.next()
    }

    fn close(&mut self) -> Result<()> {
        let left = self.left.close();
        let right = self.right.close();
        left.and(right)
    }
}
