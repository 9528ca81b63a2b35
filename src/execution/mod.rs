//! Pull-based row iterators
//!
//! Every plan node executes as a row iterator: `next` yields rows until
//! EOF (`Ok(None)`), `close` releases the iterator and its children and
//! is idempotent. After EOF or an error the iterator stays terminal.

mod distinct;
mod filter;
mod group_by;
mod join;
mod limit;
mod project;
mod sort;

pub use distinct::{DistinctIter, UnionIter};
pub use filter::FilterIter;
pub use group_by::GroupByIter;
pub use join::JoinIter;
pub use limit::{LimitIter, OffsetIter};
pub use project::{ParallelProjectIter, ProjectIter};
pub use sort::SortIter;

use crate::error::{Error, Result};
use crate::types::Row;

/// A pull-based, single-consumer stream of rows.
pub trait RowIter: Send {
    /// Produce the next row, or `Ok(None)` at end of input. Not safe to
    /// call concurrently on the same iterator.
    fn next(&mut self) -> Result<Option<Row>>;

    /// Release the iterator and all descendants. Idempotent.
    fn close(&mut self) -> Result<()>;
}

impl std::fmt::Debug for dyn RowIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn RowIter")
    }
}

/// An iterator over a fixed set of rows.
pub struct RowsIter {
    rows: std::vec::IntoIter<Row>,
}

impl RowsIter {
    pub fn new(rows: Vec<Row>) -> Self {
        RowsIter {
            rows: rows.into_iter(),
        }
    }

    /// An iterator producing no rows.
    pub fn empty() -> Self {
        RowsIter::new(Vec::new())
    }
}

impl RowIter for RowsIter {
    fn next(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.next())
    }

    fn close(&mut self) -> Result<()> {
        self.rows = Vec::new().into_iter();
        Ok(())
    }
}

/// Wraps a node's iterator in its tracing span. The span is entered on
/// every `next` and finished exactly once on the first `close`; the
/// terminal state (EOF or error) is sticky.
pub struct SpanIter {
    span: tracing::Span,
    child: Box<dyn RowIter>,
    eof: bool,
    failed: Option<Error>,
    closed: bool,
}

impl SpanIter {
    pub fn new(span: tracing::Span, child: Box<dyn RowIter>) -> Self {
        SpanIter {
            span,
            child,
            eof: false,
            failed: None,
            closed: false,
        }
    }
}

impl RowIter for SpanIter {
    fn next(&mut self) -> Result<Option<Row>> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        if self.eof {
            return Ok(None);
        }

        let _enter = self.span.enter();
        match self.child.next() {
            Ok(Some(row)) => Ok(Some(row)),
            Ok(None) => {
                self.eof = true;
                Ok(None)
            }
            Err(err) => {
                self.failed = Some(err.clone());
                Err(err)
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.span = tracing::Span::none();
        self.child.close()
    }
}

/// Drain an iterator into a vector, closing it afterwards.
pub fn collect_rows(iter: &mut dyn RowIter) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    loop {
        match iter.next() {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => break,
            Err(err) => {
                let _ = iter.close();
                return Err(err);
            }
        }
    }
    iter.close()?;
    Ok(rows)
}
