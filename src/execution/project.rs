//! Serial and parallel projection iterators
//!
//! The serial path evaluates projections row by row, preserving child
//! order. The parallel path spawns a fixed number of workers that pull
//! input rows under a shared mutex, evaluate projections outside the
//! lock, and publish results over a bounded channel; output order is
//! not deterministic.

use super::RowIter;
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::types::{Context, Row};
use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use tokio_util::sync::CancellationToken;

/// Evaluate every projection against the row.
fn project_row(ctx: &Context, projections: &[Expression], row: &Row) -> Result<Row> {
    projections.iter().map(|e| e.eval(ctx, row)).collect()
}

/// Projects rows one at a time, in child order.
pub struct ProjectIter {
    projections: Vec<Expression>,
    ctx: Context,
    child: Box<dyn RowIter>,
}

impl ProjectIter {
    pub fn new(projections: Vec<Expression>, ctx: Context, child: Box<dyn RowIter>) -> Self {
        ProjectIter {
            projections,
            ctx,
            child,
        }
    }
}

impl RowIter for ProjectIter {
    fn next(&mut self) -> Result<Option<Row>> {
        match self.child.next()? {
            Some(row) => Ok(Some(project_row(&self.ctx, &self.projections, &row)?)),
            None => Ok(None),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.child.close()
    }
}

/// The shared input side of the parallel iterator. The mutex serializes
/// child pulls and the end-of-input flag; nothing else is shared
/// mutably between workers.
struct Input {
    child: Box<dyn RowIter>,
    finished: bool,
}

/// Projects rows with a pool of worker threads.
///
/// Workers are spawned lazily on the first `next` call. Each worker
/// loops: observe cancellation, pull one input row under the mutex,
/// evaluate projections without the lock, publish the result. The rows
/// channel closes once every worker's sender is dropped, which `next`
/// observes as EOF. The first published error cancels the derived
/// context and surfaces to the caller; later errors stay buffered and
/// are discarded.
pub struct ParallelProjectIter {
    projections: Arc<Vec<Expression>>,
    ctx: Context,
    cancel: CancellationToken,
    parallelism: usize,
    input: Arc<Mutex<Input>>,
    rows: Option<Receiver<Row>>,
    errors: Option<Receiver<Error>>,
    errors_hold: Option<Sender<Error>>,
    done: bool,
    closed: bool,
}

impl ParallelProjectIter {
    pub fn new(
        projections: Vec<Expression>,
        ctx: &Context,
        child: Box<dyn RowIter>,
        parallelism: usize,
    ) -> Self {
        let (child_ctx, cancel) = ctx.child_cancellable();
        ParallelProjectIter {
            projections: Arc::new(projections),
            ctx: child_ctx,
            cancel,
            parallelism: parallelism.max(1),
            input: Arc::new(Mutex::new(Input {
                child,
                finished: false,
            })),
            rows: None,
            errors: None,
            errors_hold: None,
            done: false,
            closed: false,
        }
    }

    fn start(&mut self) {
        let (row_tx, row_rx) = bounded::<Row>(self.parallelism);
        let (err_tx, err_rx) = bounded::<Error>(self.parallelism);

        for _ in 0..self.parallelism {
            let input = Arc::clone(&self.input);
            let projections = Arc::clone(&self.projections);
            let ctx = self.ctx.clone();
            let rows = row_tx.clone();
            let errors = err_tx.clone();
            thread::spawn(move || worker(input, projections, ctx, rows, errors));
        }

        self.rows = Some(row_rx);
        self.errors = Some(err_rx);
        // Keeping one error sender alive means a closed errors channel is
        // never selected while buffered rows remain.
        self.errors_hold = Some(err_tx);
    }

    fn shutdown(&mut self) {
        self.done = true;
        self.cancel.cancel();
        self.rows = None;
        self.errors = None;
        self.errors_hold = None;
    }
}

fn worker(
    input: Arc<Mutex<Input>>,
    projections: Arc<Vec<Expression>>,
    ctx: Context,
    rows: Sender<Row>,
    errors: Sender<Error>,
) {
    loop {
        if ctx.is_cancelled() {
            let _ = errors.send(Error::Cancelled);
            return;
        }

        let row = {
            let mut input = input.lock();
            if input.finished {
                return;
            }
            match input.child.next() {
                Ok(Some(row)) => row,
                Ok(None) => {
                    input.finished = true;
                    return;
                }
                Err(err) => {
                    drop(input);
                    let _ = errors.send(err);
                    return;
                }
            }
        };

        match project_row(&ctx, &projections, &row) {
            Ok(out) => {
                if rows.send(out).is_err() {
                    return;
                }
            }
            Err(err) => {
                let _ = errors.send(err);
                return;
            }
        }
    }
}

impl RowIter for ParallelProjectIter {
    fn next(&mut self) -> Result<Option<Row>> {
        if self.done {
            return Ok(None);
        }
        if self.rows.is_none() {
            self.start();
        }

        let rows = match &self.rows {
            Some(r) => r.clone(),
            None => return Ok(None),
        };
        let errors = match &self.errors {
            Some(r) => r.clone(),
            None => return Ok(None),
        };

        crossbeam::select! {
            recv(rows) -> msg => match msg {
                Ok(row) => Ok(Some(row)),
                Err(_) => {
                    // All workers are gone. A worker that failed dropped
                    // its row sender only after publishing, so any error
                    // is already buffered; surface the first one.
                    let pending = errors.try_recv().ok();
                    self.shutdown();
                    match pending {
                        Some(err) => Err(err),
                        None => Ok(None),
                    }
                }
            },
            recv(errors) -> msg => match msg {
                Ok(err) => {
                    self.shutdown();
                    Err(err)
                }
                Err(_) => {
                    self.shutdown();
                    Ok(None)
                }
            },
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.shutdown();

        let mut input = self.input.lock();
        input.finished = true;
        input.child.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{collect_rows, RowsIter};
    use crate::types::{DataType, Value};

    fn field(index: usize) -> Expression {
        Expression::GetField {
            index,
            data_type: DataType::Text,
            name: format!("col{}", index + 1),
            table: "test".into(),
            nullable: true,
        }
    }

    fn input_rows(n: usize) -> Vec<Row> {
        (1..=n)
            .map(|i| {
                vec![
                    Value::Str(format!("col1_{i}")),
                    Value::Str(format!("col2_{i}")),
                ]
            })
            .collect()
    }

    struct ErrorAfter {
        remaining: usize,
    }

    impl RowIter for ErrorAfter {
        fn next(&mut self) -> Result<Option<Row>> {
            if self.remaining == 0 {
                return Err(Error::RowEvaluation("source failed".into()));
            }
            self.remaining -= 1;
            Ok(Some(vec![Value::I64(self.remaining as i64)]))
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_serial_preserves_order() {
        let ctx = Context::empty();
        let mut iter = ProjectIter::new(
            vec![field(1)],
            ctx,
            Box::new(RowsIter::new(input_rows(5))),
        );

        let rows = collect_rows(&mut iter).unwrap();
        let expected: Vec<Row> = (1..=5)
            .map(|i| vec![Value::Str(format!("col2_{i}"))])
            .collect();
        assert_eq!(rows, expected);
    }

    #[test]
    fn test_parallel_same_multiset() {
        for parallelism in [1, 2, 5, 8] {
            let ctx = Context::empty();
            let mut iter = ParallelProjectIter::new(
                vec![field(1)],
                &ctx,
                Box::new(RowsIter::new(input_rows(50))),
                parallelism,
            );

            let mut rows = collect_rows(&mut iter).unwrap();
            rows.sort_by(|a, b| a[0].natural_cmp(&b[0]));

            let mut expected: Vec<Row> = (1..=50)
                .map(|i| vec![Value::Str(format!("col2_{i}"))])
                .collect();
            expected.sort_by(|a, b| a[0].natural_cmp(&b[0]));

            assert_eq!(rows, expected, "parallelism {parallelism}");
        }
    }

    #[test]
    fn test_parallel_eof_is_sticky() {
        let ctx = Context::empty();
        let mut iter = ParallelProjectIter::new(
            vec![field(0)],
            &ctx,
            Box::new(RowsIter::new(input_rows(2))),
            2,
        );

        let mut seen = 0;
        while iter.next().unwrap().is_some() {
            seen += 1;
        }
        assert_eq!(seen, 2);
        assert!(iter.next().unwrap().is_none());
        iter.close().unwrap();
    }

    #[test]
    fn test_parallel_surfaces_child_error() {
        let ctx = Context::empty();
        let mut iter = ParallelProjectIter::new(
            vec![Expression::GetField {
                index: 0,
                data_type: DataType::I64,
                name: "n".into(),
                table: String::new(),
                nullable: false,
            }],
            &ctx,
            Box::new(ErrorAfter { remaining: 3 }),
            2,
        );

        let mut outcome = Ok(());
        for _ in 0..10 {
            match iter.next() {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }
        assert_eq!(
            outcome,
            Err(Error::RowEvaluation("source failed".into()))
        );
        iter.close().unwrap();
    }

    #[test]
    fn test_parallel_close_idempotent() {
        let ctx = Context::empty();
        let mut iter = ParallelProjectIter::new(
            vec![field(0)],
            &ctx,
            Box::new(RowsIter::new(input_rows(5))),
            3,
        );

        assert!(iter.next().unwrap().is_some());
        iter.close().unwrap();
        iter.close().unwrap();
        assert!(iter.next().unwrap().is_none());
    }

    #[test]
    fn test_parallel_close_cancels_context() {
        let ctx = Context::empty();
        let mut iter = ParallelProjectIter::new(
            vec![field(0)],
            &ctx,
            Box::new(RowsIter::new(input_rows(5))),
            2,
        );
        iter.close().unwrap();
        assert!(iter.cancel.is_cancelled());
        assert!(!ctx.is_cancelled());
    }
}
