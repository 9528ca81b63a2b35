//! Query session and execution context
//!
//! A context couples the session configuration with a cancellation
//! signal and mints the tracing spans that wrap row iterators.

use crate::config::Config;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Session state available to a running query.
pub trait Session: Send + Sync {
    /// Config of the session. It also has access to the global config
    /// through its parent.
    fn config(&self) -> &Arc<Config>;
}

/// The stock session implementation.
pub struct BaseSession {
    config: Arc<Config>,
}

impl BaseSession {
    pub fn new(config: Arc<Config>) -> Self {
        BaseSession { config }
    }
}

impl Session for BaseSession {
    fn config(&self) -> &Arc<Config> {
        &self.config
    }
}

/// Context of a query execution.
#[derive(Clone)]
pub struct Context {
    session: Arc<dyn Session>,
    cancel: CancellationToken,
}

impl Context {
    pub fn new(session: Arc<dyn Session>) -> Self {
        Context {
            session,
            cancel: CancellationToken::new(),
        }
    }

    /// Creates a context with a fresh session over an empty config.
    pub fn empty() -> Self {
        Context::new(Arc::new(BaseSession::new(Arc::new(Config::new()))))
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    pub fn config(&self) -> &Arc<Config> {
        self.session.config()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Derives a child context whose cancellation can be triggered
    /// independently. Cancelling the parent also cancels the child.
    pub fn child_cancellable(&self) -> (Context, CancellationToken) {
        let token = self.cancel.child_token();
        let ctx = Context {
            session: self.session.clone(),
            cancel: token.clone(),
        };
        (ctx, token)
    }

    /// Opens a tracing span for the given plan node kind.
    pub fn span(&self, node: &str) -> tracing::Span {
        tracing::trace_span!("row_iter", node = node)
    }
}
