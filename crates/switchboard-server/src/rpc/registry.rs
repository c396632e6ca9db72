//! Action registry and async dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::histogram;
use serde_json::{Map, Value};
use tracing::{error, warn};

use crate::metrics::RPC_REQUEST_DURATION_SECONDS;
use crate::rpc::context::ActionContext;
use crate::rpc::errors::RpcError;

/// Default per-handler timeout.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(60);

/// Handlers slower than this are logged.
const SLOW_HANDLER_THRESHOLD: Duration = Duration::from_secs(5);

/// Trait implemented by every action handler.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Run the action with the request's `data` on behalf of `ctx.user_id`.
    async fn handle(
        &self,
        data: Map<String, Value>,
        ctx: &ActionContext,
    ) -> Result<Map<String, Value>, RpcError>;
}

/// Static table from action name to handler, built once at startup.
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
    timeout: Duration,
}

impl ActionRegistry {
    /// Create an empty registry with the default timeout.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            timeout: DEFAULT_HANDLER_TIMEOUT,
        }
    }

    /// Override the per-handler timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a handler. A later registration for the same name wins.
    pub fn register(&mut self, action: &str, handler: impl ActionHandler + 'static) {
        let _ = self.handlers.insert(action.to_owned(), Arc::new(handler));
    }

    /// Whether `action` is registered.
    pub fn has_action(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Registered action names, sorted.
    pub fn actions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run the handler for `action` under the registry timeout.
    ///
    /// Unknown actions yield [`RpcError::BadAction`]; a timeout yields
    /// [`RpcError::Internal`].
    pub async fn dispatch(
        &self,
        action: &str,
        data: Map<String, Value>,
        ctx: &ActionContext,
    ) -> Result<Map<String, Value>, RpcError> {
        let Some(handler) = self.handlers.get(action) else {
            return Err(RpcError::BadAction {
                action: action.to_owned(),
            });
        };

        let start = Instant::now();
        let result = tokio::time::timeout(self.timeout, handler.handle(data, ctx)).await;
        let elapsed = start.elapsed();
        histogram!(RPC_REQUEST_DURATION_SECONDS, "action" => action.to_owned())
            .record(elapsed.as_secs_f64());

        if elapsed >= SLOW_HANDLER_THRESHOLD {
            warn!(action, duration_secs = elapsed.as_secs_f64(), "slow action handler");
        }

        result.unwrap_or_else(|_elapsed| {
            error!(action, timeout = ?self.timeout, "action handler timed out");
            Err(RpcError::Internal {
                message: format!("handler for '{action}' timed out after {:?}", self.timeout),
            })
        })
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
