//! `ping`.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::rpc::context::ActionContext;
use crate::rpc::errors::RpcError;
use crate::rpc::registry::ActionHandler;

/// Ignores its input and answers `{"text": "pong"}` plus server facts.
pub struct PingHandler;

#[async_trait]
impl ActionHandler for PingHandler {
    async fn handle(
        &self,
        _data: Map<String, Value>,
        _ctx: &ActionContext,
    ) -> Result<Map<String, Value>, RpcError> {
        let mut out = Map::new();
        let _ = out.insert("text".into(), json!("pong"));
        let _ = out.insert("version".into(), json!(env!("CARGO_PKG_VERSION")));
        let _ = out.insert(
            "server_time".into(),
            json!(chrono::Utc::now().timestamp_millis()),
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::handlers::test_helpers::make_test_context;

    #[tokio::test]
    async fn ping_returns_pong() {
        let ctx = make_test_context("alice");
        let out = PingHandler.handle(Map::new(), &ctx).await.unwrap();
        assert_eq!(out["text"], "pong");
        assert!(out["version"].is_string());
        assert!(out["server_time"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn ping_ignores_payload() {
        let ctx = make_test_context("alice");
        let data = json!({"junk": [1, 2, 3]}).as_object().cloned().unwrap();
        let out = PingHandler.handle(data, &ctx).await.unwrap();
        assert_eq!(out["text"], "pong");
        assert!(out.get("junk").is_none());
    }
}
