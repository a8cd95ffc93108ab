//! Demo scenarios. Each builds its own runtime so they can run in any order.

pub mod editor;
pub mod routing;
pub mod security;

use warden_contracts::error::{WardenError, WardenResult};

/// Turn a count of unexpected outcomes into the scenario result.
pub(crate) fn finish(scenario: &str, mismatches: usize) -> WardenResult<()> {
    if mismatches == 0 {
        println!("  RESULT: SUCCESS (all outcomes as expected)");
        println!();
        Ok(())
    } else {
        Err(WardenError::Config {
            reason: format!("{scenario}: {mismatches} outcome(s) did not match expectations"),
        })
    }
}

/// A handler that acknowledges the request and echoes what it was asked to do.
pub(crate) fn echo_handler(agent: &'static str) -> std::sync::Arc<dyn warden_core::traits::AgentHandler> {
    warden_core::traits::handler_fn(move |request| async move {
        Ok(warden_contracts::operation::AgentResponse::success(serde_json::json!({
            "agent": agent,
            "operation": request.operation.as_str(),
            "path": request.file_path,
        })))
    })
}
