//! Scenario 3: Routing.
//!
//! Three agents with different responsibilities. Requests without an explicit
//! target are resolved by path ownership, then by endpoint. Router events are
//! counted through the event bus while the scenario runs.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use warden_contracts::{
    agent::{AgentCapability, LegacyPermissions},
    error::WardenResult,
    operation::{AgentRequest, OperationType},
    tool::Tool,
};
use warden_core::events::EventKind;
use warden_policy::config::WardenConfig;

use crate::runtime::{report_outcome, Runtime};
use crate::scenarios::{echo_handler, finish};

pub async fn run_scenario(config: &WardenConfig) -> WardenResult<()> {
    println!("=== Scenario 3: Routing ===");
    println!();

    let runtime = Runtime::build(config)?;

    let denials = Arc::new(AtomicUsize::new(0));
    let counter = denials.clone();
    runtime.router.events().subscribe(EventKind::ToolAccessDenied, move |_| {
        counter.fetch_add(1, Ordering::Relaxed);
    });

    runtime.router.register_agent(
        AgentCapability::new("frontend", "Web frontend owner")
            .with_directory_patterns(["web/**"])
            .with_tools([Tool::ReadLocal, Tool::Edit, Tool::Create]),
        Some(echo_handler("frontend")),
    )?;
    runtime.router.register_agent(
        AgentCapability::new("qa", "Answers questions from other agents")
            .with_endpoint("question", "answer a question")
            .with_tools([Tool::InterAgentCommunication]),
        Some(echo_handler("qa")),
    )?;
    // Declared with the legacy boolean flags; the router converts them.
    runtime.router.register_agent(
        AgentCapability::new("runner", "Executes build commands")
            .with_endpoint("handle", "run a command")
            .with_legacy(LegacyPermissions {
                can_execute: true,
                ..LegacyPermissions::default()
            }),
        Some(echo_handler("runner")),
    )?;

    runtime.attach_config_rules()?;

    println!("  Agents:                 frontend (web/**), qa (question), runner (handle, legacy flags)");
    println!();

    let cases = [
        (
            "edit web/app.tsx (path owner frontend)",
            AgentRequest::new(OperationType::EditFile).with_path("web/app.tsx"),
            true,
        ),
        (
            "question (endpoint qa)",
            AgentRequest::new(OperationType::Question).from_agent("frontend"),
            true,
        ),
        (
            "execute (endpoint runner)",
            AgentRequest::new(OperationType::Execute),
            true,
        ),
        (
            "execute targeted at frontend (tool gate)",
            AgentRequest::new(OperationType::Execute).to_agent("frontend"),
            false,
        ),
        (
            "read via unknown agent 'ghost'",
            AgentRequest::new(OperationType::ReadFile).with_path("web/a.ts").to_agent("ghost"),
            false,
        ),
    ];

    let mut mismatches = 0;
    for (label, request, expect_allowed) in cases {
        let response = runtime.router.execute_request(request).await;
        if !report_outcome(label, &response, expect_allowed) {
            mismatches += 1;
        }
        println!("      handled by: {}", response.handled_by);
    }
    println!();

    let stats = runtime.router.get_stats();
    println!("  Router stats:");
    println!("    Registered agents:    {}", stats.registered_agents);
    println!(
        "    Requests:             {} ({} ok, {} failed)",
        stats.total_requests, stats.successful_responses, stats.failed_responses
    );
    for (agent, agent_stats) in &stats.per_agent {
        println!(
            "    {:<22}{} request(s), {} failure(s)",
            agent, agent_stats.requests, agent_stats.failures
        );
    }
    println!("    Tool denials seen:    {}", denials.load(Ordering::Relaxed));
    runtime.print_audit_summary();

    finish("routing", mismatches)
}
