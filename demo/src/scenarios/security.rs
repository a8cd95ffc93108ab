//! Scenario 2: Security validation.
//!
//! A maintainer agent may touch anything in the workspace, but every request
//! passes through the built-in security checks first. Traversal, credential,
//! and system-path requests are refused before the maintainer's handler ever
//! runs; the auditor then summarizes what happened.

use std::sync::Arc;

use warden_contracts::{
    agent::{AgentCapability, AgentId},
    error::WardenResult,
    operation::{AgentRequest, OperationType},
    tool::Tool,
};
use warden_patterns::SecurityValidatedAccessPattern;
use warden_policy::config::WardenConfig;

use crate::runtime::{report_outcome, Runtime};
use crate::scenarios::{echo_handler, finish};

const MAINTAINER: &str = "maintainer";

pub async fn run_scenario(config: &WardenConfig) -> WardenResult<()> {
    println!("=== Scenario 2: Security Validation ===");
    println!();

    let runtime = Runtime::build(config)?;
    let maintainer_id = AgentId::new(MAINTAINER);

    runtime.router.register_agent(
        AgentCapability::new(MAINTAINER, "Workspace maintainer")
            .with_directory_patterns(["**"])
            .with_tools([Tool::ReadLocal, Tool::ReadGlobal, Tool::Edit, Tool::Create]),
        Some(echo_handler(MAINTAINER)),
    )?;
    runtime.directory.add_pattern(
        &maintainer_id,
        Arc::new(SecurityValidatedAccessPattern::new(
            "workspace-guard",
            "workspace access with security checks",
            ["**"],
            true,
            60,
        )?),
    )?;

    runtime.attach_config_rules()?;

    println!("  Agent:                  {} (tools: read-local, read-global, edit, create)", MAINTAINER);
    println!("  Pattern:                workspace-guard  **  allow  priority 60  (8 checks)");
    println!();

    let cases = [
        ("read src/lib.rs", OperationType::ReadFile, "src/lib.rs", true),
        ("read ../etc/passwd (path traversal)", OperationType::ReadFile, "../etc/passwd", false),
        ("write config/.env (credential file)", OperationType::WriteFile, "config/.env", false),
        ("edit /etc/hosts (system path)", OperationType::EditFile, "/etc/hosts", false),
        ("edit README.md", OperationType::EditFile, "README.md", true),
    ];

    let mut mismatches = 0;
    for (label, operation, path, expect_allowed) in cases {
        let request = AgentRequest::new(operation).with_path(path).to_agent(MAINTAINER);
        let response = runtime.router.execute_request(request).await;
        if !report_outcome(label, &response, expect_allowed) {
            mismatches += 1;
        }
    }
    println!();

    let report = runtime.auditor.generate_security_report(None);
    println!("  Security report:");
    println!("    Total events:         {}", report.total_events);
    println!("    Denied events:        {}", report.denied_events);
    println!("    Critical events:      {}", report.critical_events);
    for entry in &report.top_resources {
        println!("    Resource:             {} ({})", entry.key, entry.count);
    }
    for event in runtime.auditor.get_denied_events(None) {
        println!(
            "    #{:<3} {:?} {}",
            event.sequence, event.record.severity, event.record.reason
        );
    }
    runtime.print_audit_summary();

    finish("security", mismatches)
}
