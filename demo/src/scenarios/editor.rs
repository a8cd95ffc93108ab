//! Scenario 1: Editor agent.
//!
//! An editor owns `src/**` and `docs/**`. A file-system pattern allows its
//! source edits; the configured override rules then deny anything under
//! `secrets/` and grant markdown edits under `docs/`. A delete inside `src/`
//! is refused by the tool gate because the editor holds no delete tool.

use std::sync::Arc;

use warden_contracts::{
    agent::{AgentCapability, AgentId},
    error::WardenResult,
    operation::{AgentRequest, OperationType},
    tool::Tool,
};
use warden_patterns::FileSystemAccessPattern;
use warden_policy::config::WardenConfig;

use crate::runtime::{report_outcome, Runtime};
use crate::scenarios::{echo_handler, finish};

const EDITOR: &str = "editor";

pub async fn run_scenario(config: &WardenConfig) -> WardenResult<()> {
    println!("=== Scenario 1: Editor Agent ===");
    println!();

    let runtime = Runtime::build(config)?;
    let editor_id = AgentId::new(EDITOR);

    runtime.router.register_agent(
        AgentCapability::new(EDITOR, "Source editor")
            .with_directory_patterns(["src/**", "docs/**"])
            .with_tools([Tool::ReadLocal, Tool::Edit, Tool::Create]),
        Some(echo_handler(EDITOR)),
    )?;
    runtime.directory.add_pattern(
        &editor_id,
        Arc::new(FileSystemAccessPattern::new(
            "editor-src",
            "editor may work on source files",
            ["src/**"],
            true,
            50,
        )?),
    )?;

    runtime.attach_config_rules()?;

    println!("  Agent:                  {} (tools: read-local, edit, create)", EDITOR);
    println!("  Pattern:                editor-src  src/**  allow  priority 50");
    for rule in runtime.engine.get_rules(Some(&editor_id)) {
        println!(
            "  Rule:                   {}  {}  {}  priority {}",
            rule.id,
            rule.file_pattern,
            if rule.allow { "allow" } else { "deny" },
            rule.priority
        );
    }
    println!();

    let cases = [
        ("edit src/app.ts (pattern allows)", OperationType::EditFile, "src/app.ts", true),
        ("edit secrets/api.ts (rule protect-secrets)", OperationType::EditFile, "secrets/api.ts", false),
        ("edit docs/guide.md (rule docs-for-editor)", OperationType::EditFile, "docs/guide.md", true),
        ("delete src/old.ts (no delete tool)", OperationType::DeleteFile, "src/old.ts", false),
    ];

    let mut mismatches = 0;
    for (label, operation, path, expect_allowed) in cases {
        let request = AgentRequest::new(operation).with_path(path).to_agent(EDITOR);
        let response = runtime.router.execute_request(request).await;
        if !report_outcome(label, &response, expect_allowed) {
            mismatches += 1;
        }
    }
    println!();

    println!("  Decision audit (newest first):");
    for entry in runtime.engine.get_audit_log(Some(&editor_id), Some(4)) {
        println!(
            "    {:<12} {:<18} {:<6} {}",
            entry.operation.as_str(),
            entry.file_path.as_deref().unwrap_or("-"),
            if entry.result.allowed { "allow" } else { "deny" },
            entry.result.reason
        );
    }
    runtime.print_audit_summary();

    finish("editor", mismatches)
}
