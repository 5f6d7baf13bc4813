//! CLI presentation: text and json formatters per command.

use crate::error::ContextError;
use crate::workdir::{WorkdirContext, WorkdirPath};
use comfy_table::Table;
use std::path::Path;
use std::sync::Arc;

pub fn format_find_output(
    path: &Path,
    root: Option<&WorkdirPath>,
    format: &str,
) -> Result<String, ContextError> {
    if format == "json" {
        let value = serde_json::json!({
            "path": path.display().to_string(),
            "root": root.map(|root| root.as_str()),
        });
        return Ok(serde_json::to_string_pretty(&value)?);
    }
    Ok(match root {
        Some(root) => root.to_string(),
        None => format!("No repository contains {}", path.display()),
    })
}

/// Active context plus the resident pool.
pub fn format_resolution_output(
    active: &WorkdirContext,
    contexts: &[Arc<WorkdirContext>],
    format: &str,
) -> Result<String, ContextError> {
    if format == "json" {
        let pool: Vec<serde_json::Value> = contexts
            .iter()
            .map(|context| {
                serde_json::json!({
                    "workdir": context.working_directory().map(|w| w.as_str()),
                    "state": context.repository_state().as_str(),
                    "active": context.id() == active.id(),
                })
            })
            .collect();
        let value = serde_json::json!({
            "active": active.working_directory().map(|w| w.as_str()),
            "active_state": active.repository_state().as_str(),
            "pool": pool,
        });
        return Ok(serde_json::to_string_pretty(&value)?);
    }

    let mut output = format!("Active: {} ({})\n", active, active.repository_state().as_str());
    if contexts.is_empty() {
        output.push_str("No resident working directories");
        return Ok(output);
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Working Directory", "State", "Active"]);
    for context in contexts {
        let marker = if context.id() == active.id() { "*" } else { "" };
        table.add_row(vec![
            context.to_string(),
            context.repository_state().as_str().to_string(),
            marker.to_string(),
        ]);
    }
    output.push_str(&table.to_string());
    Ok(output)
}
