//! Status command implementation.

use possync_engine::{ConfigGate, SyncConfig};
use possync_protocol::EntityKind;
use serde::Serialize;
use std::path::Path;

/// Terminal status.
#[derive(Debug, Serialize)]
pub struct StatusResult {
    /// Data path.
    pub path: String,
    /// Persisted offline flag.
    pub offline: bool,
    /// Why sync would be skipped, if the environment is not configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unconfigured: Option<String>,
    /// Record counts per kind.
    pub records: Vec<KindCount>,
    /// Pending actions.
    pub queue_depth: usize,
    /// Audit entries held.
    pub audit_entries: usize,
}

/// Record count for one kind.
#[derive(Debug, Serialize)]
pub struct KindCount {
    /// Entity kind.
    pub kind: EntityKind,
    /// Number of records.
    pub count: usize,
}

/// Runs the status command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = super::open(path)?;

    let records = EntityKind::ALL
        .iter()
        .map(|&kind| {
            Ok(KindCount {
                kind,
                count: db.snapshot(kind)?.len(),
            })
        })
        .collect::<Result<Vec<_>, possync_core::CoreError>>()?;

    let config = SyncConfig::from_env()?;
    let result = StatusResult {
        path: path.display().to_string(),
        offline: db.offline().is_offline()?,
        unconfigured: ConfigGate::check_remote(&config).err(),
        records,
        queue_depth: db.queue().len()?,
        audit_entries: db.audit().len()?,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &StatusResult) {
    println!("Terminal: {}", result.path);
    println!();
    println!("Offline:        {}", result.offline);
    match &result.unconfigured {
        Some(reason) => println!("Sync:           not configured ({reason})"),
        None => println!("Sync:           configured"),
    }
    println!("Queue depth:    {}", result.queue_depth);
    println!("Audit entries:  {}", result.audit_entries);
    println!();
    println!("Records:");
    for entry in &result.records {
        println!("  {:<16}{}", entry.kind.as_str(), entry.count);
    }
}
