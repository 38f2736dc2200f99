//! Audit command implementation.

use possync_protocol::{AuditQuery, EntityKind};
use std::path::Path;

/// Lists entries, most recent first, filtered by kind and text.
pub fn list(
    path: &Path,
    kind: Option<&str>,
    search: Option<String>,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = super::open(path)?;

    let mut query = AuditQuery::new();
    if let Some(kind) = kind {
        query = query.with_kind(kind.parse::<EntityKind>()?);
    }
    if let Some(text) = search {
        query = query.with_text(text);
    }

    let mut entries = db.audit().query(&query)?;
    if let Some(limit) = limit {
        entries.truncate(limit);
    }

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No matching audit entries");
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{}  {:<10} {:<16} {:<15} {}",
            entry.timestamp.to_rfc3339(),
            entry.actor_name,
            entry.action,
            entry.entity_kind.as_str(),
            entry.details,
        );
    }
    Ok(())
}

/// Removes every entry.
pub fn clear(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let db = super::open(path)?;
    let removed = db.audit().len()?;
    db.audit().clear()?;
    tracing::warn!(removed, "audit log cleared");
    println!("Removed {removed} audit entr(ies)");
    Ok(())
}
