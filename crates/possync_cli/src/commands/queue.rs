//! Queue command implementation.

use std::path::Path;

/// Lists pending actions, oldest first.
pub fn list(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = super::open(path)?;
    let actions = db.queue().list_all()?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&actions)?);
        return Ok(());
    }

    if actions.is_empty() {
        println!("Queue is empty");
        return Ok(());
    }
    println!("{} pending action(s):", actions.len());
    for action in &actions {
        println!(
            "  {}  {:<7} {:<15} {}  (queued {})",
            action.id,
            action.operation.as_str(),
            action.kind().as_str(),
            action.record_id(),
            action.enqueued_at.to_rfc3339(),
        );
    }
    Ok(())
}

/// Drops every pending action.
pub fn clear(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let db = super::open(path)?;
    let dropped = db.queue().len()?;
    db.queue().clear()?;
    tracing::warn!(dropped, "action queue cleared");
    println!("Dropped {dropped} pending action(s)");
    Ok(())
}
