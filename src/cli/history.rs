// src/cli/history.rs — `redraft history` and `redraft show`

use std::path::Path;

use crate::core::revision::format_score;
use crate::memory::store::RequestRecord;
use crate::memory::MemoryManager;
use crate::util::truncate_str;

use super::run::render_human;

pub fn list_history(
    db_path: &Path,
    session: Option<&str>,
    gradable: bool,
    limit: u32,
    json: bool,
) -> anyhow::Result<()> {
    if !db_path.exists() {
        println!("No history yet.");
        return Ok(());
    }
    let mm = MemoryManager::open(db_path)?;
    let records = match session {
        Some(id) => mm.store.list_requests_for_session(id, limit)?,
        None if gradable => mm.store.list_gradable_requests(limit)?,
        None => mm.store.list_recent_requests(limit)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No requests found.");
        return Ok(());
    }
    for record in &records {
        println!("{}", summary_line(record));
    }
    Ok(())
}

pub fn show_request(db_path: &Path, request_id: &str, json: bool) -> anyhow::Result<()> {
    let mm = MemoryManager::open(db_path)?;
    let record = mm
        .store
        .get_request(request_id)?
        .ok_or_else(|| anyhow::anyhow!("request '{request_id}' not found"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("Session: {}  Stored: {}", record.session_id, record.created_at);
    match record.result() {
        Ok(result) => {
            println!("Original:\n{}\n", result.original_text.trim_end());
            print!("{}", render_human(&result));
        }
        Err(e) => {
            tracing::warn!("Stored response for {} is not a run result: {}", request_id, e);
            println!("{}", serde_json::to_string_pretty(&record.response)?);
        }
    }
    Ok(())
}

/// `<created> <id> <iterations> <lowest score> <preview>`
pub(crate) fn summary_line(record: &RequestRecord) -> String {
    let created = record.created_at.get(..19).unwrap_or(&record.created_at);
    match record.result() {
        Ok(result) => {
            let lowest = result
                .scores
                .as_ref()
                .and_then(|s| s.iter().map(|(_, &v)| v).reduce(f32::min))
                .map(format_score)
                .unwrap_or_else(|| "-".into());
            let preview = truncate_str(result.original_text.lines().next().unwrap_or(""), 40);
            format!(
                "{created}  {}  {} iter  min {lowest}/10  {preview}",
                record.id, result.iterations
            )
        }
        Err(_) => format!("{created}  {}  (unreadable response)", record.id),
    }
}
