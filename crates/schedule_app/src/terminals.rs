use std::fs;
use std::path::Path;

use schedule_core::Terminal;
use schedule_logging::tracker_warn;

use crate::ConfigError;

/// Read the JSON terminal list. Order is preserved.
pub fn load_terminals(path: &Path) -> Result<Vec<Terminal>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_terminals(&text)
}

pub fn parse_terminals(text: &str) -> Result<Vec<Terminal>, ConfigError> {
    let terminals: Vec<Terminal> =
        serde_json::from_str(text).map_err(|e| ConfigError::Invalid {
            name: "terminals",
            reason: e.to_string(),
        })?;

    Ok(terminals
        .into_iter()
        .filter(|terminal| {
            let usable = !terminal.source_page_url.trim().is_empty()
                && terminal.source_page_url != "empty";
            if !usable {
                tracker_warn!("{} has no page link. Skipping...", terminal.name);
            }
            usable
        })
        .collect())
}
