use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::settings::InputSettings;

/// One subject of analysis: display name and the page to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub name: String,
    pub source_url: String,
}

pub fn load_entities(path: &Path, columns: &InputSettings) -> Result<Vec<Entity>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open entity list {}", path.display()))?;
    let entities = read_entities(file, columns)
        .with_context(|| format!("Failed to read entity list {}", path.display()))?;
    info!("Loaded {} entities from {}", entities.len(), path.display());
    Ok(entities)
}

/// Rows in file order. Both columns must exist in the header; a short row
/// still yields an entity (with empty fields) so it fails later at navigation.
pub fn read_entities<R: Read>(reader: R, columns: &InputSettings) -> Result<Vec<Entity>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let find = |col: &str| {
        headers
            .iter()
            .position(|h| h == col)
            .ok_or_else(|| anyhow::anyhow!("Missing column {:?} (found: {:?})", col, headers))
    };
    let name_idx = find(&columns.name_column)?;
    let url_idx = find(&columns.url_column)?;

    let mut entities = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let name = record.get(name_idx).unwrap_or_default().to_string();
        let source_url = record.get(url_idx).unwrap_or_default().to_string();
        if name.is_empty() || source_url.is_empty() {
            warn!("Row {} is incomplete (name={:?}, url={:?})", i + 1, name, source_url);
        }
        entities.push(Entity { name, source_url });
    }

    Ok(entities)
}
