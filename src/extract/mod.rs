pub mod geography;
pub mod ranked;
pub mod series;

use std::fmt;

use tracing::warn;

use crate::probe::{PageProbe, ProbeError};
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Series,
    Geography,
    RankedItems,
}

impl BlockKind {
    pub const ALL: [BlockKind; 3] = [BlockKind::Series, BlockKind::Geography, BlockKind::RankedItems];

    pub fn as_str(self) -> &'static str {
        match self {
            BlockKind::Series => "series",
            BlockKind::Geography => "geography",
            BlockKind::RankedItems => "ranked_items",
        }
    }

    pub fn parse(s: &str) -> Option<BlockKind> {
        BlockKind::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Column names of the block's table: (label, count).
    pub fn columns(self) -> (&'static str, &'static str) {
        match self {
            BlockKind::Series => ("date_text", "count"),
            BlockKind::Geography => ("location", "count"),
            BlockKind::RankedItems => ("item", "count"),
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Count {
    /// Parsed whole count (series block).
    Number(u64),
    /// Label-stripped text, numeric parsing left to the reader ("1.2M").
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub label: String,
    pub count: Count,
}

impl NormalizedRow {
    pub fn number(label: &str, count: u64) -> Self {
        NormalizedRow {
            label: label.to_string(),
            count: Count::Number(count),
        }
    }

    pub fn text(label: &str, count: &str) -> Self {
        NormalizedRow {
            label: label.to_string(),
            count: Count::Text(count.to_string()),
        }
    }
}

/// Result of one block extraction. `ok == false` always comes with empty rows.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockOutcome {
    pub kind: BlockKind,
    pub rows: Vec<NormalizedRow>,
    pub ok: bool,
    pub warning: Option<String>,
}

impl BlockOutcome {
    pub fn succeeded(kind: BlockKind, rows: Vec<NormalizedRow>) -> Self {
        BlockOutcome {
            kind,
            rows,
            ok: true,
            warning: None,
        }
    }

    pub fn failed(kind: BlockKind, warning: String) -> Self {
        BlockOutcome {
            kind,
            rows: Vec::new(),
            ok: false,
            warning: Some(warning),
        }
    }

    /// Extractor boundary: any probe fault becomes an empty, warned outcome.
    fn guard(kind: BlockKind, entity: &str, result: Result<Vec<NormalizedRow>, ProbeError>) -> Self {
        match result {
            Ok(rows) => BlockOutcome::succeeded(kind, rows),
            Err(e) => {
                warn!("{}: {} block empty: {}", entity, kind, e);
                BlockOutcome::failed(kind, e.to_string())
            }
        }
    }
}

pub struct ExtractedBlocks {
    pub series: BlockOutcome,
    pub geography: BlockOutcome,
    pub ranked_items: BlockOutcome,
}

impl ExtractedBlocks {
    pub fn empty(reason: &str) -> Self {
        ExtractedBlocks {
            series: BlockOutcome::failed(BlockKind::Series, reason.to_string()),
            geography: BlockOutcome::failed(BlockKind::Geography, reason.to_string()),
            ranked_items: BlockOutcome::failed(BlockKind::RankedItems, reason.to_string()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockOutcome> {
        [&self.series, &self.geography, &self.ranked_items].into_iter()
    }
}

/// Run the three extractors in fixed order; each one runs whatever the others did.
pub fn extract_all<P: PageProbe>(probe: &mut P, entity: &str, settings: &Settings) -> ExtractedBlocks {
    let series = BlockOutcome::guard(
        BlockKind::Series,
        entity,
        series::extract(probe, &settings.selectors, &settings.timings),
    );
    let geography = BlockOutcome::guard(
        BlockKind::Geography,
        entity,
        geography::extract(probe, &settings.selectors, &settings.timings, settings.output.max_rows),
    );
    let ranked_items = BlockOutcome::guard(
        BlockKind::RankedItems,
        entity,
        ranked::extract(probe, &settings.selectors, &settings.timings, settings.output.max_rows),
    );

    ExtractedBlocks {
        series,
        geography,
        ranked_items,
    }
}

/// Pair two independently queried element lists by index.
///
/// The insights page renders labels and their counts as sibling lists in the
/// same order; nothing ties label[i] to count[i] beyond that DOM order. The
/// shorter list wins and extra elements of the longer one are dropped.
pub(crate) fn pair_positionally<A, B>(labels: Vec<A>, counts: Vec<B>, cap: usize) -> Vec<(A, B)> {
    labels.into_iter().zip(counts).take(cap).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairing_truncates_to_shorter_and_cap() {
        let pairs = pair_positionally(vec![1, 2, 3], vec!["a", "b"], 10);
        assert_eq!(pairs, vec![(1, "a"), (2, "b")]);
        let capped = pair_positionally((0..15).collect(), (0..15).collect::<Vec<_>>(), 10);
        assert_eq!(capped.len(), 10);
        assert_eq!(capped[9], (9, 9));
    }

    #[test]
    fn block_kind_names() {
        for kind in BlockKind::ALL {
            assert_eq!(BlockKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(BlockKind::RankedItems.columns(), ("item", "count"));
        assert_eq!(BlockKind::parse("visitas"), None);
    }

    #[test]
    fn guard_turns_faults_into_empty_outcomes() {
        let out = BlockOutcome::guard(
            BlockKind::Geography,
            "Artist",
            Err(ProbeError::NoPage),
        );
        assert!(!out.ok);
        assert!(out.rows.is_empty());
        assert_eq!(out.warning.as_deref(), Some("no page loaded"));
    }
}
