use super::{pair_positionally, NormalizedRow};
use crate::normalize::normalize_magnitude;
use crate::probe::{ElementHandle, PageProbe, ProbeError};
use crate::settings::{Selectors, Timings};

const UNKNOWN_ITEM: &str = "Unknown";

/// Top items: name from the thumbnail's label attribute, count from the
/// separately listed count elements.
pub fn extract<P: PageProbe>(
    probe: &mut P,
    selectors: &Selectors,
    timings: &Timings,
    cap: usize,
) -> Result<Vec<NormalizedRow>, ProbeError> {
    probe.wait_for_selector(&selectors.item_thumb, timings.list_wait())?;

    let thumbs = probe.query_all(&selectors.item_thumb)?;
    let counts = probe.query_all(&selectors.item_count)?;

    pair_positionally(thumbs, counts, cap)
        .into_iter()
        .map(|(thumb, count)| -> Result<NormalizedRow, ProbeError> {
            // A blank label counts as no label.
            let name = thumb
                .attribute(&selectors.item_label_attr)?
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| UNKNOWN_ITEM.to_string());
            let count = normalize_magnitude(&count.text()?);
            Ok(NormalizedRow::text(&name, &count))
        })
        .collect()
}
