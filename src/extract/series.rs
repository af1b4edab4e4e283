use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::NormalizedRow;
use crate::normalize::parse_grouped_count;
use crate::probe::{ElementHandle, PageProbe, ProbeError};
use crate::settings::{Selectors, Timings};

/// "24 sep. 2025 1,234": day, month word with optional period, year, then the count.
static POINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2} \w+\.? \d{4})\s+([\d,.]+)").unwrap());

pub fn extract<P: PageProbe>(
    probe: &mut P,
    selectors: &Selectors,
    timings: &Timings,
) -> Result<Vec<NormalizedRow>, ProbeError> {
    probe.wait_for_selector(&selectors.series_widget, timings.series_wait())?;

    let widget = probe.query_all(&selectors.series_widget)?;
    let Some(widget) = widget.first() else {
        return Err(ProbeError::SelectorTimeout {
            selector: selectors.series_widget.clone(),
            timeout: timings.series_wait(),
        });
    };

    Ok(parse_points(&widget.text()?))
}

/// Dated points in document order. The first match on the card is the
/// headline total, not a day, and is skipped.
pub fn parse_points(text: &str) -> Vec<NormalizedRow> {
    POINT_RE
        .captures_iter(text)
        .skip(1)
        .filter_map(|caps| match parse_grouped_count(&caps[2]) {
            Ok(count) => Some(NormalizedRow::number(&caps[1], count)),
            Err(e) => {
                debug!("Dropping series point {:?}: {}", &caps[1], e);
                None
            }
        })
        .collect()
}
