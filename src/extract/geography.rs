use super::{pair_positionally, NormalizedRow};
use crate::normalize::normalize_magnitude;
use crate::probe::{ElementHandle, PageProbe, ProbeError};
use crate::settings::{Selectors, Timings};

/// Top locations as (location, count text), at most `cap` rows.
pub fn extract<P: PageProbe>(
    probe: &mut P,
    selectors: &Selectors,
    timings: &Timings,
    cap: usize,
) -> Result<Vec<NormalizedRow>, ProbeError> {
    probe.wait_for_selector(&selectors.location_title, timings.list_wait())?;

    let titles = probe.query_all(&selectors.location_title)?;
    let subtitles = probe.query_all(&selectors.location_subtitle)?;

    pair_positionally(titles, subtitles, cap)
        .into_iter()
        .map(|(title, subtitle)| -> Result<NormalizedRow, ProbeError> {
            let location = title.text()?.trim().to_string();
            let count = normalize_magnitude(&subtitle.text()?);
            Ok(NormalizedRow::text(&location, &count))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::probe::fake::{FakeElement, FakeProbe};

    fn probe_with(titles: &[&str], subtitles: &[&str]) -> FakeProbe {
        let s = Selectors::default();
        let mut page = HashMap::new();
        page.insert(s.location_title.clone(), titles.iter().map(|t| FakeElement::new(t)).collect());
        page.insert(
            s.location_subtitle.clone(),
            subtitles.iter().map(|t| FakeElement::new(t)).collect(),
        );
        let mut probe = FakeProbe::default().with_page("u", page);
        probe.navigate("u", Default::default()).unwrap();
        probe
    }

    #[test]
    fn count_text_keeps_scale_letter() {
        let mut probe = probe_with(&["  Bogotá "], &["1.2M visualizaciones"]);
        let rows = extract(&mut probe, &Selectors::default(), &Timings::immediate(), 10).unwrap();
        assert_eq!(rows, vec![NormalizedRow::text("Bogotá", "1.2M")]);
    }

    #[test]
    fn never_more_than_cap() {
        let titles: Vec<String> = (0..14).map(|i| format!("City {}", i)).collect();
        let subs: Vec<String> = (0..14).map(|i| format!("{}K views", i)).collect();
        let titles: Vec<&str> = titles.iter().map(String::as_str).collect();
        let subs: Vec<&str> = subs.iter().map(String::as_str).collect();
        let mut probe = probe_with(&titles, &subs);

        let rows = extract(&mut probe, &Selectors::default(), &Timings::immediate(), 10).unwrap();
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[9], NormalizedRow::text("City 9", "9K"));
    }

    #[test]
    fn unequal_lists_pair_by_index() {
        let mut probe = probe_with(&["Cali", "Quito", "Lima"], &["10K", "9K"]);
        let rows = extract(&mut probe, &Selectors::default(), &Timings::immediate(), 10).unwrap();
        assert_eq!(
            rows,
            vec![NormalizedRow::text("Cali", "10K"), NormalizedRow::text("Quito", "9K")]
        );
    }

    #[test]
    fn missing_titles_time_out() {
        let mut probe = probe_with(&[], &["10K"]);
        let err = extract(&mut probe, &Selectors::default(), &Timings::immediate(), 10);
        assert!(matches!(err, Err(ProbeError::SelectorTimeout { .. })));
    }
}
