use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Label words that surround counts on the insights page, in the locales we've seen.
/// A word may be glued to the count ("3.4Mviews"); group 1 keeps that digit or scale letter.
static NOISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\b|[\dKM])(?:views?|vistas?|visualizaciones|visualización|visualizacion|visualizations?|visualisations?|visualizações|visualizacoes|vues|reproducciones)\b",
    )
    .unwrap()
});
static LEADING_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:[.,]\d+)*)\s*([KkMm])?(?:$|[^\w.,])").unwrap());
static GROUPED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(?:[.,]\d{3})+$").unwrap());

#[derive(Debug, Error, PartialEq)]
pub enum NormalizationError {
    #[error("nothing left after stripping label words")]
    Empty,
    #[error("no leading number in {0:?}")]
    NoLeadingNumber(String),
    #[error("magnitude out of range: {0:?}")]
    Overflow(String),
}

/// Strip count label words ("views", "vistas", ...) and collapse whitespace.
pub fn normalize_magnitude(raw: &str) -> String {
    let stripped = NOISE_RE.replace_all(raw, "${1} ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a count like `1.2M`, `3,4 K` or `987` into a float.
///
/// A single separator followed by a scale letter is a decimal separator
/// (`1,2K` == `1.2K`). Without a scale letter, `1,234` / `1.234.567` shaped
/// text is treated as digit grouping; anything else is parsed as a decimal.
pub fn expand_scale_suffix(raw: &str) -> Result<f64, NormalizationError> {
    let text = normalize_magnitude(raw);
    if text.is_empty() {
        return Err(NormalizationError::Empty);
    }

    let caps = LEADING_NUMBER_RE
        .captures(&text)
        .ok_or_else(|| NormalizationError::NoLeadingNumber(text.clone()))?;
    let number = &caps[1];
    let scale = match caps.get(2).map(|m| m.as_str()) {
        Some("K" | "k") => 1e3,
        Some("M" | "m") => 1e6,
        _ => 1.0,
    };

    let value = if scale == 1.0 && GROUPED_RE.is_match(number) {
        strip_grouping(number)
            .map(|n| n as f64)
            .ok_or_else(|| NormalizationError::Overflow(text.clone()))?
    } else {
        parse_decimal(number).ok_or_else(|| NormalizationError::NoLeadingNumber(text.clone()))?
    };

    Ok(value * scale)
}

/// Digit-grouping cleanup for whole counts: `1,234` / `1.234` → 1234.
pub fn parse_grouped_count(raw: &str) -> Result<u64, NormalizationError> {
    let text = normalize_magnitude(raw);
    if text.is_empty() {
        return Err(NormalizationError::Empty);
    }
    if !text.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.') {
        return Err(NormalizationError::NoLeadingNumber(text));
    }
    if !text.chars().any(|c| c.is_ascii_digit()) {
        return Err(NormalizationError::NoLeadingNumber(text));
    }
    strip_grouping(&text).ok_or(NormalizationError::Overflow(text))
}

fn strip_grouping(s: &str) -> Option<u64> {
    s.chars()
        .filter(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .ok()
}

fn parse_decimal(s: &str) -> Option<f64> {
    // Only the last separator can be a decimal point; earlier ones group digits.
    match s.rfind(['.', ',']) {
        Some(idx) => {
            let int: String = s[..idx].chars().filter(|c| c.is_ascii_digit()).collect();
            let frac = &s[idx + 1..];
            format!("{}.{}", int, frac).parse().ok()
        }
        None => s.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_label_words() {
        assert_eq!(normalize_magnitude("1.2M visualizaciones"), "1.2M");
        assert_eq!(normalize_magnitude("  340K views "), "340K");
        assert_eq!(normalize_magnitude("Vistas 12,5K"), "12,5K");
        assert_eq!(normalize_magnitude("987 visualization"), "987");
    }

    #[test]
    fn keeps_words_that_only_contain_noise() {
        // whole-word matching: "Reviews" is not "views"
        assert_eq!(normalize_magnitude("Reviews 3"), "Reviews 3");
    }

    #[test]
    fn noise_position_does_not_change_value() {
        let forms = [
            "views 1.5K",
            "1.5K views",
            "1.5 views K",
            "VISTAS 1.5K visualizaciones",
            "1,5K vistas",
        ];
        for f in forms {
            assert_eq!(expand_scale_suffix(f), Ok(1500.0), "form {:?}", f);
        }
    }

    #[test]
    fn label_glued_to_scale_letter() {
        assert_eq!(normalize_magnitude("3.4Mviews"), "3.4M");
        assert_eq!(expand_scale_suffix("3.4Mviews"), Ok(3_400_000.0));
        assert_eq!(expand_scale_suffix("1.5Kvistas"), Ok(1500.0));
        assert_eq!(expand_scale_suffix("987views"), Ok(987.0));
    }

    #[test]
    fn trailing_junk_is_an_error_not_a_shorter_number() {
        assert!(matches!(
            expand_scale_suffix("3.4Mx"),
            Err(NormalizationError::NoLeadingNumber(_))
        ));
        assert!(matches!(
            expand_scale_suffix("1.5abc"),
            Err(NormalizationError::NoLeadingNumber(_))
        ));
    }

    #[test]
    fn scale_letters() {
        assert_eq!(expand_scale_suffix("2M"), Ok(2_000_000.0));
        assert_eq!(expand_scale_suffix("1.25M"), Ok(1_250_000.0));
        assert_eq!(expand_scale_suffix("12 k"), Ok(12_000.0));
        assert_eq!(expand_scale_suffix("987"), Ok(987.0));
    }

    #[test]
    fn grouping_without_scale() {
        assert_eq!(expand_scale_suffix("1,234"), Ok(1234.0));
        assert_eq!(expand_scale_suffix("1.234.567"), Ok(1_234_567.0));
        assert_eq!(expand_scale_suffix("3,5"), Ok(3.5));
    }

    #[test]
    fn rejects_text_without_number() {
        assert_eq!(expand_scale_suffix("views"), Err(NormalizationError::Empty));
        assert!(matches!(
            expand_scale_suffix("n/a"),
            Err(NormalizationError::NoLeadingNumber(_))
        ));
    }

    #[test]
    fn grouped_counts() {
        assert_eq!(parse_grouped_count("1,234"), Ok(1234));
        assert_eq!(parse_grouped_count("5.678"), Ok(5678));
        assert_eq!(parse_grouped_count("42"), Ok(42));
        assert!(parse_grouped_count(",.").is_err());
        assert!(parse_grouped_count("1.2K").is_err());
    }
}
