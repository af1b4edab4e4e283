use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::render::Renderer;
use super::{ElementHandle, PageProbe, ProbeError};

/// Probe over a rendered HTML snapshot.
///
/// The snapshot is fixed once `navigate` returns, so waiting on a selector
/// cannot make it appear: a missing selector times out immediately.
pub struct DocumentProbe<R> {
    renderer: R,
    page: Option<Html>,
}

impl<R: Renderer> DocumentProbe<R> {
    pub fn new(renderer: R) -> Self {
        DocumentProbe {
            renderer,
            page: None,
        }
    }

    fn page(&self) -> Result<&Html, ProbeError> {
        self.page.as_ref().ok_or(ProbeError::NoPage)
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    text: String,
    attrs: Vec<(String, String)>,
}

impl Element {
    fn snapshot(el: ElementRef<'_>) -> Self {
        Element {
            text: inner_text(el),
            attrs: el
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl ElementHandle for Element {
    fn text(&self) -> Result<String, ProbeError> {
        Ok(self.text.clone())
    }

    fn attribute(&self, name: &str) -> Result<Option<String>, ProbeError> {
        Ok(self
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone()))
    }
}

impl<R: Renderer> PageProbe for DocumentProbe<R> {
    type Element = Element;

    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), ProbeError> {
        // Never keep the previous entity's page around after a failed navigation.
        self.page = None;
        let html = self
            .renderer
            .render(url, timeout)
            .map_err(|e| ProbeError::Navigation {
                url: url.to_string(),
                reason: format!("{:#}", e),
            })?;
        self.page = Some(Html::parse_document(&html));
        Ok(())
    }

    fn wait_for_network_idle(&mut self, _timeout: Duration) -> Result<(), ProbeError> {
        self.page().map(|_| ())
    }

    fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<(), ProbeError> {
        let parsed = parse_selector(selector)?;
        if self.page()?.select(&parsed).next().is_some() {
            Ok(())
        } else {
            debug!("Selector {} absent from snapshot", selector);
            Err(ProbeError::SelectorTimeout {
                selector: selector.to_string(),
                timeout,
            })
        }
    }

    fn query_all(&self, selector: &str) -> Result<Vec<Element>, ProbeError> {
        let parsed = parse_selector(selector)?;
        Ok(self.page()?.select(&parsed).map(Element::snapshot).collect())
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ProbeError> {
    Selector::parse(selector).map_err(|e| ProbeError::InvalidSelector {
        selector: selector.to_string(),
        reason: format!("{:?}", e),
    })
}

/// Text nodes joined with single spaces, whitespace collapsed.
fn inner_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
pub mod tests {
    use std::collections::HashMap;

    use anyhow::Result;

    use super::*;

    /// Serves fixed HTML per URL.
    pub struct FixtureRenderer(pub HashMap<String, String>);

    impl Renderer for FixtureRenderer {
        fn render(&self, url: &str, _timeout: Duration) -> Result<String> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("connection refused"))
        }
    }

    pub const INSIGHTS_PAGE: &str = r#"
<html><body>
  <ytmc-views-card-v2>
    <div class="total"><span>Total</span> <span>99,999</span></div>
    <div class="point"><span>24 sep. 2025</span><span>1,234</span></div>
    <div class="point"><span>23 sep. 2025</span><span>5,678</span></div>
  </ytmc-views-card-v2>
  <ul>
    <li><div class="entityTitleForInsightsPageLocationEntity"> Bogotá </div>
        <div class="subtitleForInsightsPageLocationEntity">1.2M visualizaciones</div></li>
    <li><div class="entityTitleForInsightsPageLocationEntity">Medellín</div>
        <div class="subtitleForInsightsPageLocationEntity">850K visualizaciones</div></li>
  </ul>
  <ol>
    <li><img class="thumbForInsightsPageSongEntity" aria-label="Primera Cita"><span class="viewscount">3.4M views</span></li>
    <li><img class="thumbForInsightsPageSongEntity"><span class="viewscount">900K views</span></li>
  </ol>
</body></html>"#;

    fn probe() -> DocumentProbe<FixtureRenderer> {
        let mut pages = HashMap::new();
        pages.insert("https://charts.test/a".to_string(), INSIGHTS_PAGE.to_string());
        DocumentProbe::new(FixtureRenderer(pages))
    }

    #[test]
    fn queries_before_navigation_fail() {
        let p = probe();
        assert!(matches!(p.query_all("div"), Err(ProbeError::NoPage)));
    }

    #[test]
    fn widget_text_reads_like_inner_text() {
        let mut p = probe();
        p.navigate("https://charts.test/a", Duration::from_secs(1)).unwrap();
        let widget = p.query_all("ytmc-views-card-v2").unwrap();
        assert_eq!(widget.len(), 1);
        assert_eq!(
            widget[0].text().unwrap(),
            "Total 99,999 24 sep. 2025 1,234 23 sep. 2025 5,678"
        );
    }

    #[test]
    fn attributes_and_missing_attributes() {
        let mut p = probe();
        p.navigate("https://charts.test/a", Duration::from_secs(1)).unwrap();
        let thumbs = p.query_all("img.thumbForInsightsPageSongEntity").unwrap();
        assert_eq!(thumbs[0].attribute("aria-label").unwrap().as_deref(), Some("Primera Cita"));
        assert_eq!(thumbs[1].attribute("aria-label").unwrap(), None);
    }

    #[test]
    fn absent_selector_times_out() {
        let mut p = probe();
        p.navigate("https://charts.test/a", Duration::from_secs(1)).unwrap();
        assert!(p.wait_for_selector(".viewscount", Duration::from_secs(1)).is_ok());
        assert!(matches!(
            p.wait_for_selector(".nope", Duration::from_secs(1)),
            Err(ProbeError::SelectorTimeout { .. })
        ));
    }

    #[test]
    fn invalid_selector_is_reported() {
        let mut p = probe();
        p.navigate("https://charts.test/a", Duration::from_secs(1)).unwrap();
        assert!(matches!(p.query_all("[[["), Err(ProbeError::InvalidSelector { .. })));
    }

    #[test]
    fn failed_navigation_drops_previous_page() {
        let mut p = probe();
        p.navigate("https://charts.test/a", Duration::from_secs(1)).unwrap();
        let err = p.navigate("https://charts.test/down", Duration::from_secs(1));
        assert!(matches!(err, Err(ProbeError::Navigation { .. })));
        assert!(matches!(p.query_all("div"), Err(ProbeError::NoPage)));
    }
}
