pub mod document;
pub mod render;

use std::time::Duration;

use thiserror::Error;

pub use document::DocumentProbe;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("navigation to {url:?} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("selector {selector:?} not present after {timeout:?}")]
    SelectorTimeout { selector: String, timeout: Duration },
    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("no page loaded")]
    NoPage,
}

/// One element returned by [`PageProbe::query_all`].
pub trait ElementHandle {
    fn text(&self) -> Result<String, ProbeError>;
    fn attribute(&self, name: &str) -> Result<Option<String>, ProbeError>;
}

/// Rendering/navigation session the extractors read pages through.
///
/// All timeouts are upper bounds. Implementations must return once the bound
/// expires rather than block indefinitely.
pub trait PageProbe {
    type Element: ElementHandle;

    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), ProbeError>;

    /// Best-effort; callers treat an error here as "not settled yet".
    fn wait_for_network_idle(&mut self, timeout: Duration) -> Result<(), ProbeError>;

    fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<(), ProbeError>;

    /// Matching elements in document order.
    fn query_all(&self, selector: &str) -> Result<Vec<Self::Element>, ProbeError>;
}
