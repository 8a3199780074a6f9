// Browser layer: session lifecycle plus the page operations the collectors need.

pub mod chrome;
pub mod session;

use async_trait::async_trait;

use crate::error::ScrapeError;

pub use chrome::ChromePage;
pub use session::{BrowserSession, BrowserSettings};

/// The page operations the navigator relies on.
///
/// Implemented by [`ChromePage`] for a real browser tab and by in-memory
/// fakes in tests. Every call reflects the live DOM at the time it is made.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for the network to go quiet.
    /// Returns `ScrapeError::NavigationTimeout` when the load budget is exceeded.
    async fn navigate(&self, url: &str) -> Result<(), ScrapeError>;

    /// Outer HTML of every element currently matching `selector`, in document order.
    async fn outer_html_all(&self, selector: &str) -> Result<Vec<String>, ScrapeError>;

    /// Number of elements currently matching `selector`.
    async fn count(&self, selector: &str) -> Result<usize, ScrapeError>;

    /// Scroll the last element matching `selector` into view.
    /// Does nothing when there is no match.
    async fn scroll_last_into_view(&self, selector: &str) -> Result<(), ScrapeError>;

    /// Full HTML of the current document.
    async fn content(&self) -> Result<String, ScrapeError>;
}
