use chromiumoxide::error::CdpError;

/// Failures raised while driving the browser or reading the listing DOM.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("Browser unavailable: {0}")]
    BrowserUnavailable(String),

    #[error("Navigation timed out: {url}")]
    NavigationTimeout { url: String },

    #[error("No results found for selector '{selector}'")]
    NoResultsFound { selector: String },

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Browser protocol error: {0}")]
    Cdp(#[from] CdpError),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error("Not found: {0}")]
    NotFound(String),
}
