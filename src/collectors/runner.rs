use std::io::Write;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::watch;

use crate::browser::{BrowserSession, BrowserSettings, ChromePage};
use crate::collectors::{
    CardExtractor, CollectConfig, CollectionOutcome, DetailFetcher, IncrementalCollector,
    Navigator, NavigatorSettings, SiteSelectors,
};
use crate::models::job::Job;
use crate::models::listing::{ListingSummary, ListingUrl};

/// Collect listing summaries and persist them, or print them as JSON lines
/// when no database is configured. Any completed run is a success,
/// whatever stopped it.
pub async fn collect(
    pool: Option<&PgPool>,
    browser: &BrowserSettings,
    config: CollectConfig,
) -> anyhow::Result<()> {
    let selectors = SiteSelectors::default();
    let extractor = CardExtractor::new(&selectors)?;
    let target_date = config.target_date;

    let session = BrowserSession::acquire(browser).await?;
    let outcome = match session.new_page().await {
        Ok(page) => {
            let navigator = Navigator::new(page, selectors.card.clone(), NavigatorSettings::default());
            let outcome = run_collection(&navigator, &extractor, config).await;
            navigator.into_page().close().await;
            Ok(outcome)
        }
        Err(e) => Err(e),
    };
    session.release().await;
    let outcome = outcome?;
    if target_date.is_some() && !outcome.reached_target_date() {
        tracing::warn!("Target date not reached, listings may be incomplete");
    }

    tracing::debug!("Visited {} page(s)", outcome.pages_visited);

    store_summaries(pool, &outcome.summaries, &mut std::io::stdout()).await
}

/// Save a finished run's summaries. Without a database, or when saving
/// fails, they are written to `out` as JSON lines instead.
async fn store_summaries(
    pool: Option<&PgPool>,
    summaries: &[ListingSummary],
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let Some(pool) = pool else {
        return write_json_lines(out, summaries);
    };

    if summaries.is_empty() {
        tracing::warn!("No listings found");
        return Ok(());
    }

    match ListingUrl::save_all(pool, summaries).await {
        Ok(inserted) => {
            tracing::info!(
                "Saved {inserted} new listings ({} already stored)",
                summaries.len() as u64 - inserted
            );
            report_status(pool).await;
            Ok(())
        }
        Err(e) => {
            tracing::error!("Failed to save {} listings, writing them to stdout: {e}", summaries.len());
            write_json_lines(out, summaries)
        }
    }
}

fn write_json_lines(out: &mut impl Write, summaries: &[ListingSummary]) -> anyhow::Result<()> {
    for summary in summaries {
        writeln!(out, "{}", serde_json::to_string(summary)?)?;
    }
    out.flush()?;
    Ok(())
}

async fn run_collection(
    navigator: &Navigator<ChromePage>,
    extractor: &CardExtractor,
    config: CollectConfig,
) -> CollectionOutcome {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received, finishing current cycle");
            let _ = cancel_tx.send(true);
        }
    });

    let outcome = IncrementalCollector::new(navigator, extractor, config)
        .with_cancellation(cancel_rx)
        .collect()
        .await;

    signal.abort();
    outcome
}

#[derive(Debug, Default)]
struct ProcessCounts {
    saved: usize,
    inserted: usize,
    skipped: usize,
}

/// Drain pending listing URLs through the detail fetcher.
pub async fn process(
    pool: &PgPool,
    browser: &BrowserSettings,
    delay: Duration,
    limit: Option<i64>,
) -> anyhow::Result<()> {
    let urls = ListingUrl::pending_urls(pool, limit).await?;
    if urls.is_empty() {
        tracing::info!("No pending URLs to process");
        return Ok(());
    }
    tracing::info!("Processing {} pending URLs", urls.len());

    let selectors = SiteSelectors::default();
    let fetcher = DetailFetcher::new(&selectors)?;
    let mut counts = ProcessCounts::default();

    let session = BrowserSession::acquire(browser).await?;
    let result = match session.new_page().await {
        Ok(page) => {
            let navigator = Navigator::new(page, selectors.card.clone(), NavigatorSettings::default());
            tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received, stopping");
                }
                _ = process_urls(pool, &fetcher, &navigator, &urls, delay, &mut counts) => {}
            }
            navigator.into_page().close().await;
            Ok(())
        }
        Err(e) => Err(e),
    };
    session.release().await;
    result?;

    tracing::info!(
        "Processed {} jobs ({} new), {} without data",
        counts.saved,
        counts.inserted,
        counts.skipped
    );
    report_status(pool).await;
    Ok(())
}

async fn process_urls(
    pool: &PgPool,
    fetcher: &DetailFetcher,
    navigator: &Navigator<ChromePage>,
    urls: &[String],
    delay: Duration,
    counts: &mut ProcessCounts,
) {
    let total = urls.len();

    for (i, url) in urls.iter().enumerate() {
        tracing::info!("Processing {}/{total}: {url}", i + 1);

        match fetcher.fetch(navigator, url).await {
            Some(detail) => match Job::upsert(pool, &detail).await {
                Ok((job, was_inserted)) => {
                    if let Err(e) = ListingUrl::mark_processed(pool, url).await {
                        tracing::warn!("Failed to mark {url} processed: {e}");
                    }
                    tracing::info!(
                        "Saved job {}: {}",
                        job.id,
                        job.title.as_deref().unwrap_or("untitled")
                    );
                    counts.saved += 1;
                    if was_inserted {
                        counts.inserted += 1;
                    }
                }
                Err(e) => tracing::warn!("Failed to save job {url}: {e}"),
            },
            None => {
                tracing::warn!("No data found for {url}");
                counts.skipped += 1;
            }
        }

        if i + 1 < total {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Print processed jobs as message blocks, newest first.
pub async fn messages(pool: &PgPool, limit: Option<i64>, out: &mut impl Write) -> anyhow::Result<()> {
    let jobs = Job::processed(pool, limit).await?;
    if jobs.is_empty() {
        tracing::warn!("No processed jobs found, run `process` first");
        return Ok(());
    }

    let text = jobs
        .iter()
        .map(Job::format_message)
        .collect::<Vec<_>>()
        .join("\n\n");
    write!(out, "{text}")?;
    out.flush()?;

    tracing::info!("Rendered {} job messages", jobs.len());
    Ok(())
}

/// [`log_status`] for the tail of a finished command: errors are logged, not returned.
async fn report_status(pool: &PgPool) {
    if let Err(e) = log_status(pool).await {
        tracing::error!("Failed to read processing status: {e}");
    }
}

/// Log total and pending counts plus the per-location breakdown.
pub async fn log_status(pool: &PgPool) -> anyhow::Result<()> {
    let status = ListingUrl::processing_status(pool).await?;
    tracing::info!("Listings: {} total, {} pending", status.total, status.pending);
    for (location, count) in &status.locations {
        tracing::info!("  {location}: {count}");
    }
    Ok(())
}
