use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::serialize_timestamp;

/// Machine-readable format of the card's `data-value` date attribute.
pub const SITE_DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Posting date as read from a card. Unparseable values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostedDate {
    Parsed(NaiveDateTime),
    Raw(String),
}

impl PostedDate {
    pub fn parse(raw: &str) -> Self {
        match NaiveDateTime::parse_from_str(raw.trim(), SITE_DATE_FORMAT) {
            Ok(dt) => PostedDate::Parsed(dt),
            Err(_) => PostedDate::Raw(raw.to_string()),
        }
    }

    /// Calendar day of the posting, if the value could be parsed.
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            PostedDate::Parsed(dt) => Some(dt.date()),
            PostedDate::Raw(_) => None,
        }
    }

    fn parsed(&self) -> Option<NaiveDateTime> {
        match self {
            PostedDate::Parsed(dt) => Some(*dt),
            PostedDate::Raw(_) => None,
        }
    }

    fn raw(&self) -> Option<&str> {
        match self {
            PostedDate::Parsed(_) => None,
            PostedDate::Raw(raw) => Some(raw),
        }
    }
}

impl Serialize for PostedDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PostedDate::Parsed(dt) => serialize_timestamp(dt, serializer),
            PostedDate::Raw(raw) => serializer.serialize_str(raw),
        }
    }
}

/// One job card from the listing view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingSummary {
    pub url: String,
    pub location: String,
    pub posted_date: Option<PostedDate>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub collected_at: NaiveDateTime,
}

impl ListingSummary {
    /// True when the posting is dated strictly before `target`.
    pub fn is_older_than(&self, target: NaiveDate) -> bool {
        self.posted_date
            .as_ref()
            .and_then(PostedDate::date)
            .is_some_and(|date| date < target)
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ListingUrl {
    pub id: i32,
    pub url: String,
    pub location: Option<String>,
    pub posted_date: Option<NaiveDateTime>,
    pub posted_date_raw: Option<String>,
    pub collected_at: NaiveDateTime,
    pub processed: bool,
}

#[derive(Debug, Serialize)]
pub struct ProcessingStatus {
    pub total: i64,
    pub pending: i64,
    pub locations: Vec<(String, i64)>,
}

impl ListingUrl {
    /// Insert collected summaries, skipping URLs already stored.
    /// Returns how many rows were actually inserted.
    pub async fn save_all(pool: &PgPool, summaries: &[ListingSummary]) -> Result<u64, AppError> {
        let mut tx = pool.begin().await?;
        let mut inserted = 0;

        for summary in summaries {
            let posted = summary.posted_date.as_ref();
            let result = sqlx::query(
                "INSERT INTO listing_urls (url, location, posted_date, posted_date_raw, collected_at) VALUES ($1, $2, $3, $4, $5) ON CONFLICT (url) DO NOTHING",
            )
            .bind(&summary.url)
            .bind(&summary.location)
            .bind(posted.and_then(PostedDate::parsed))
            .bind(posted.and_then(PostedDate::raw))
            .bind(summary.collected_at)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// URLs not yet run through the detail pipeline, newest collection first.
    pub async fn pending_urls(pool: &PgPool, limit: Option<i64>) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query_as::<_, ListingUrl>(
            "SELECT * FROM listing_urls WHERE processed = FALSE ORDER BY collected_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|row| row.url).collect())
    }

    pub async fn mark_processed(pool: &PgPool, url: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE listing_urls SET processed = TRUE WHERE url = $1")
            .bind(url)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Listing URL {url} not found")));
        }
        Ok(())
    }

    pub async fn processing_status(pool: &PgPool) -> Result<ProcessingStatus, AppError> {
        let (total, pending): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE processed = FALSE) FROM listing_urls",
        )
        .fetch_one(pool)
        .await?;

        let locations: Vec<(Option<String>, i64)> = sqlx::query_as(
            "SELECT location, COUNT(*) FROM listing_urls GROUP BY location ORDER BY COUNT(*) DESC, location",
        )
        .fetch_all(pool)
        .await?;

        Ok(ProcessingStatus {
            total,
            pending,
            locations: locations
                .into_iter()
                .map(|(location, count)| (location.unwrap_or_default(), count))
                .collect(),
        })
    }
}
