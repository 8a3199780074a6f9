use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::PgPool;

use crate::error::AppError;

const UNSPECIFIED: &str = "Não informado";
const CONFIDENTIAL_COMPANY: &str = "EMPRESA CONFIDENCIAL";
const NEGOTIABLE_SALARY: &str = "Salário até combinar";
const MESSAGE_SEPARATOR: &str = "➖➖➖➖➖➖➖➖";

/// Full job fields read from a detail page. Only `url` is guaranteed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobDetail {
    pub url: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub description: Option<String>,
}

impl JobDetail {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Job {
    pub id: i32,
    pub url: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub description: Option<String>,
    pub collected_at: NaiveDateTime,
}

impl Job {
    /// Insert or refresh the job stored for `detail.url`.
    /// The flag is true when a new row was created.
    pub async fn upsert(pool: &PgPool, detail: &JobDetail) -> Result<(Job, bool), AppError> {
        let (inserted,): (bool,) = sqlx::query_as(
            "INSERT INTO jobs (url, title, company, location, salary, description) VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (url) DO UPDATE SET
                 title = EXCLUDED.title,
                 company = EXCLUDED.company,
                 location = EXCLUDED.location,
                 salary = EXCLUDED.salary,
                 description = EXCLUDED.description,
                 collected_at = NOW()
             RETURNING (xmax = 0)",
        )
        .bind(&detail.url)
        .bind(&detail.title)
        .bind(&detail.company)
        .bind(&detail.location)
        .bind(&detail.salary)
        .bind(&detail.description)
        .fetch_one(pool)
        .await?;

        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE url = $1")
            .bind(&detail.url)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", detail.url)))?;

        Ok((job, inserted))
    }

    /// Jobs whose listing URL has been processed, newest first.
    pub async fn processed(pool: &PgPool, limit: Option<i64>) -> Result<Vec<Job>, AppError> {
        let jobs = sqlx::query_as::<_, Job>(
            "SELECT j.* FROM jobs j
             INNER JOIN listing_urls u ON u.url = j.url
             WHERE u.processed = TRUE
             ORDER BY j.collected_at DESC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(jobs)
    }

    /// Render the job as a chat message block. Text markers follow
    /// WhatsApp formatting.
    pub fn format_message(&self) -> String {
        let title = non_blank(&self.title).unwrap_or(UNSPECIFIED).to_uppercase();
        let company = non_blank(&self.company).unwrap_or(CONFIDENTIAL_COMPANY);
        let location = non_blank(&self.location).unwrap_or(UNSPECIFIED);
        let salary = match non_blank(&self.salary) {
            Some(salary)
                if !matches!(salary.to_lowercase().as_str(), "a combinar" | "não informado") =>
            {
                salary
            }
            _ => NEGOTIABLE_SALARY,
        };

        format!(
            "📌 {title}\n\n\
             - Empresa: {company}\n\
             - Local: {location}\n\
             - Salário: {salary}\n\n\
             - Link da vaga: {url}\n\n\
             {MESSAGE_SEPARATOR}\n",
            url = self.url
        )
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
