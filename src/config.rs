use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{ArgAction, Parser};

use crate::browser::BrowserSettings;
use crate::collectors::{CollectConfig, DriveMode};

#[derive(Parser, Debug, Clone)]
#[command(name = "zipvagas", about = "Job listing collector")]
pub struct Config {
    /// Database connection URL. Without it, `collect` prints JSON lines.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Run database migrations on startup
    #[arg(long, env = "RUN_MIGRATIONS", action = ArgAction::Set, default_value_t = true)]
    pub run_migrations: bool,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headed: bool,

    /// Chrome/Chromium executable to launch instead of the detected one
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Collect listing URLs from a listing page
    Collect {
        /// Listing URL to start from
        base_url: String,

        /// Stop once postings older than this date (YYYY-MM-DD) appear
        #[arg(long)]
        target_date: Option<NaiveDate>,

        #[arg(long, value_enum, default_value_t = DriveMode::Scroll)]
        mode: DriveMode,

        /// Hard ceiling on pages visited in paginate mode
        #[arg(long, default_value_t = 500)]
        max_pages: u32,

        /// Consecutive cycles without new cards before giving up
        #[arg(long, default_value_t = 10)]
        max_stagnant_attempts: u32,
    },
    /// Fetch details for collected URLs not processed yet
    Process {
        /// Seconds to wait between detail pages
        #[arg(long, default_value_t = 1)]
        delay: u64,

        /// Maximum number of URLs to process
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Print processed jobs as chat message blocks, newest first
    Messages {
        /// Maximum number of jobs to render
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Show collection and processing counts
    Status,
}

impl Config {
    pub fn browser_settings(&self) -> BrowserSettings {
        BrowserSettings {
            headless: !self.headed,
            chrome_path: self.chrome_path.clone(),
            ..Default::default()
        }
    }
}

impl Command {
    /// Engine configuration for a `collect` invocation.
    pub fn collect_config(&self) -> Option<CollectConfig> {
        let Command::Collect {
            base_url,
            target_date,
            mode,
            max_pages,
            max_stagnant_attempts,
        } = self
        else {
            return None;
        };

        Some(CollectConfig {
            target_date: *target_date,
            max_pages: *max_pages,
            max_stagnant_attempts: *max_stagnant_attempts,
            ..CollectConfig::new(base_url.clone(), *mode)
        })
    }

    pub fn delay(&self) -> Duration {
        match self {
            Command::Process { delay, .. } => Duration::from_secs(*delay),
            _ => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_collect_with_defaults() {
        let config = Config::try_parse_from([
            "zipvagas",
            "collect",
            "https://www.infojobs.com.br/empregos.aspx",
            "--target-date",
            "2024-01-05",
        ])
        .unwrap();

        let collect = config.command.collect_config().unwrap();
        assert_eq!(collect.base_url, "https://www.infojobs.com.br/empregos.aspx");
        assert_eq!(collect.target_date, NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(collect.mode, DriveMode::Scroll);
        assert_eq!(collect.max_pages, 500);
        assert_eq!(collect.max_stagnant_attempts, 10);
        assert_eq!(collect.growth_poll_ticks, 10);
        assert_eq!(collect.growth_poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn parses_paginate_overrides() {
        let config = Config::try_parse_from([
            "zipvagas",
            "--headed",
            "collect",
            "https://site.test/vagas?q=rust",
            "--mode",
            "paginate",
            "--max-pages",
            "20",
            "--max-stagnant-attempts",
            "3",
        ])
        .unwrap();

        let collect = config.command.collect_config().unwrap();
        assert_eq!(collect.mode, DriveMode::Paginate);
        assert_eq!(collect.max_pages, 20);
        assert_eq!(collect.max_stagnant_attempts, 3);
        assert_eq!(collect.target_date, None);
        assert!(!config.browser_settings().headless);
    }

    #[test]
    fn rejects_malformed_target_date() {
        let result = Config::try_parse_from([
            "zipvagas",
            "collect",
            "https://site.test/vagas",
            "--target-date",
            "05/01/2024",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn parses_process_options() {
        let config =
            Config::try_parse_from(["zipvagas", "process", "--delay", "3", "--limit", "25"]).unwrap();

        assert!(config.command.collect_config().is_none());
        assert_eq!(config.command.delay(), Duration::from_secs(3));
        assert!(matches!(config.command, Command::Process { limit: Some(25), .. }));
    }

    #[test]
    fn parses_messages_limit() {
        let config = Config::try_parse_from(["zipvagas", "messages", "--limit", "10"]).unwrap();
        assert!(matches!(config.command, Command::Messages { limit: Some(10) }));

        let config = Config::try_parse_from(["zipvagas", "messages"]).unwrap();
        assert!(matches!(config.command, Command::Messages { limit: None }));
    }
}
