use failure::{Error, ResultExt};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const DEFAULT_ANALYZE_URL: &str = "https://student-helmet-detector.onrender.com/analyze";
const DEFAULT_FEED: &str = "public/violations.csv";

/// Where the startup CSV comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedSource {
    File(PathBuf),
    Http(Url),
}

impl FeedSource {
    pub fn parse(s: &str) -> FeedSource {
        match Url::parse(s) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => FeedSource::Http(url),
            _ => FeedSource::File(PathBuf::from(s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub analyze_url: Url,
    pub analyze_timeout: Option<Duration>,
    pub default_feed: FeedSource,
    pub queue_depth: usize,
    pub max_upload_bytes: u64,
}

impl Config {
    pub fn from_env() -> Result<Config, Error> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let analyze_url = lookup("ANALYZE_URL").unwrap_or_else(|| DEFAULT_ANALYZE_URL.to_string());
        let analyze_timeout = match lookup("ANALYZE_TIMEOUT_SECS") {
            Some(s) => {
                let secs = s
                    .parse::<u64>()
                    .context("ANALYZE_TIMEOUT_SECS must be a number of seconds")?;
                if secs == 0 {
                    return Err(format_err!("ANALYZE_TIMEOUT_SECS must be at least 1"));
                }
                Some(Duration::from_secs(secs))
            }
            None => None,
        };
        let queue_depth: usize = number(&lookup, "UPLOAD_QUEUE_DEPTH", 8)?;
        if queue_depth == 0 {
            return Err(format_err!("UPLOAD_QUEUE_DEPTH must be at least 1"));
        }
        let max_upload_mb: u64 = number(&lookup, "MAX_UPLOAD_MB", 200)?;
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| format_err!("MAX_UPLOAD_MB {} is too large", max_upload_mb))?;
        Ok(Config {
            port: number(&lookup, "PORT", 8402)?,
            analyze_url: Url::parse(&analyze_url)
                .with_context(|_| format!("Invalid ANALYZE_URL {}", analyze_url))?,
            analyze_timeout,
            default_feed: FeedSource::parse(
                &lookup("DEFAULT_CSV").unwrap_or_else(|| DEFAULT_FEED.to_string()),
            ),
            queue_depth,
            max_upload_bytes,
        })
    }
}

fn number<F, T>(lookup: &F, key: &str, default: T) -> Result<T, Error>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(s) => s
            .parse()
            .map_err(|_| format_err!("{} must be a number, got {:?}", key, s)),
        None => Ok(default),
    }
}
