//! The query boundary: one search in, raw page content or a definite
//! failure out. Everything behind `submit_query` (the site, its consent
//! dialog, its anti-bot posture) is outside the core's concern; the runner
//! only reacts to the three outcomes.

use std::ops::RangeInclusive;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use reqwest::StatusCode;
use tracing::debug;

use crate::tasks::Task;

const SEARCH_URL: &str = "https://www.zabasearch.com/search";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of one submitted query.
pub enum QueryOutcome {
    /// Raw results page, to be validated and extracted.
    Content(String),
    /// The site definitively has nothing for this name; blacklist it.
    NotFound,
    /// The query did not complete this time; the task stays retryable.
    Transient(String),
}

#[allow(async_fn_in_trait)]
pub trait QueryExecutor {
    async fn submit_query(&mut self, task: &Task) -> Result<QueryOutcome>;
}

/// Sleep a random interval within the bounds, to imitate human pacing.
pub async fn human_delay(range_ms: RangeInclusive<u64>) {
    let ms = rand::thread_rng().gen_range(range_ms);
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// HTTP-backed executor. A fresh instance is created per task, mirroring the
/// one-session-per-search discipline, with a randomized browser UA.
pub struct HttpExecutor {
    client: reqwest::Client,
    base_url: String,
}

impl HttpExecutor {
    pub fn new() -> Result<HttpExecutor> {
        HttpExecutor::with_base_url(SEARCH_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<HttpExecutor> {
        let chrome = rand::thread_rng().gen_range(100..=115);
        let ua = format!(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/{}.0.0.0 Safari/537.36",
            chrome
        );
        let client = reqwest::Client::builder()
            .user_agent(ua)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(HttpExecutor {
            client,
            base_url: base_url.to_string(),
        })
    }
}

fn build_query(task: &Task) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("fname", task.first_name.clone()),
        ("lname", task.last_name.clone()),
    ];
    if !task.city.is_empty() {
        query.push(("city", task.city.clone()));
    }
    if !task.state.is_empty() {
        query.push(("state", task.state.clone()));
    }
    query
}

impl QueryExecutor for HttpExecutor {
    async fn submit_query(&mut self, task: &Task) -> Result<QueryOutcome> {
        human_delay(500..=2500).await;
        debug!("querying {}", task.full_name());

        let response = self
            .client
            .get(&self.base_url)
            .query(&build_query(task))
            .send()
            .await;

        // Timeouts and transport errors are soft: the task stays retryable.
        match response {
            Ok(r) if r.status() == StatusCode::NOT_FOUND => Ok(QueryOutcome::NotFound),
            Ok(r) if r.status().is_success() => Ok(QueryOutcome::Content(r.text().await?)),
            Ok(r) => Ok(QueryOutcome::Transient(format!("status {}", r.status()))),
            Err(e) => Ok(QueryOutcome::Transient(e.to_string())),
        }
    }
}
