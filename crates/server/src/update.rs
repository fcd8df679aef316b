//! Asynchronous "is there a newer version?" check for admins logging in.
//!
//! The check runs as a spawned tokio task bounded by a timeout. Its outcome
//! goes onto a channel that the tick loop drains with [`UpdateChecker::deliver`],
//! so player-facing messages are only ever produced on the tick. Failures are
//! logged and reported to the player; they never reach the tick as errors.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use crate::outbox::Outbox;
use crate::player::PlayerId;

pub type VersionFuture = Pin<Box<dyn Future<Output = Result<String>> + Send>>;

/// Where the latest released version string comes from.
pub trait VersionSource: Send + Sync + 'static {
    fn latest_version(&self) -> VersionFuture;
}

/// Plain-text version string served over HTTP(S).
pub struct HttpVersionSource {
    client: reqwest::Client,
    url: String,
}

impl HttpVersionSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

impl VersionSource for HttpVersionSource {
    fn latest_version(&self) -> VersionFuture {
        let client = self.client.clone();
        let url = self.url.clone();
        Box::pin(async move {
            let body = client
                .get(&url)
                .send()
                .await
                .with_context(|| format!("requesting {}", url))?
                .error_for_status()
                .with_context(|| format!("requesting {}", url))?
                .text()
                .await
                .context("reading version response")?;
            Ok(body.trim().to_string())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate,
    Available { current: String, latest: String },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateNotice {
    pub player: PlayerId,
    pub outcome: UpdateOutcome,
}

pub struct UpdateChecker {
    source: Arc<dyn VersionSource>,
    current: String,
    timeout: Duration,
    tx: mpsc::UnboundedSender<UpdateNotice>,
    rx: mpsc::UnboundedReceiver<UpdateNotice>,
}

impl UpdateChecker {
    pub fn new(source: Arc<dyn VersionSource>, current: impl Into<String>, timeout: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            source,
            current: current.into(),
            timeout,
            tx,
            rx,
        }
    }

    /// Start a check on behalf of `player`. Returns false when there is no
    /// tokio runtime to run it on.
    pub fn spawn_check(&self, player: PlayerId) -> bool {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime, skipping update check");
            return false;
        };
        let source = Arc::clone(&self.source);
        let current = self.current.clone();
        let timeout = self.timeout;
        let tx = self.tx.clone();

        handle.spawn(async move {
            let outcome = match tokio::time::timeout(timeout, source.latest_version()).await {
                Ok(Ok(latest)) if is_newer(&latest, &current) => {
                    UpdateOutcome::Available { current, latest }
                }
                Ok(Ok(_)) => UpdateOutcome::UpToDate,
                Ok(Err(e)) => UpdateOutcome::Failed(format!("{:#}", e)),
                Err(_) => UpdateOutcome::Failed(format!("no answer within {:?}", timeout)),
            };
            let _ = tx.send(UpdateNotice { player, outcome });
        });
        true
    }

    /// Outcomes that have arrived so far, without waiting.
    pub fn poll(&mut self) -> Vec<UpdateNotice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.rx.try_recv() {
            notices.push(notice);
        }
        notices
    }

    /// Wait for the next outcome.
    pub async fn next_notice(&mut self) -> Option<UpdateNotice> {
        self.rx.recv().await
    }

    /// Turn arrived outcomes into chat lines. Returns how many were handled.
    pub fn deliver(&mut self, outbox: &Outbox) -> usize {
        let notices = self.poll();
        for notice in &notices {
            match &notice.outcome {
                UpdateOutcome::UpToDate => {
                    tracing::debug!("Update check for {}: up to date", notice.player);
                }
                UpdateOutcome::Available { current, latest } => {
                    outbox.tell(
                        notice.player,
                        format!("A new version is available: {} (running {}).", latest, current),
                    );
                }
                UpdateOutcome::Failed(reason) => {
                    tracing::warn!("Update check failed: {}", reason);
                    outbox.tell(notice.player, "could not get version update - see log");
                }
            }
        }
        notices.len()
    }
}

/// Dotted numeric comparison: `1.10` is newer than `1.9`, missing parts are 0,
/// a leading `v` and trailing non-digits in a part are ignored.
pub fn is_newer(latest: &str, current: &str) -> bool {
    fn parts(version: &str) -> Vec<u64> {
        version
            .trim()
            .trim_start_matches('v')
            .split('.')
            .map(|p| {
                let digits: String = p.chars().take_while(char::is_ascii_digit).collect();
                digits.parse().unwrap_or(0)
            })
            .collect()
    }

    let (latest, current) = (parts(latest), parts(current));
    for i in 0..latest.len().max(current.len()) {
        let a = latest.get(i).copied().unwrap_or(0);
        let b = current.get(i).copied().unwrap_or(0);
        if a != b {
            return a > b;
        }
    }
    false
}
