//! The tracking daemon.
//!
//! One task owns the whole engine and handles one input at a time: host
//! events from stdin, the accrual tick, the idle poll, the sync timer and
//! Ctrl-C. Closing stdin or Ctrl-C performs a final accrual and one last
//! flush before exiting.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::{MissedTickBehavior, interval};

use wt_core::{HostEvent, Identity, Tracker, TrackerStatus};
use wt_db::Database;
use wt_sync::{Collector, HttpCollector, SyncManager, SyncState};

use crate::Config;
use crate::config::Timings;

/// Answer to a `query` host event, written as one JSON line.
#[derive(Debug, Serialize)]
struct QueryResponse<'a> {
    #[serde(flatten)]
    tracker: TrackerStatus,
    identity: Option<&'a Identity>,
    sync: SyncState,
}

/// Runs the daemon on stdin/stdout until the host hangs up.
pub async fn run(config: &Config, db: Database) -> Result<()> {
    let timings = config.timings();
    let collector = HttpCollector::new(&config.collector_url, timings.delivery_timeout)
        .context("invalid collector configuration")?;
    let mut daemon = Daemon::new(db, collector, timings)?;
    tracing::info!(collector = %config.collector_url, "daemon started");
    daemon
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
}

pub struct Daemon<C> {
    tracker: Tracker,
    sync: SyncManager<Database, C>,
    timings: Timings,
    /// Identity set by the host that the store refused. It stays in charge
    /// over the stored one until a save succeeds.
    unsaved_identity: Option<Identity>,
}

impl<C: Collector> Daemon<C> {
    pub fn new(db: Database, collector: C, timings: Timings) -> Result<Self> {
        let rules = db.rules().context("failed to load classification rules")?;
        let identity = db.identity().context("failed to load identity")?;
        let idle_threshold = chrono::Duration::from_std(timings.idle_threshold)
            .context("idle threshold out of range")?;

        Ok(Self {
            tracker: Tracker::new(rules, idle_threshold),
            sync: SyncManager::new(db, collector, identity)
                .with_delivery_timeout(timings.delivery_timeout),
            timings,
            unsaved_identity: None,
        })
    }

    /// Processes host events from `input` until EOF or Ctrl-C.
    pub async fn run<R, W>(&mut self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut tick = interval(self.timings.tick);
        let mut idle_poll = interval(self.timings.idle_poll);
        let mut sync = interval(self.timings.sync);
        for timer in [&mut tick, &mut idle_poll, &mut sync] {
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.handle_line(&line, Utc::now(), &mut output).await,
                    Ok(None) => {
                        tracing::info!("host closed input, shutting down");
                        break;
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "failed to read host input, shutting down");
                        break;
                    }
                },
                _ = tick.tick() => self.tracker.tick(Utc::now()),
                _ = idle_poll.tick() => self.poll(Utc::now()).await,
                _ = sync.tick() => self.flush(Utc::now()).await,
                result = &mut ctrl_c => {
                    if let Err(err) = result {
                        tracing::warn!(error = %err, "failed to listen for Ctrl-C");
                    }
                    tracing::info!("interrupted, shutting down");
                    break;
                }
            }
        }

        self.shutdown(Utc::now()).await;
        Ok(())
    }

    async fn handle_line<W: AsyncWrite + Unpin>(
        &mut self,
        line: &str,
        now: DateTime<Utc>,
        output: &mut W,
    ) {
        if line.trim().is_empty() {
            return;
        }
        let event = match HostEvent::parse_line(line) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed host event");
                return;
            }
        };
        tracing::debug!(?event, "host event");

        match event {
            HostEvent::FocusChanged { url } => self.tracker.focus_changed(url.as_deref(), now),
            HostEvent::IdleState { state } => {
                self.tracker.report_idle_state(state, now);
                self.tracker.poll_idle(now);
            }
            HostEvent::SetIdentity { identity } => {
                self.unsaved_identity = match self.sync.buffer().set_identity(&identity) {
                    Ok(()) => None,
                    Err(err) => {
                        tracing::warn!(
                            error = %err,
                            "failed to save identity, keeping it in memory"
                        );
                        Some(identity.clone())
                    }
                };
                self.sync
                    .set_identity(identity, self.tracker.accumulator_mut(), now)
                    .await;
            }
            HostEvent::SetRules { rules } => {
                if let Err(err) = self.sync.buffer().set_rules(&rules) {
                    tracing::warn!(error = %err, "failed to save rules");
                }
                self.tracker.set_rules(rules);
            }
            HostEvent::Query => {
                if let Err(err) = self.answer_query(output).await {
                    tracing::warn!(error = %err, "failed to write status");
                }
            }
        }
    }

    async fn answer_query<W: AsyncWrite + Unpin>(&self, output: &mut W) -> Result<()> {
        let response = QueryResponse {
            tracker: self.tracker.status(),
            identity: self.sync.identity(),
            sync: self.sync.state(),
        };
        let mut line = serde_json::to_vec(&response)?;
        line.push(b'\n');
        output.write_all(&line).await?;
        output.flush().await?;
        Ok(())
    }

    /// Idle poll. Also picks up settings changed by other `wt` commands.
    async fn poll(&mut self, now: DateTime<Utc>) {
        match self.sync.buffer().rules() {
            Ok(rules) => self.tracker.set_rules(rules),
            Err(err) => tracing::warn!(error = %err, "failed to reload rules"),
        }
        if self.save_pending_identity() {
            match self.sync.buffer().identity() {
                Ok(Some(identity)) => {
                    self.sync
                        .set_identity(identity, self.tracker.accumulator_mut(), now)
                        .await;
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(error = %err, "failed to reload identity"),
            }
        }
        self.tracker.poll_idle(now);
    }

    /// Retries saving an identity the store refused earlier.
    ///
    /// Returns `false` while the stored identity is stale.
    fn save_pending_identity(&mut self) -> bool {
        let Some(identity) = &self.unsaved_identity else {
            return true;
        };
        match self.sync.buffer().set_identity(identity) {
            Ok(()) => {
                tracing::info!(%identity, "saved pending identity");
                self.unsaved_identity = None;
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "still unable to save identity");
                false
            }
        }
    }

    async fn flush(&mut self, now: DateTime<Utc>) {
        let outcome = self.sync.flush(self.tracker.accumulator_mut(), now).await;
        tracing::debug!(?outcome, state = %self.sync.state(), "sync tick");
    }

    async fn shutdown(&mut self, now: DateTime<Utc>) {
        self.tracker.finish(now);
        self.flush(now).await;
    }
}
