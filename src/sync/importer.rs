use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use sqlx::Connection;
use std::{path::PathBuf, time::Duration};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::catalog::Catalog;
use super::catalogs::LandsatScenes;
use super::engine::IngestEngine;
use super::mailbox::{status_mailbox, ControlMailbox, ControlMessage, StatusHandle, StatusMailbox};
use super::source::{LocationSource, StreamSource};
use super::stats::{RunStatistics, TIME_FORMAT};
use crate::db::ConnectionProvider;

const NO_PREVIOUS_RUN: &str = "\tNone";

/// Owns the ingest schedule for one catalogue.
///
/// The scheduler and the runs it starts share a single task: while a run is
/// going the scheduler loop is parked, and the run itself services the
/// control and status mailboxes between records. At most one run is ever
/// active.
pub struct Importer {
    source: Box<dyn StreamSource>,
    connections: Box<dyn ConnectionProvider>,
    engine: IngestEngine,
    status: StatusHandle,
    status_requests: StatusMailbox,
    previous_run: String,
}

impl Importer {
    pub fn new(
        source: impl StreamSource + 'static,
        connections: impl ConnectionProvider + 'static,
        catalog: impl Catalog + 'static,
    ) -> Self {
        let (status, status_requests) = status_mailbox();
        Importer {
            source: Box::new(source),
            connections: Box::new(connections),
            engine: IngestEngine::new(catalog),
            status,
            status_requests,
            previous_run: NO_PREVIOUS_RUN.to_string(),
        }
    }

    /// Importer for the Landsat scene list at `location`.
    pub fn for_location(
        location: &str,
        gzip: bool,
        cache_dir: PathBuf,
        connections: impl ConnectionProvider + 'static,
    ) -> Self {
        Importer::new(
            LocationSource::new(location, gzip, cache_dir),
            connections,
            LandsatScenes,
        )
    }

    pub fn status_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Runs the job loop until the control mailbox is closed.
    ///
    /// A run starts when `cadence` has passed since the previous run
    /// finished, or when a begin token arrives. Status requests that arrive
    /// while idle are answered with the next scheduled start and the summary
    /// of the previous run. Once this returns, outstanding and future status
    /// requests fail with [`IngestError::Stopped`](super::IngestError::Stopped).
    pub async fn schedule(mut self, mut control: ControlMailbox, cadence: Duration) {
        info!("Job loop started with cadence {:?}", cadence);

        let timer = sleep(cadence);
        tokio::pin!(timer);
        let mut next_start = scheduled_at(cadence);

        loop {
            let start_job = tokio::select! {
                _ = &mut timer => {
                    info!("Maximum time between jobs elapsed");
                    true
                }
                message = control.recv() => match message {
                    None => {
                        info!("Control mailbox closed, stopping job loop");
                        break;
                    }
                    Some(ControlMessage::BeginJob) => {
                        info!("Operator requested job start");
                        true
                    }
                    Some(ControlMessage::AbortJob) => {
                        debug!("No job in progress, ignoring abort");
                        false
                    }
                    Some(ControlMessage::Unrecognized(token)) => {
                        debug!(token = %token, "Ignoring unrecognized control token");
                        false
                    }
                },
                Some(reply) = self.status_requests.recv() => {
                    let _ = reply.send(sleeping_report(next_start, &self.previous_run));
                    false
                }
            };

            if start_job {
                info!("Starting job");
                self.previous_run = match self.import(&mut control).await {
                    Ok(stats) => stats.to_string(),
                    Err(e) => {
                        error!("Ingest job failed to start: {:#}", e);
                        format!("\tFailed: {:#}", e)
                    }
                };

                // cadence counts from the end of the run
                timer.as_mut().reset(Instant::now() + cadence);
                next_start = scheduled_at(cadence);
            }
        }
    }

    /// Performs one run: opens the stream and a connection, ingests, and
    /// closes the connection again.
    pub async fn import(&mut self, control: &mut ControlMailbox) -> Result<RunStatistics> {
        let span = info_span!("ingest", location = self.source.location());

        let stream = self
            .source
            .open()
            .instrument(span.clone())
            .await
            .context("Could not open the source file/url")?;
        let mut conn = self.connections.connect(&span).await?;

        let result = self
            .engine
            .run(stream, &mut conn, control, &mut self.status_requests)
            .instrument(span.clone())
            .await;

        if let Err(e) = conn.close().await {
            span.in_scope(|| warn!("Error closing database connection: {}", e));
        }
        result
    }
}

fn scheduled_at(cadence: Duration) -> DateTime<Local> {
    let now = Local::now();
    chrono::Duration::from_std(cadence)
        .ok()
        .and_then(|cadence| now.checked_add_signed(cadence))
        .unwrap_or(now)
}

fn sleeping_report(next_start: DateTime<Local>, previous_run: &str) -> String {
    format!(
        "{}\nStatus: Sleeping until {}\nPrevious job:\n{}",
        Local::now().format(TIME_FORMAT),
        next_start.format(TIME_FORMAT),
        previous_run
    )
}
