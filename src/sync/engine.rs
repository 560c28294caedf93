use anyhow::{Context, Result};
use csv_async::{AsyncReaderBuilder, StringRecord};
use sqlx::sqlite::{SqliteConnection, SqliteStatement};
use sqlx::{Executor, Statement};
use std::time::{Duration, Instant};
use tokio::io::AsyncRead;
use tracing::{debug, error, info, warn};

use super::catalog::{Catalog, RowConverter};
use super::columns::{ColumnResolver, ValueMap};
use super::mailbox::{answer_status, drain_control, ControlMailbox, StatusMailbox};
use super::stats::RunStatistics;
use super::IngestError;

static PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Streams one catalogue into its table, one upsert per record.
pub struct IngestEngine {
    catalog: Box<dyn Catalog>,
}

impl IngestEngine {
    pub fn new(catalog: impl Catalog + 'static) -> Self {
        IngestEngine {
            catalog: Box::new(catalog),
        }
    }

    /// Runs a whole ingest pass over `stream`.
    ///
    /// A missing header, an unresolvable column or a statement that fails to
    /// prepare abort the run before any row is read. Bad records are counted
    /// and skipped. Between records the control mailbox is checked for an
    /// abort and pending status requests are answered; an abort ends the
    /// run early but still returns its statistics.
    pub async fn run<R>(
        &self,
        stream: R,
        conn: &mut SqliteConnection,
        control: &mut ControlMailbox,
        status: &mut StatusMailbox,
    ) -> Result<RunStatistics>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut reader = AsyncReaderBuilder::new().create_reader(stream);
        let headers = reader
            .headers()
            .await
            .context("Error reading header line")?
            .clone();
        if headers.is_empty() {
            return Err(IngestError::MissingHeader.into());
        }

        let columns = ColumnResolver::build(self.catalog.required_columns(), &headers)?;
        let statement = (&mut *conn)
            .prepare(self.catalog.upsert_statement())
            .await
            .context("Prepare statement failed")?;
        let converters = self.catalog.converters();

        info!("Ingesting {}", self.catalog.name());

        let mut values = columns.create_value_map();
        let mut record = StringRecord::new();
        let mut stats = RunStatistics::start_now();
        let mut last_progress_log = Instant::now();

        loop {
            if drain_control(control) {
                info!("Ingest job cancelled by operator");
                stats.cancelled_by_operator = true;
                break;
            }

            answer_status(status, || stats.in_progress_report());

            if last_progress_log.elapsed() > PROGRESS_LOG_INTERVAL {
                info!(
                    added = stats.added_or_updated,
                    skipped = stats.skipped,
                    errors = stats.errors,
                    "Ingest progress"
                );
                last_progress_log = Instant::now();
            }

            match reader.read_record(&mut record).await {
                Ok(true) => {
                    columns.populate(&record, &mut values);
                    match execute_upsert(&statement, conn, &values, converters).await {
                        Ok(rows_affected) => stats.record_upsert(rows_affected),
                        Err(e) => {
                            stats.record_error();
                            warn!(row = ?record, "Error upserting scene: {:#}", e);
                        }
                    }
                }
                Ok(false) => break,
                Err(e) if matches!(e.kind(), csv_async::ErrorKind::Io(_)) => {
                    // the stream itself is broken, nothing further can be read
                    stats.record_error();
                    error!("Error reading catalogue stream: {}", e);
                    break;
                }
                Err(e) => {
                    stats.record_error();
                    warn!("Error reading csv record: {}", e);
                }
            }
        }

        answer_status(status, || stats.finishing_report());
        self.maintain(conn).await;

        stats.finish();
        info!("Ingest complete:\n{}", stats);
        info!("Ingest took {}", stats.elapsed());
        Ok(stats)
    }

    /// Post-ingest housekeeping. Failures are logged and leave the ingested
    /// rows in place.
    async fn maintain(&self, conn: &mut SqliteConnection) {
        info!("Starting database maintenance");
        let start = Instant::now();
        match (&mut *conn)
            .execute(self.catalog.maintenance_statement())
            .await
        {
            Ok(_) => info!("Database maintenance complete in {:?}", start.elapsed()),
            Err(e) => error!("Error during database maintenance: {}", e),
        }
    }
}

async fn execute_upsert(
    statement: &SqliteStatement<'_>,
    conn: &mut SqliteConnection,
    values: &ValueMap,
    converters: &[RowConverter],
) -> Result<u64> {
    let mut query = statement.query();
    for (idx, convert) in converters.iter().enumerate() {
        let value = convert(values)
            .with_context(|| format!("Failed to convert parameter {}", idx + 1))?;
        query = value.bind_to(query);
    }

    let result = query.execute(&mut *conn).await?;
    debug!(rows_affected = result.rows_affected(), "upserted scene");
    Ok(result.rows_affected())
}
