use anyhow::{anyhow, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::ConnectOptions;
use std::{collections::VecDeque, ops::Range, str::FromStr, sync::Mutex, time::Duration};
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::source::{SceneStream, StreamSource};
use crate::db::{SqliteConnector, MIGRATOR};

pub const HEADER: &str = "productId,acquisitionDate,cloudCover,path,row,download_url";

pub fn scene_id(i: usize) -> String {
    format!("LC08_L1TP_{:06}_20170304_20170316_01_T1", i)
}

pub fn scene_path_row(i: usize) -> (i64, i64) {
    (100 + (i % 50) as i64, 20 + (i % 30) as i64)
}

pub fn scene_line(i: usize) -> String {
    let (path, row) = scene_path_row(i);
    format!(
        "{},2017-03-04 04:35:19.143570,{}.5,{},{},https://example.com/scenes/{}/index.html",
        scene_id(i),
        i % 100,
        path,
        row,
        i
    )
}

pub fn scene_csv(rows: Range<usize>) -> String {
    let mut csv = format!("{HEADER}\n");
    for i in rows {
        csv.push_str(&scene_line(i));
        csv.push('\n');
    }
    csv
}

/// A migrated shared in-memory database. The returned connection keeps it
/// alive; the connector opens further connections to the same database.
pub async fn memory_database() -> (SqliteConnector, SqliteConnection) {
    let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
    let mut keep_alive = options.connect().await.unwrap();
    MIGRATOR.run(&mut keep_alive).await.unwrap();
    (SqliteConnector::new(options), keep_alive)
}

pub async fn scene_count(conn: &mut SqliteConnection) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM scenes")
        .fetch_one(conn)
        .await
        .unwrap()
}

/// Reads a counter such as `Added:` out of a run summary or status report.
pub fn counter(report: &str, label: &str) -> u64 {
    report
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(label))
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or_else(|| panic!("no {label} in report:\n{report}"))
}

/// Serves queued streams, then a fixed CSV, and reports the instant of
/// every open.
pub struct ScriptedSource {
    streams: Mutex<VecDeque<SceneStream>>,
    fallback: String,
    delay: Duration,
    opened: mpsc::UnboundedSender<Instant>,
}

impl ScriptedSource {
    pub fn new(fallback: String) -> (Self, mpsc::UnboundedReceiver<Instant>) {
        let (opened, opened_rx) = mpsc::unbounded_channel();
        let source = ScriptedSource {
            streams: Mutex::new(VecDeque::new()),
            fallback,
            delay: Duration::ZERO,
            opened,
        };
        (source, opened_rx)
    }

    /// Makes every open take `delay`, standing in for a slow download.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push_stream(&self, stream: SceneStream) {
        self.streams.lock().unwrap().push_back(stream);
    }
}

#[async_trait::async_trait]
impl StreamSource for ScriptedSource {
    fn location(&self) -> &str {
        "scripted"
    }

    async fn open(&self) -> Result<SceneStream> {
        let _ = self.opened.send(Instant::now());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let queued = self.streams.lock().unwrap().pop_front();
        match queued {
            Some(stream) => Ok(stream),
            None => Ok(Box::new(std::io::Cursor::new(self.fallback.clone().into_bytes()))),
        }
    }
}

pub struct UnreachableSource;

#[async_trait::async_trait]
impl StreamSource for UnreachableSource {
    fn location(&self) -> &str {
        "https://unreachable.invalid/scene_list.gz"
    }

    async fn open(&self) -> Result<SceneStream> {
        Err(anyhow!("connection refused"))
    }
}
