use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{error, info, warn};
use rusqlite::{Connection, ErrorCode};
use tokio::sync::oneshot;

pub mod helpers;
mod migrations;
pub mod models;
pub mod repositories;

use migrations::run_migrations;

use crate::error::VitalsError;

pub use models::{FeatureSnapshot, RawReading, ReadingValue, SensorRecord};
pub use repositories::readings::{IngestOutcome, SnapshotUpdate};

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

/// Condition the store was found in when it was opened.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreStatus {
    Healthy,
    /// The previous file was unreadable; it was moved aside and a fresh
    /// schema was created in its place.
    Recovered { quarantined: PathBuf, reason: String },
}

impl StoreStatus {
    pub fn is_recovered(&self) -> bool {
        matches!(self, StoreStatus::Recovered { .. })
    }
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

/// Handle to the reading log and feature snapshot tables.
///
/// A single worker thread owns the SQLite connection and runs every task in
/// submission order, so writes for a patient never interleave.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
    status: Arc<StoreStatus>,
}

#[derive(Debug, thiserror::Error)]
#[error("integrity check reported: {0}")]
struct IntegrityFailure(String);

/// True only for damage to the file itself. Schema-version refusals and lock
/// contention are not corruption and must never trigger a reset.
fn is_corruption(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if cause.is::<IntegrityFailure>() {
            return true;
        }
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(failure, _))
                if matches!(failure.code, ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt)
        )
    })
}

fn open_and_migrate(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path).context("failed to open SQLite database")?;

    let integrity: String = conn
        .query_row("PRAGMA quick_check", [], |row| row.get(0))
        .context("integrity check failed")?;
    if integrity != "ok" {
        return Err(IntegrityFailure(integrity).into());
    }

    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("Failed to enable WAL mode: {err}");
    }

    run_migrations(&mut conn).context("failed to run database migrations")?;
    Ok(conn)
}

fn quarantine(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("database path {} has no file name", path.display()))?
        .to_string_lossy()
        .into_owned();
    let target = path.with_file_name(format!("{file_name}.corrupt-{}", Utc::now().timestamp()));

    std::fs::rename(path, &target).with_context(|| {
        format!("failed to move {} aside to {}", path.display(), target.display())
    })?;

    for suffix in ["-wal", "-shm"] {
        let sidecar = path.with_file_name(format!("{file_name}{suffix}"));
        if sidecar.exists() {
            if let Err(err) = std::fs::remove_file(&sidecar) {
                warn!("Failed to remove {}: {err}", sidecar.display());
            }
        }
    }

    Ok(target)
}

fn open_or_recover(path: &Path) -> Result<(Connection, StoreStatus)> {
    match open_and_migrate(path) {
        Ok(conn) => Ok((conn, StoreStatus::Healthy)),
        Err(err) if path.exists() && is_corruption(&err) => {
            let reason = format!("{err:#}");
            error!("Store at {} is unreadable ({reason}); resetting", path.display());
            let quarantined = quarantine(path)?;
            let conn = open_and_migrate(path).context("failed to recreate store after reset")?;
            Ok((conn, StoreStatus::Recovered { quarantined, reason }))
        }
        Err(err) => Err(err),
    }
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<StoreStatus>>();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("vitaltwin-db".into())
            .spawn(move || {
                let (mut conn, status) = match open_or_recover(&path_for_thread) {
                    Ok(opened) => opened,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                if ready_tx.send(Ok(status)).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        let status = ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
            status: Arc::new(status),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub fn store_status(&self) -> &StoreStatus {
        &self.status
    }

    /// `StoreCorruption` describing the reset performed at open, if any.
    pub fn corruption(&self) -> Option<VitalsError> {
        match self.status.as_ref() {
            StoreStatus::Healthy => None,
            StoreStatus::Recovered { reason, .. } => Some(VitalsError::StoreCorruption {
                path: self.db_path.as_ref().clone(),
                reason: reason.clone(),
            }),
        }
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }
}
