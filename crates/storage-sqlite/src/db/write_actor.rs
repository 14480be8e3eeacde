//! Single writer thread. Every mutation goes through one connection in an
//! immediate transaction so concurrent sync workers never fight over the
//! SQLite write lock.

use diesel::result::Error as DieselError;
use diesel::SqliteConnection;
use log::{debug, error};
use tokio::sync::{mpsc, oneshot};

use adpulse_core::{Error, Result};

use super::{get_connection, DbPool};
use crate::errors::StorageError;

type Job = Box<dyn FnOnce(&DbPool) + Send + 'static>;

#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<Job>,
}

enum TxError {
    Job(Error),
    Diesel(DieselError),
}

impl From<DieselError> for TxError {
    fn from(e: DieselError) -> Self {
        TxError::Diesel(e)
    }
}

pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
    let spawned = std::thread::Builder::new()
        .name("adpulse-db-writer".to_string())
        .spawn(move || {
            while let Some(job) = rx.blocking_recv() {
                job(&pool);
            }
            debug!("Database writer stopped");
        });
    if let Err(e) = spawned {
        // Receiver is dropped with the closure; every exec reports the writer as gone.
        error!("Failed to start database writer: {}", e);
    }
    WriteHandle { tx }
}

impl WriteHandle {
    /// Run `f` inside an immediate transaction on the writer thread.
    ///
    /// An `Err` from `f` rolls the transaction back and is returned unchanged.
    pub async fn exec<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel::<Result<T>>();
        let job: Job = Box::new(move |pool: &DbPool| {
            let outcome = run_in_transaction(pool, f);
            // The caller may have gone away; nothing to report to.
            let _ = reply_tx.send(outcome);
        });

        self.tx
            .send(job)
            .map_err(|_| StorageError::Writer("writer thread is not running".to_string()))?;
        reply_rx
            .await
            .map_err(|_| StorageError::Writer("writer dropped the reply".to_string()))?
    }
}

fn run_in_transaction<T, F>(pool: &DbPool, f: F) -> Result<T>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T>,
{
    let mut conn = get_connection(pool)?;
    match conn.immediate_transaction::<T, TxError, _>(|conn| f(conn).map_err(TxError::Job)) {
        Ok(value) => Ok(value),
        Err(TxError::Job(e)) => Err(e),
        Err(TxError::Diesel(e)) => Err(StorageError::from(e).into()),
    }
}
