//! Threaded interface for scanning the game data.
//!
//! Enumerating every armor of a load order can take a long time, so the scan
//! runs on a background thread while the caller carries on. The handle reports
//! the materialized [`Catalog`] or the failure exactly once, either by polling
//! with [`LoadHandle::try_finish`] or by blocking in [`LoadHandle::join`].

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::catalog::{self, ArmorSource, Catalog};
use crate::error::{Result, TagError};

/// Handle to a running or completed scan.
pub struct LoadHandle {
    started: Instant,
    join: Option<JoinHandle<()>>,
    outcome: Receiver<Result<Catalog>>,
}

impl LoadHandle {
    /// Elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// The outcome if the scan has finished, otherwise the handle back.
    pub fn try_finish(mut self) -> std::result::Result<Result<Catalog>, LoadHandle> {
        match self.outcome.try_recv() {
            Ok(outcome) => {
                self.reap();
                Ok(outcome)
            }
            Err(TryRecvError::Empty) => Err(self),
            Err(TryRecvError::Disconnected) => {
                self.reap();
                Ok(Err(TagError::Catalog("catalog scan ended without a result".into())))
            }
        }
    }

    /// Wait for the scan to finish.
    pub fn join(mut self) -> Result<Catalog> {
        let outcome = self
            .outcome
            .recv()
            .unwrap_or_else(|_| Err(TagError::Catalog("catalog scan ended without a result".into())));
        self.reap();
        outcome
    }

    fn reap(&mut self) {
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("catalog scan thread panicked");
            }
        }
    }
}

pub struct CatalogLoader;

impl CatalogLoader {
    /// Starts scanning `source` on a background thread.
    pub fn start(source: Box<dyn ArmorSource>) -> LoadHandle {
        let (tx, rx) = mpsc::channel();
        let join = std::thread::spawn(move || {
            let outcome = catalog::scan(&*source);
            // the receiver may be gone if the caller lost interest
            let _ = tx.send(outcome);
        });
        debug!("catalog scan started");
        LoadHandle {
            started: Instant::now(),
            join: Some(join),
            outcome: rx,
        }
    }
}
