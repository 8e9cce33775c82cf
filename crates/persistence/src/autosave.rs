//! Timer-driven background writer for the swap side-file.
//!
//! State machine: `Stopped -> Running(Clean) <-> Running(Dirty) -> Stopped`.
//! The loop wakes every `interval` (or at once when told to exit) and writes a
//! snapshot only if something marked the document dirty since the last write.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, trace, warn};

/// Where the autosave loop gets the document from.
///
/// Implementations must hand out a consistent copy even while another thread
/// is editing; the autosave thread never holds on to anything borrowed.
pub trait SnapshotSource: Send + Sync {
    fn capture(&self) -> crate::codec::DocumentSnapshot;
}

/// Owns the autosave thread for one side-file.
///
/// Dropping an `Autosave` stops and joins its thread.
pub struct Autosave {
    shared: Arc<Shared>,
    worker: Option<Worker>,
}

/// State visible to both the foreground and the autosave thread.
struct Shared {
    side_file: io::SideFile,
    source: Arc<dyn SnapshotSource>,
    config: crate::config::AutosaveConfig,
    span: tracing::Span,
    dirty: AtomicBool,
    /// Serializes side-file writes between `save_now` and the loop.
    write_lock: std::sync::Mutex<()>,
}

struct Worker {
    exit_tx: Sender<()>,
    handle: std::thread::JoinHandle<()>,
}

/*

====================
===== CREATION =====
====================

*/

impl Autosave {
    /// Binds an autosave manager to `side_file`. Nothing runs until [`Autosave::start`].
    ///
    /// Every log event is emitted inside `span`, on both threads.
    pub fn new(
        side_file: io::SideFile,
        source: Arc<dyn SnapshotSource>,
        config: crate::config::AutosaveConfig,
        span: tracing::Span,
    ) -> Self {
        span.in_scope(|| {
            debug!(path = %side_file.path().display(), "autosave created");
        });

        Self {
            shared: Arc::new(Shared {
                side_file,
                source,
                config,
                span,
                dirty: AtomicBool::new(false),
                write_lock: std::sync::Mutex::new(()),
            }),
            worker: None,
        }
    }
}

/*

==========================
===== INLINE METHODS =====
==========================

*/

impl Autosave {
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.shared.dirty.load(Ordering::Acquire)
    }

    #[inline]
    #[must_use]
    pub fn side_file(&self) -> &io::SideFile {
        &self.shared.side_file
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> crate::config::AutosaveConfig {
        self.shared.config
    }

    /// Flags the document as changed. The next tick writes a snapshot.
    #[inline]
    pub fn mark_dirty(&self) {
        self.shared.dirty.store(true, Ordering::Release);
    }
}

/*

============================
===== START & STOPPING =====
============================

*/

impl Autosave {
    /// Starts the background loop in the clean state.
    /// Starting twice only logs a warning.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Spawn`] if the OS refuses to create the thread.
    ///
    /// [`PersistenceError::Spawn`]: crate::errors::PersistenceError::Spawn
    pub fn start(&mut self) -> crate::errors::PersistenceResult<()> {
        match self.try_start() {
            Err(crate::errors::PersistenceError::AlreadyRunning) => {
                let _entered = self.shared.span.enter();
                warn!("autosave already running");
                Ok(())
            }
            other => other,
        }
    }

    /// Like [`Autosave::start`] but reports [`PersistenceError::AlreadyRunning`].
    ///
    /// # Errors
    ///
    /// [`PersistenceError::AlreadyRunning`] if the loop is up, or
    /// [`PersistenceError::Spawn`] if the thread cannot be created.
    ///
    /// [`PersistenceError::AlreadyRunning`]: crate::errors::PersistenceError::AlreadyRunning
    /// [`PersistenceError::Spawn`]: crate::errors::PersistenceError::Spawn
    pub fn try_start(&mut self) -> crate::errors::PersistenceResult<()> {
        if self.worker.is_some() {
            return Err(crate::errors::PersistenceError::AlreadyRunning);
        }

        let _entered = self.shared.span.enter();
        let (exit_tx, exit_rx) = crossbeam_channel::bounded(1);
        let shared = Arc::clone(&self.shared);

        shared.dirty.store(false, Ordering::Release);

        let handle = std::thread::Builder::new()
            .name("phantom-autosave".to_string())
            .spawn(move || run_loop(&shared, &exit_rx))
            .map_err(crate::errors::PersistenceError::Spawn)?;

        info!(
            interval_ms = self.shared.config.interval.as_millis() as u64,
            "autosave started"
        );
        self.worker = Some(Worker { exit_tx, handle });

        Ok(())
    }

    /// Signals the loop to exit and joins it. Stopping a stopped manager is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::WorkerPanicked`] if the thread died abnormally.
    ///
    /// [`PersistenceError::WorkerPanicked`]: crate::errors::PersistenceError::WorkerPanicked
    pub fn stop(&mut self) -> crate::errors::PersistenceResult<()> {
        match self.try_stop() {
            Err(crate::errors::PersistenceError::NotRunning) => Ok(()),
            other => other,
        }
    }

    /// Like [`Autosave::stop`] but reports [`PersistenceError::NotRunning`].
    ///
    /// # Errors
    ///
    /// [`PersistenceError::NotRunning`] if there is no loop, or
    /// [`PersistenceError::WorkerPanicked`] if the thread died abnormally.
    ///
    /// [`PersistenceError::NotRunning`]: crate::errors::PersistenceError::NotRunning
    /// [`PersistenceError::WorkerPanicked`]: crate::errors::PersistenceError::WorkerPanicked
    pub fn try_stop(&mut self) -> crate::errors::PersistenceResult<()> {
        let Some(worker) = self.worker.take() else {
            return Err(crate::errors::PersistenceError::NotRunning);
        };

        let _entered = self.shared.span.enter();
        info!("stopping autosave");

        // A full channel or a loop that already exited both mean the signal is moot.
        let _ = worker.exit_tx.try_send(());
        drop(worker.exit_tx);

        worker
            .handle
            .join()
            .map_err(|_| crate::errors::PersistenceError::WorkerPanicked)?;

        debug!("autosave thread joined");

        Ok(())
    }
}

impl Drop for Autosave {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            let _entered = self.shared.span.enter();
            error!(error = %e, "autosave did not shut down cleanly");
        }
    }
}

/*

=================
===== SAVES =====
=================

*/

impl Autosave {
    /// Writes a snapshot right now, dirty or not, on the calling thread.
    /// Returns the number of content bytes written.
    ///
    /// When this returns `Ok`, a snapshot taken after the call began is on disk.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Io`] if the side-file cannot be written. The
    /// dirty flag is restored so the loop retries.
    ///
    /// [`PersistenceError::Io`]: crate::errors::PersistenceError::Io
    pub fn save_now(&self) -> crate::errors::PersistenceResult<usize> {
        let _entered = self.shared.span.enter();
        debug!("manual save triggered");

        let was_dirty = self.shared.dirty.swap(false, Ordering::AcqRel);

        match self.shared.write_snapshot() {
            Ok(bytes) => {
                info!(bytes, "manual save successful");
                Ok(bytes)
            }
            Err(e) => {
                if was_dirty {
                    self.shared.dirty.store(true, Ordering::Release);
                }
                error!(error = %e, "manual save failed");
                Err(e)
            }
        }
    }
}

impl Autosave {
    /// Runs `persist` (typically a write of the document itself) with the
    /// autosave loop held off, then deletes the side-file.
    ///
    /// The dirty flag is cleared before `persist` runs, so only edits that land
    /// after it captured the document re-arm the loop. On failure the flag is
    /// restored and the side-file is left alone.
    ///
    /// # Errors
    ///
    /// Whatever `persist` reports, or [`PersistenceError::Io`] if the
    /// side-file cannot be removed afterwards.
    ///
    /// [`PersistenceError::Io`]: crate::errors::PersistenceError::Io
    pub fn settle<T, E>(&self, persist: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<crate::errors::PersistenceError>,
    {
        let _entered = self.shared.span.enter();
        let _serialized = self
            .shared
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let was_dirty = self.shared.dirty.swap(false, Ordering::AcqRel);

        let value = match persist() {
            Ok(value) => value,
            Err(e) => {
                if was_dirty {
                    self.shared.dirty.store(true, Ordering::Release);
                }
                return Err(e);
            }
        };

        self.shared
            .side_file
            .remove()
            .map_err(|e| E::from(crate::errors::PersistenceError::Io(e)))?;

        debug!("document persisted; side-file dropped");

        Ok(value)
    }
}

impl Shared {
    fn write_snapshot(&self) -> crate::errors::PersistenceResult<usize> {
        let _serialized = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let snapshot = self.source.capture();
        let encoded = crate::codec::encode(&snapshot, unix_now());

        self.side_file
            .write(&encoded, self.config.write_mode)?;

        Ok(snapshot.content.len())
    }

    /// One timer tick: write if dirty, and stay dirty if the write fails.
    fn tick(&self) {
        // Cleared before capturing so an edit landing mid-write re-arms the flag.
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return;
        }

        trace!("autosaving");

        match self.write_snapshot() {
            Ok(bytes) => debug!(bytes, "autosave successful"),
            Err(e) => {
                self.dirty.store(true, Ordering::Release);
                error!(error = %e, "autosave failed; will retry next tick");
            }
        }
    }
}

fn run_loop(shared: &Shared, exit_rx: &Receiver<()>) {
    let _entered = shared.span.enter();
    debug!("autosave thread started");

    loop {
        match exit_rx.recv_timeout(shared.config.interval) {
            Err(RecvTimeoutError::Timeout) => shared.tick(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!("autosave thread exiting");
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
