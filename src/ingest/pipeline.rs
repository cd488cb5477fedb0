//! Background ingestion of source files into a project store.
//!
//! One job = "parse these files with this parser into this project". The
//! job runs on a single dedicated worker thread; the caller polls progress
//! through lock-free atomics and picks up the finished result with
//! [`IngestPipeline::finish_if_required`], which rebuilds the series model
//! on the caller thread. The worker itself only ever writes to the store.
//!
//! Each source file gets its own transaction: a parser error or I/O
//! failure rolls back that file alone and the run continues with the next
//! one. Cancellation is cooperative, checked once per line, and commits
//! whatever the current file had already produced.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::color::Color;
use crate::ingest::parser::{IngestError, LogParser, ParserKind, SignalSink};
use crate::series::SeriesModel;
use crate::store::{SignalStore, StoreTx};
use crate::types::{EpochTime, TickKind};

/// Everything one ingest run needs.
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub project_file: PathBuf,
    pub source_files: Vec<PathBuf>,
    pub parser: ParserKind,
}

/// Cross-thread state: flags and progress as atomics for lock-free
/// polling, the rest behind one mutex.
struct Shared {
    cancel: AtomicBool,
    working: AtomicBool,
    finalize_requested: AtomicBool,
    /// Fractional row progress of the current file, f64 bits.
    progress_bits: AtomicU64,
    elapsed_ms: AtomicU64,
    job: Mutex<JobState>,
}

#[derive(Debug, Default)]
struct JobState {
    parser: ParserKind,
    active_source: Option<i64>,
    row_index: usize,
    row_count: usize,
}

impl Shared {
    fn new() -> Self {
        Self {
            cancel: AtomicBool::new(false),
            working: AtomicBool::new(false),
            finalize_requested: AtomicBool::new(false),
            progress_bits: AtomicU64::new(0),
            elapsed_ms: AtomicU64::new(0),
            job: Mutex::new(JobState::default()),
        }
    }

    fn store_progress(&self, value: f64) {
        self.progress_bits.store(value.to_bits(), Ordering::Relaxed);
    }

    fn load_progress(&self) -> f64 {
        f64::from_bits(self.progress_bits.load(Ordering::Relaxed))
    }
}

fn lock(mutex: &Mutex<JobState>) -> MutexGuard<'_, JobState> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owner of the ingest worker thread.
///
/// Single in-flight job: [`start`](Self::start) refuses while a previous
/// worker is still joinable, stopped or not. The model handed to `start`
/// is cleared on the caller thread and stays untouched until
/// [`finish_if_required`](Self::finish_if_required) rebuilds it.
pub struct IngestPipeline {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
    project_file: Option<PathBuf>,
}

impl Default for IngestPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestPipeline {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            handle: None,
            project_file: None,
        }
    }

    /// Launch a job on the worker thread. Returns false (and does
    /// nothing) while a prior worker has not been joined via
    /// [`stop`](Self::stop) or [`finish_if_required`](Self::finish_if_required).
    pub fn start(&mut self, model: &mut SeriesModel, job: IngestJob) -> bool {
        if self.handle.is_some() {
            log::warn!("Ingest worker still joinable, stop it before starting a new run");
            return false;
        }

        model.clear();
        self.project_file = Some(job.project_file.clone());

        self.shared.cancel.store(false, Ordering::Relaxed);
        self.shared.working.store(true, Ordering::Relaxed);
        self.shared.finalize_requested.store(false, Ordering::Relaxed);
        self.shared.store_progress(0.0);
        self.shared.elapsed_ms.store(0, Ordering::Relaxed);
        {
            let mut state = lock(&self.shared.job);
            state.parser = job.parser;
            state.active_source = None;
            state.row_index = 0;
            state.row_count = 0;
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("siglog-ingest".to_string())
            .spawn(move || run_worker(shared, job));
        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                true
            }
            Err(e) => {
                log::error!("Failed to spawn ingest worker: {}", e);
                self.shared.working.store(false, Ordering::Relaxed);
                false
            }
        }
    }

    /// Request cancellation and block until the worker has joined.
    /// Returns whether a stop actually happened; calling with no worker
    /// is a no-op.
    pub fn stop(&mut self) -> bool {
        let Some(handle) = self.handle.take() else {
            return false;
        };
        self.shared.cancel.store(true, Ordering::Relaxed);
        if handle.join().is_err() {
            log::error!("Ingest worker panicked");
        }
        self.shared.working.store(false, Ordering::Relaxed);
        true
    }

    /// When the worker has finished, join it and rebuild the model from
    /// the project store. Designed to be polled from the caller's event
    /// loop; returns true once per completed run. A failed reopen keeps
    /// the request pending so a later poll can retry it.
    pub fn finish_if_required(&mut self, model: &mut SeriesModel) -> bool {
        if self.shared.working.load(Ordering::Relaxed)
            || !self.shared.finalize_requested.load(Ordering::Relaxed)
        {
            return false;
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Ingest worker panicked");
            }
        }

        let Some(path) = self.project_file.clone() else {
            // No path can ever satisfy this request; drop it.
            self.shared.finalize_requested.store(false, Ordering::Relaxed);
            return false;
        };
        match SignalStore::open(&path) {
            Ok(store) => {
                self.shared.finalize_requested.store(false, Ordering::Relaxed);
                model.finalize(&store)
            }
            Err(e) => {
                log::error!("Cannot reopen {} for finalize: {}", path.display(), e);
                false
            }
        }
    }

    pub fn is_working(&self) -> bool {
        self.shared.working.load(Ordering::Relaxed)
    }

    /// Fractional row progress of the file currently being parsed.
    pub fn progress(&self) -> f64 {
        self.shared.load_progress()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.shared.elapsed_ms.load(Ordering::Relaxed)
    }

    pub fn parser_kind(&self) -> ParserKind {
        lock(&self.shared.job).parser
    }

    pub fn active_source_id(&self) -> Option<i64> {
        lock(&self.shared.job).active_source
    }

    /// (rows parsed, total rows) of the file currently being parsed.
    pub fn row_progress(&self) -> (usize, usize) {
        let state = lock(&self.shared.job);
        (state.row_index, state.row_count)
    }
}

impl Drop for IngestPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(shared: Arc<Shared>, job: IngestJob) {
    let started = Instant::now();
    log::info!(
        "🚀 Ingest run: {} files, {:?} parser -> {}",
        job.source_files.len(),
        job.parser,
        job.project_file.display()
    );

    let mut store = match SignalStore::open(&job.project_file) {
        Ok(store) => store,
        Err(e) => {
            log::error!("Cannot open project {}: {}", job.project_file.display(), e);
            finish(&shared, started);
            return;
        }
    };
    if !store.clear_data() {
        log::error!("Could not clear project data, aborting run");
        finish(&shared, started);
        return;
    }

    let mut parser = job.parser.build();
    for path in &job.source_files {
        if shared.cancel.load(Ordering::Relaxed) {
            log::warn!("Ingest cancelled, skipping remaining files");
            break;
        }
        match ingest_file(&shared, &mut store, parser.as_mut(), path) {
            Ok(rows) => log::info!("✅ Ingested {} ({} rows)", path.display(), rows),
            Err(e) => log::error!("⚠️ Rolled back {}: {}", path.display(), e),
        }
        shared
            .elapsed_ms
            .store(started.elapsed().as_millis() as u64, Ordering::Relaxed);
    }

    finish(&shared, started);
}

fn finish(shared: &Shared, started: Instant) {
    shared
        .elapsed_ms
        .store(started.elapsed().as_millis() as u64, Ordering::Relaxed);
    shared.working.store(false, Ordering::Relaxed);
    shared.finalize_requested.store(true, Ordering::Relaxed);
    log::info!("Ingest worker done in {} ms", started.elapsed().as_millis());
}

/// Process one source file inside its own transaction. Any error here
/// drops the transaction uncommitted, discarding the file's writes.
fn ingest_file(
    shared: &Shared,
    store: &mut SignalStore,
    parser: &mut dyn LogParser,
    path: &Path,
) -> Result<usize, IngestError> {
    let text = std::fs::read_to_string(path)?;
    if text.is_empty() {
        log::warn!("Skipping empty source file: {}", path.display());
        return Ok(0);
    }
    if !parser.compile(path) {
        log::warn!("Parser rejected {}, skipping", path.display());
        return Ok(0);
    }

    let row_count = text.lines().count();
    {
        let mut state = lock(&shared.job);
        state.row_index = 0;
        state.row_count = row_count;
    }
    shared.store_progress(0.0);

    let tx = store.transaction()?;
    let source_id = tx
        .add_source_file(&path.to_string_lossy())
        .ok_or_else(|| IngestError::Transaction(format!("no source row for {}", path.display())))?;
    lock(&shared.job).active_source = Some(source_id);

    let mut sink = StoreSink {
        tx: &tx,
        source_id,
    };
    parser.on_start(&mut sink)?;
    for (index, line) in text.lines().enumerate() {
        if shared.cancel.load(Ordering::Relaxed) {
            // User cancellation keeps what was already parsed; only
            // errors roll back.
            log::warn!("Cancelled inside {} after {} rows", path.display(), index);
            break;
        }
        parser.on_row(line, &mut sink)?;
        let done = index + 1;
        lock(&shared.job).row_index = done;
        shared.store_progress(done as f64 / row_count as f64);
    }
    parser.on_end(&mut sink)?;

    if tx.commit() {
        Ok(row_count)
    } else {
        Err(IngestError::Transaction(format!(
            "commit failed for {}",
            path.display()
        )))
    }
}

/// [`SignalSink`] over the active file's transaction. Storage failures are
/// logged by the store and deliberately not surfaced to the parser.
struct StoreSink<'a> {
    tx: &'a StoreTx<'a>,
    source_id: i64,
}

impl SignalSink for StoreSink<'_> {
    fn add_signal_value(
        &mut self,
        category: &str,
        name: &str,
        time: EpochTime,
        value: f64,
        desc: &str,
    ) {
        self.tx
            .add_signal_tick(self.source_id, category, name, time, value, desc);
    }

    fn add_signal_status(&mut self, category: &str, name: &str, time: EpochTime, status: &str) {
        self.tx
            .add_signal_status(self.source_id, category, name, time, status, TickKind::Status);
    }

    fn add_signal_start_zone(&mut self, category: &str, name: &str, time: EpochTime, message: &str) {
        self.tx
            .add_signal_status(self.source_id, category, name, time, message, TickKind::ZoneStart);
    }

    fn add_signal_end_zone(&mut self, category: &str, name: &str, time: EpochTime, message: &str) {
        self.tx
            .add_signal_status(self.source_id, category, name, time, message, TickKind::ZoneEnd);
    }

    fn add_signal_tag(&mut self, time: EpochTime, color: Color, name: &str, help: &str) {
        self.tx.add_signal_tag(time, color, name, help);
    }
}
