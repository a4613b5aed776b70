//! WAL Manager
//!
//! Owns a directory of segments and routes writes to the active one.
//!
//! ## Responsibilities
//! - Discover existing segments on startup and repair the active one
//! - Rotate to a new segment when the active one cannot take a record
//! - Apply the sync policy and track I/O statistics
//! - Run the optional background sync task

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{Result, WalError};

use super::block::BlockLayout;
use super::reader::{Record, SegmentReader};
use super::recovery::SegmentRecovery;
use super::segment::{Segment, SegmentId};
use super::stats::{IoStats, IoStatsSnapshot};
use super::sync::SyncTask;

/// Where a record was written; everything needed to read it back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordPosition {
    pub segment_id: SegmentId,
    pub offset: u64,
}

/// Descriptive information about a segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    pub id: SegmentId,
    pub path: PathBuf,
    pub size: u64,
    /// Whether this segment currently accepts writes
    pub active: bool,
}

/// The write-ahead log
///
/// ## Concurrency Model
///
/// - **Writes** (write/rotation): exclusive `state` lock, so segment
///   selection, rotation, append and stats update form one atomic step
/// - **Reads** (read_at/records): shared `state` lock, then the segment's
///   own mutex (reads move the file cursor)
/// - **Background sync**: shared lock only long enough to grab a
///   `SyncHandle`; the fsync itself runs without any lock
///
/// Lock order is always `state` → segment.
pub struct Wal {
    inner: Arc<WalInner>,
    sync_task: Mutex<Option<SyncTask>>,
}

/// State shared with the background sync task
pub(crate) struct WalInner {
    config: Config,
    layout: BlockLayout,
    state: RwLock<WalState>,
    stats: IoStats,
}

struct WalState {
    /// Open segments ordered by id; the last one is active
    segments: BTreeMap<SegmentId, Arc<Mutex<Segment>>>,
    /// Id of the next segment to create
    next_segment_id: SegmentId,
    closed: bool,
}

impl WalState {
    fn active(&self) -> Result<&Arc<Mutex<Segment>>> {
        self.segments
            .values()
            .next_back()
            .ok_or_else(|| WalError::Invalid("WAL has no active segment".to_string()))
    }
}

impl Wal {
    /// Open or create a WAL in `config.wal_dir`
    ///
    /// On startup:
    /// 1. Validate config and create the directory
    /// 2. Open every file carrying the segment extension
    /// 3. Repair a torn tail on the newest segment
    /// 4. Create the first segment if none exist
    /// 5. Start the background sync task if an interval is set
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let layout = BlockLayout::new(config.block_size)?;

        fs::create_dir_all(&config.wal_dir)?;

        let mut segments = BTreeMap::new();
        for id in Self::discover_segments(&config)? {
            let path = config.wal_dir.join(id.file_name(&config.file_extension));
            segments.insert(id, Segment::open(&path, id, layout)?);
        }

        if segments.is_empty() {
            let id = SegmentId::FIRST;
            let path = config.wal_dir.join(id.file_name(&config.file_extension));
            segments.insert(id, Segment::create(&path, id, layout)?);
        } else if let Some(active) = segments.values_mut().next_back() {
            let result = SegmentRecovery::recover(active)?;
            tracing::debug!(
                segment = %active.id(),
                records = result.records_recovered,
                truncated = result.was_truncated,
                "checked active segment"
            );
        }

        let next_segment_id = segments
            .keys()
            .next_back()
            .map(SegmentId::next)
            .unwrap_or(SegmentId::FIRST);

        tracing::info!(
            dir = %config.wal_dir.display(),
            segments = segments.len(),
            next_segment = %next_segment_id,
            "opened WAL"
        );

        let sync_interval = config.sync_interval;
        let inner = Arc::new(WalInner {
            config,
            layout,
            state: RwLock::new(WalState {
                segments: segments
                    .into_iter()
                    .map(|(id, segment)| (id, Arc::new(Mutex::new(segment))))
                    .collect(),
                next_segment_id,
                closed: false,
            }),
            stats: IoStats::default(),
        });

        let sync_task = if sync_interval.is_zero() {
            None
        } else {
            Some(SyncTask::spawn(Arc::clone(&inner), sync_interval)?)
        };

        Ok(Self {
            inner,
            sync_task: Mutex::new(sync_task),
        })
    }

    /// Append a record, rotating segments as needed
    ///
    /// Steps:
    /// 1. Reject payloads no segment could hold
    /// 2. Acquire the exclusive lock
    /// 3. Rotate if the active segment cannot take the record
    /// 4. Append and update stats
    /// 5. Apply the sync policy
    pub fn write(&self, payload: &[u8]) -> Result<RecordPosition> {
        let max_payload = self.inner.config.max_payload_size();
        if payload.len() as u64 > max_payload {
            return Err(WalError::PayloadTooLarge {
                size: payload.len(),
                max: max_payload,
            });
        }

        let mut state = self.inner.state.write();
        if state.closed {
            return Err(WalError::Closed);
        }

        let active = Arc::clone(state.active()?);
        let needs_rotation = {
            let segment = active.lock();
            !segment.is_valid() || self.inner.exceeds_capacity(&segment, payload)
        };

        let target = if needs_rotation {
            self.inner.rotate(&mut *state)?
        } else {
            active
        };

        let mut segment = target.lock();
        let offset = segment.append(payload)?;
        let segment_id = segment.id();
        self.inner.stats.record_write(payload.len());

        if self.inner.config.verbose_logging {
            tracing::debug!(
                segment = %segment_id,
                offset,
                len = payload.len(),
                end = segment.size(),
                "appended record"
            );
        }

        if self.inner.should_sync() && segment.sync() {
            self.inner.stats.record_sync();
        }

        Ok(RecordPosition { segment_id, offset })
    }

    /// Read the record at `offset` in segment `segment_id`
    pub fn read_at(&self, segment_id: SegmentId, offset: u64) -> Result<Vec<u8>> {
        let state = self.inner.state.read();
        if state.closed {
            return Err(WalError::Closed);
        }

        let segment = state
            .segments
            .get(&segment_id)
            .ok_or(WalError::SegmentNotFound(segment_id))?;

        let payload = segment.lock().read_at(offset)?;
        Ok(payload)
    }

    /// Read back a record by its position
    pub fn read(&self, position: RecordPosition) -> Result<Vec<u8>> {
        self.read_at(position.segment_id, position.offset)
    }

    /// All records of a segment, in write order
    pub fn records(&self, segment_id: SegmentId) -> Result<Vec<Record>> {
        let state = self.inner.state.read();
        if state.closed {
            return Err(WalError::Closed);
        }

        let segment = state
            .segments
            .get(&segment_id)
            .ok_or(WalError::SegmentNotFound(segment_id))?;

        let mut segment = segment.lock();
        let records = SegmentReader::new(&mut segment).collect::<Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Raw bytes of a segment file, for compression or archival collaborators
    pub fn read_segment_bytes(&self, segment_id: SegmentId) -> Result<Vec<u8>> {
        let state = self.inner.state.read();
        let segment = state
            .segments
            .get(&segment_id)
            .ok_or(WalError::SegmentNotFound(segment_id))?;

        let path = segment.lock().path().to_path_buf();
        let bytes = fs::read(path)?;
        Ok(bytes)
    }

    /// Force the active segment to stable storage
    pub fn sync(&self) -> Result<()> {
        self.inner.sync_active()
    }

    /// Stop background sync, then sync and close every segment.
    ///
    /// Idempotent. Reports the first segment whose final sync failed.
    pub fn close(&self) -> Result<()> {
        if let Some(mut task) = self.sync_task.lock().take() {
            task.stop();
        }

        let mut state = self.inner.state.write();
        if state.closed {
            return Ok(());
        }

        let mut failed = None;
        for (id, segment) in &state.segments {
            if !segment.lock().close() && failed.is_none() {
                failed = Some(*id);
            }
        }
        state.closed = true;

        tracing::info!(dir = %self.inner.config.wal_dir.display(), "closed WAL");

        match failed {
            Some(id) => Err(WalError::SyncFailed(id)),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Id of the segment currently accepting writes
    pub fn active_segment_id(&self) -> Option<SegmentId> {
        self.inner.state.read().segments.keys().next_back().copied()
    }

    /// Ids of all known segments, oldest first
    pub fn segment_ids(&self) -> Vec<SegmentId> {
        self.inner.state.read().segments.keys().copied().collect()
    }

    pub fn segment_count(&self) -> usize {
        self.inner.state.read().segments.len()
    }

    /// Information about every segment, oldest first
    pub fn segments(&self) -> Vec<SegmentInfo> {
        let state = self.inner.state.read();
        let active = state.segments.keys().next_back().copied();

        state
            .segments
            .iter()
            .map(|(id, segment)| {
                let segment = segment.lock();
                SegmentInfo {
                    id: *id,
                    path: segment.path().to_path_buf(),
                    size: segment.size(),
                    active: Some(*id) == active,
                }
            })
            .collect()
    }

    /// Segments that no longer accept writes
    pub fn sealed_segments(&self) -> Vec<SegmentInfo> {
        self.segments().into_iter().filter(|info| !info.active).collect()
    }

    /// Snapshot of the I/O counters
    pub fn stats(&self) -> IoStatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn dir(&self) -> &Path {
        &self.inner.config.wal_dir
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.read().closed
    }

    /// Segment ids found in `config.wal_dir`, ascending. Reads the directory
    /// only; no segment is opened or repaired.
    pub fn discover_segments(config: &Config) -> Result<Vec<SegmentId>> {
        let mut ids = Vec::new();

        for entry in fs::read_dir(&config.wal_dir)? {
            let entry = entry?;
            let path = entry.path();

            if !entry.file_type()?.is_file() {
                continue;
            }

            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };

            if !name.ends_with(&config.file_extension) {
                tracing::info!(file = %path.display(), "ignoring file with unsupported extension");
                continue;
            }

            match SegmentId::parse(name, &config.file_extension) {
                Some(id) => ids.push(id),
                None => {
                    tracing::warn!(file = %path.display(), "ignoring segment file without a numeric id")
                }
            }
        }

        ids.sort();
        Ok(ids)
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "error while closing WAL");
        }
    }
}

impl WalInner {
    /// Whether `payload` would push `segment` past the size cap.
    ///
    /// An empty segment always accepts an admissible payload.
    fn exceeds_capacity(&self, segment: &Segment, payload: &[u8]) -> bool {
        let size = segment.size();
        size > 0
            && segment.compute_required_space(payload)
                > self.config.max_segment_size.saturating_sub(size)
    }

    fn should_sync(&self) -> bool {
        if self.config.sync_per_write {
            return true;
        }

        let threshold = self.config.sync_write_threshold;
        threshold != 0 && self.stats.window_write_ops() >= threshold
    }

    /// Create the next segment and make it active
    fn rotate(&self, state: &mut WalState) -> Result<Arc<Mutex<Segment>>> {
        let id = state.next_segment_id;
        let path = self
            .config
            .wal_dir
            .join(id.file_name(&self.config.file_extension));

        let segment = Segment::create(&path, id, self.layout)?;
        state.next_segment_id = id.next();

        if let Some(previous) = state.segments.values().next_back() {
            let previous = previous.lock();
            if previous.sync() {
                self.stats.record_sync();
            }
            tracing::info!(
                segment = %previous.id(),
                size = previous.size(),
                compressible = self.config.compression_enabled,
                "sealed segment"
            );
        }

        let segment = Arc::new(Mutex::new(segment));
        state.segments.insert(id, Arc::clone(&segment));

        tracing::info!(segment = %id, path = %path.display(), "rotated to new segment");
        Ok(segment)
    }

    /// Sync the active segment without holding any lock during the fsync
    pub(crate) fn sync_active(&self) -> Result<()> {
        let handle = {
            let state = self.state.read();
            if state.closed {
                return Err(WalError::Closed);
            }
            let handle = state.active()?.lock().sync_handle();
            handle.ok_or(WalError::Closed)?
        };

        if handle.sync() {
            self.stats.record_sync();
            Ok(())
        } else {
            Err(WalError::SyncFailed(handle.segment_id()))
        }
    }
}
