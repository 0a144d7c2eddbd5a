use std::{
    fs::{self, read_dir},
    io::Result,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use log::{debug, warn};

use crate::{
    config::{BATCH_SIZE, IDLE_POLL_MS},
    excludes::{IgnoreEngine, UserExcludes},
    record::FileRecord,
};

pub struct ScanContext {
    pub ignore: IgnoreEngine,
    pub user_excludes: UserExcludes,
}

/// Multi-threaded walk of `roots`.
///
/// Worker threads pull directories from a shared queue and push batches of
/// [FileRecord] to `file_tx`. Excluded entries are never emitted and
/// symlinked directories are recorded but not followed. Output order is
/// unspecified; callers that need a sorted manifest sort afterwards.
pub fn walk_parallel(
    roots: Vec<PathBuf>,
    file_tx: Sender<Vec<FileRecord>>,
    ctx: Arc<ScanContext>,
    num_threads: usize,
) -> Result<()> {
    let (work_tx, work_rx) = channel::unbounded::<PathBuf>();

    // Track pending work items to know when to terminate
    let pending = Arc::new(AtomicUsize::new(roots.len()));

    for root in roots {
        let _ = work_tx.send(root);
    }

    debug!("[walk_parallel] starting with {} threads", num_threads);

    thread::scope(|s| {
        for _ in 0..num_threads.max(1) {
            let work_rx = work_rx.clone();
            let work_tx = work_tx.clone();
            let file_tx = file_tx.clone();
            let ctx = Arc::clone(&ctx);
            let pending = Arc::clone(&pending);

            s.spawn(move || {
                worker_loop(work_rx, work_tx, file_tx, &ctx, &pending);
            });
        }
    });

    Ok(())
}

fn worker_loop(
    work_rx: channel::Receiver<PathBuf>,
    work_tx: channel::Sender<PathBuf>,
    file_tx: Sender<Vec<FileRecord>>,
    ctx: &ScanContext,
    pending: &AtomicUsize,
) {
    let mut batch = Vec::with_capacity(BATCH_SIZE);

    loop {
        match work_rx.recv_timeout(Duration::from_millis(IDLE_POLL_MS)) {
            Ok(dir) => {
                if let Err(e) = scan_dir(&dir, &work_tx, &mut batch, ctx, pending) {
                    warn!("[worker] scan_dir({:?}) failed: {e}", dir);
                }
                if batch.len() >= BATCH_SIZE {
                    let to_send = std::mem::take(&mut batch);
                    if file_tx.send(to_send).is_err() {
                        return;
                    }
                }

                if pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if pending.load(Ordering::Acquire) == 0 {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                break;
            }
        }
    }

    if !batch.is_empty() {
        let _ = file_tx.send(batch);
    }
}

/// Read one directory, queueing subdirectories and collecting records.
fn scan_dir(
    dir: &Path,
    work_tx: &channel::Sender<PathBuf>,
    batch: &mut Vec<FileRecord>,
    ctx: &ScanContext,
    pending: &AtomicUsize,
) -> Result<()> {
    let rd = match read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            warn!("[walk] read_dir({:?}) failed: {e}", dir);
            return Ok(());
        }
    };

    for entry_res in rd {
        let entry = match entry_res {
            Ok(e) => e,
            Err(e) => {
                warn!("[walk] error reading entry in {:?}: {e}", dir);
                continue;
            }
        };

        match inspect_fs_entry(&entry, ctx) {
            Ok(Some(record)) => {
                if should_recurse(&record) {
                    // Count before sending so no worker sees pending == 0 early.
                    pending.fetch_add(1, Ordering::AcqRel);
                    let _ = work_tx.send(record.full_path.clone());
                }
                batch.push(record);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("[walk] inspect_entry error in {:?}: {e}", dir);
            }
        }
    }

    Ok(())
}

fn should_recurse(f: &FileRecord) -> bool {
    f.is_dir && !f.is_symlink
}

fn inspect_fs_entry(entry: &fs::DirEntry, ctx: &ScanContext) -> Result<Option<FileRecord>> {
    // DirEntry::metadata does not traverse symlinks.
    let metadata = entry.metadata()?;
    let full_path = entry.path();

    let is_symlink = metadata.is_symlink();
    let is_dir = metadata.is_dir();
    let is_file = metadata.is_file();
    let is_special = !is_dir && !is_symlink && !is_file;

    let name = match entry.file_name().to_str() {
        Some(s) => s.to_owned(),
        None => {
            warn!("[walk] skipping non UTF-8 name in {:?}", full_path.parent());
            return Ok(None);
        }
    };

    if ctx.user_excludes.is_excluded(&full_path) || ctx.ignore.is_ignored(&full_path, is_dir) {
        debug!("[walk] excluded {:?}", full_path);
        return Ok(None);
    }

    let link_to_dir = is_symlink
        && fs::metadata(&full_path)
            .map(|m| m.is_dir())
            .unwrap_or(false);

    let size = if is_dir { 0 } else { metadata.len() };
    let mtime_secs = to_unix_secs(metadata.modified().ok());

    Ok(Some(FileRecord {
        full_path,
        name,
        size,
        mtime_secs,
        is_dir,
        is_symlink,
        link_to_dir,
        is_special,
    }))
}

/// Seconds since epoch, -1 when the platform cannot report a time.
fn to_unix_secs(t: Option<SystemTime>) -> i64 {
    t.and_then(|tt| tt.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(-1)
}

#[cfg(test)]
#[path = "walker_tests.rs"]
mod tests;
