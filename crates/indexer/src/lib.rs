use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
};

use anyhow::{Context, Error, Result};
use crossbeam::channel;
use log::{debug, info, warn};
use manidx_engine::{FileIndexManager, FileNodeInfo, ListType, NodeType, RootPathMap};
use manidx_fs::{FileRecord, IgnoreEngine, IgnoreOptions, ScanContext, UserExcludes, walk_parallel};

/// Knobs for one manifest build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Compute a content hash for every regular file.
    pub with_hash: bool,
    /// Rewrite stored paths under one prefix to another.
    pub root_map: Option<RootPathMap>,
    /// Apply the built-in backup ignore patterns.
    pub use_default_ignores: bool,
    /// Extra gitignore-syntax patterns.
    pub exclude_patterns: Vec<String>,
    /// Absolute path prefixes left out of the scan.
    pub exclude_paths: Vec<PathBuf>,
    /// Walker threads; `None` uses the available parallelism.
    pub threads: Option<usize>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            with_hash: false,
            root_map: None,
            use_default_ignores: true,
            exclude_patterns: Vec::new(),
            exclude_paths: Vec::new(),
            threads: None,
        }
    }
}

/// Entries found under a scan root, each list sorted by path.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub dirs: Vec<FileNodeInfo>,
    pub files: Vec<FileNodeInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub dirs: u64,
    pub files: u64,
}

pub fn create_scan_context(root: &Path, options: &BuildOptions) -> Result<Arc<ScanContext>> {
    let ignore = IgnoreEngine::new(
        root,
        Some(IgnoreOptions {
            use_default_patterns: options.use_default_ignores,
            extra_patterns: options.exclude_patterns.clone(),
            extra_ignore_files: Box::default(),
        }),
    )
    .context("Failed to build ignore patterns")?;

    let mut user_excludes = UserExcludes::with_system_defaults();
    for path in &options.exclude_paths {
        user_excludes.add_root(path.clone());
    }

    Ok(Arc::new(ScanContext {
        ignore,
        user_excludes,
    }))
}

/// Walk `root` and turn every kept entry into a manifest node.
///
/// Real directories go to `dirs` with their subtree entry count; files and
/// symlinks go to `files`. Special files are skipped.
pub fn scan_root(
    root: &Path,
    ctx: Arc<ScanContext>,
    with_hash: bool,
    threads: Option<usize>,
) -> Result<ScanResult> {
    let (file_tx, file_rx) = channel::unbounded::<Vec<FileRecord>>();

    let num_threads = threads.unwrap_or_else(|| {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    });

    let walker_handle = {
        let root = root.to_path_buf();
        let tx = file_tx.clone();

        thread::spawn(move || walk_parallel(vec![root], tx, ctx, num_threads))
    };

    drop(file_tx);

    let mut scan = ScanResult::default();
    while let Ok(batch) = file_rx.recv() {
        for record in batch {
            if record.is_special {
                debug!("[scan] skipping special file {:?}", record.full_path);
                continue;
            }
            let node = match FileNodeInfo::from_record(&record, root, with_hash) {
                Ok(node) => node,
                Err(e) => {
                    warn!("[scan] skipping {:?}: {e}", record.full_path);
                    continue;
                }
            };
            if node.node_type() == NodeType::Dir {
                scan.dirs.push(node);
            } else {
                scan.files.push(node);
            }
        }
    }

    let walk_result = walker_handle
        .join()
        .map_err(|_| Error::msg("filesystem walker thread panicked"))?;
    walk_result.with_context(|| format!("Failed to scan {}", root.display()))?;

    scan.dirs.sort_unstable_by(|a, b| a.path().cmp(b.path()));
    scan.files.sort_unstable_by(|a, b| a.path().cmp(b.path()));
    scan.dirs = with_subtree_counts(scan.dirs, &scan.files);

    Ok(scan)
}

/// Set `nodes` on every dir to the number of entries below it.
fn with_subtree_counts(dirs: Vec<FileNodeInfo>, files: &[FileNodeInfo]) -> Vec<FileNodeInfo> {
    let mut all: Vec<&str> = dirs
        .iter()
        .chain(files)
        .map(|n| n.path())
        .collect();
    all.sort_unstable();

    // Everything under "d/" sorts in [ "d/", "d0" ), '0' being '/' + 1.
    let counts: Vec<u64> = dirs
        .iter()
        .map(|d| {
            let lower = format!("{}/", d.path());
            let upper = format!("{}0", d.path());
            let start = all.partition_point(|p| *p < lower.as_str());
            let end = all.partition_point(|p| *p < upper.as_str());
            (end - start) as u64
        })
        .collect();

    dirs.into_iter()
        .zip(counts)
        .map(|(d, n)| d.with_nodes(n))
        .collect()
}

/// Order nodes by the path that is written once `map` is applied, so the
/// stored lists stay ascending.
fn sort_by_stored_path(nodes: &mut [FileNodeInfo], map: &RootPathMap) {
    nodes.sort_by_cached_key(|n| map.remap(n.path()).unwrap_or_else(|| n.path().to_owned()));
}

/// Absolute, symlink-free location of the index file, creating its parent
/// directory when missing.
fn resolve_index_path(index_path: &Path) -> Result<PathBuf> {
    let parent = match index_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    let parent = parent
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", parent.display()))?;

    Ok(match index_path.file_name() {
        Some(name) => parent.join(name),
        None => parent,
    })
}

/// Scan `root` and rewrite the manifest at `index_path` from scratch.
pub fn build_manifest(root: &Path, index_path: &Path, options: &BuildOptions) -> Result<BuildSummary> {
    let root = root
        .canonicalize()
        .with_context(|| format!("Scan root {} is not accessible", root.display()))?;

    let mut options = options.clone();
    // The manifest must never list itself.
    options.exclude_paths.push(resolve_index_path(index_path)?);

    let ctx = create_scan_context(&root, &options)?;
    let mut scan = scan_root(&root, ctx, options.with_hash, options.threads)?;
    if let Some(map) = &options.root_map {
        sort_by_stored_path(&mut scan.dirs, map);
        sort_by_stored_path(&mut scan.files, map);
    }
    info!(
        "[build] scanned {}: {} dirs, {} files",
        root.display(),
        scan.dirs.len(),
        scan.files.len()
    );

    let mut index = FileIndexManager::open(index_path, true, options.root_map.clone())
        .with_context(|| format!("Failed to open index at {}", index_path.display()))?;
    index
        .reset()
        .with_context(|| format!("Failed to reset index at {}", index_path.display()))?;
    if let Some(map) = index.root_map() {
        info!("[build] storing {:?} as {:?}", map.root(), map.new_root());
    }

    let summary = BuildSummary {
        dirs: scan.dirs.len() as u64,
        files: scan.files.len() as u64,
    };

    for node in scan.dirs {
        index.add_node(ListType::Dirs, node)?;
    }
    for node in scan.files {
        index.add_node(ListType::Files, node)?;
    }

    index
        .close()
        .with_context(|| format!("Failed to write index to {}", index_path.display()))?;

    Ok(summary)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
