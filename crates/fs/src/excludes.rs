use ignore::gitignore::{Gitignore, GitignoreBuilder};
use manidx_runtime::DEFAULT_BACKUP_IGNORE_PATTERNS;
use std::path::{Path, PathBuf};

pub struct IgnoreEngine {
    matcher: Gitignore,
}

/// Absolute path prefixes the user asked to leave out of the manifest.
#[derive(Debug, Clone)]
pub struct UserExcludes {
    roots: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct IgnoreOptions {
    /// Whether to use the default backup ignore patterns
    pub use_default_patterns: bool,

    /// Extra gitignore-syntax lines, e.g. from `--exclude`
    pub extra_patterns: Vec<String>,

    /// Paths to additional ignore files
    pub extra_ignore_files: Box<[PathBuf]>,
}

impl Default for IgnoreEngine {
    fn default() -> Self {
        IgnoreEngine {
            matcher: Gitignore::empty(),
        }
    }
}

impl Default for IgnoreOptions {
    fn default() -> Self {
        Self {
            use_default_patterns: true,
            extra_patterns: Vec::new(),
            extra_ignore_files: Box::default(),
        }
    }
}

impl IgnoreEngine {
    /// Build an IgnoreEngine rooted at `root`.
    pub fn new(root: &Path, options: Option<IgnoreOptions>) -> Result<Self, ignore::Error> {
        let IgnoreOptions {
            use_default_patterns,
            extra_patterns,
            extra_ignore_files,
        } = options.unwrap_or_default();
        let mut builder = GitignoreBuilder::new(root);

        if use_default_patterns {
            for pat in DEFAULT_BACKUP_IGNORE_PATTERNS {
                builder.add_line(None, pat)?;
            }
        }

        for pat in &extra_patterns {
            builder.add_line(None, pat)?;
        }

        for path in &*extra_ignore_files {
            if let Some(err) = builder.add(path) {
                return Err(err);
            }
        }

        Ok(IgnoreEngine {
            matcher: builder.build()?,
        })
    }

    #[inline]
    pub fn with_defaults(root: &Path) -> Result<Self, ignore::Error> {
        Self::new(root, None)
    }

    #[inline]
    #[must_use]
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.matcher
            .matched_path_or_any_parents(path, is_dir)
            .is_ignore()
    }
}

impl UserExcludes {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        let mut ux = UserExcludes { roots: Vec::new() };
        for root in roots {
            ux.add_root(root);
        }
        ux
    }

    pub fn with_system_defaults() -> Self {
        let mut ux = UserExcludes::new(Vec::new());
        #[cfg(unix)]
        {
            use manidx_runtime::DEFAULT_SYSTEM_SKIP_PREFIXES;

            for p in DEFAULT_SYSTEM_SKIP_PREFIXES {
                ux.add_root(PathBuf::from(p));
            }
        }
        ux
    }

    pub fn add_root(&mut self, root: PathBuf) {
        // /var/run is a symlink to /run on many systems.
        let root = root.canonicalize().unwrap_or(root);

        // Already covered by a broader root
        if self.roots.iter().any(|existing| root.starts_with(existing)) {
            return;
        }

        self.roots.retain(|existing| !existing.starts_with(&root));
        self.roots.push(root);
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    #[inline]
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| path.starts_with(root))
    }
}

impl Default for UserExcludes {
    fn default() -> Self {
        UserExcludes::with_system_defaults()
    }
}

#[cfg(test)]
#[path = "excludes_tests.rs"]
mod tests;
