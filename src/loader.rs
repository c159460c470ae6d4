//! Allow-list file loading.
//!
//! Every dynamically resolved file goes through [`SafeLoader`]: a
//! symbolic name is mapped to a candidate path, and the file is loaded
//! only if that path is a member of the configured [`SafeFileSet`] AND
//! exists on disk. Membership is the sole authorization check — a path
//! not in the set is never loaded, regardless of existence. This is the
//! defense against local file inclusion.

use crate::config::FrameworkConfig;
use crate::error::FrameworkError;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Set of file paths explicitly marked loadable.
///
/// Membership is by exact path, not canonicalized: entries must be
/// written exactly as the loader resolves them
/// (`<dir>/<Symbol>.<ext>`).
#[derive(Debug, Clone, Default)]
pub struct SafeFileSet {
    paths: HashSet<PathBuf>,
}

impl SafeFileSet {
    /// Build the set from configured paths.
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether a path is authorized for loading.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    /// Number of authorized paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether no paths are authorized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Load failures.
///
/// The two conditions are distinct for callers and tests, but share one
/// display so output never reveals which condition failed.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The candidate path is not in the safe-file set.
    #[error("file '{}' not found or permission denied to include", .0.display())]
    PermissionDenied(PathBuf),
    /// The candidate path is authorized but absent on disk.
    #[error("file '{}' not found or permission denied to include", .0.display())]
    NotFound(PathBuf),
}

impl From<LoadError> for FrameworkError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::PermissionDenied(path) => {
                Self::PermissionDenied(path.display().to_string())
            }
            LoadError::NotFound(path) => Self::NotFound(path.display().to_string()),
        }
    }
}

/// A successfully loaded file.
#[derive(Debug, Clone)]
pub struct Loaded {
    /// Resolved, authorized path.
    pub path: PathBuf,
    /// File contents, cached for the process lifetime.
    pub source: Arc<str>,
}

/// Resolves symbolic names to authorized files and loads them.
///
/// Loading is idempotent: contents are cached on first load and a
/// second request for the same file is a no-op returning the cached
/// contents.
#[derive(Debug)]
pub struct SafeLoader {
    config: Arc<FrameworkConfig>,
    safe_files: SafeFileSet,
    cache: Mutex<HashMap<PathBuf, Arc<str>>>,
}

impl SafeLoader {
    /// Build a loader over the configured safe-file set.
    #[must_use]
    pub fn new(config: Arc<FrameworkConfig>) -> Self {
        let safe_files = SafeFileSet::new(config.safe_files.iter().cloned());
        Self {
            config,
            safe_files,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The authorized file set this loader enforces.
    #[must_use]
    pub const fn safe_files(&self) -> &SafeFileSet {
        &self.safe_files
    }

    /// Derive the candidate path for a symbolic name.
    ///
    /// The fixed library map is consulted first for framework-internal
    /// names; otherwise the `Controller`/`DAO`/`View` suffix selects the
    /// configured base directory and the filename is
    /// `<Symbol>.<resource_ext>`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::NotFound`] for names with no recognized
    /// suffix and no library entry.
    pub fn resolve(&self, symbol: &str) -> Result<PathBuf, LoadError> {
        if let Some(rel) = self.config.library.get(symbol) {
            return Ok(self.join_root(rel));
        }

        let dir = if symbol.ends_with("Controller") {
            self.config.dirs.controller_dir()
        } else if symbol.ends_with("DAO") {
            self.config.dirs.dao_dir()
        } else if symbol.ends_with("View") {
            self.config.dirs.view_dir()
        } else {
            return Err(LoadError::NotFound(PathBuf::from(symbol)));
        };

        Ok(dir.join(format!("{symbol}.{}", self.config.resource_ext)))
    }

    /// Resolve a symbolic name and load its file.
    ///
    /// The candidate path must be in the safe-file set and exist on
    /// disk; both conditions are checked before any read.
    ///
    /// # Errors
    ///
    /// [`LoadError::PermissionDenied`] when the path is not in the
    /// safe-file set, [`LoadError::NotFound`] when it is authorized but
    /// absent.
    pub fn resolve_and_load(&self, symbol: &str) -> Result<Loaded, LoadError> {
        let path = self.resolve(symbol)?;

        if !self.safe_files.contains(&path) {
            tracing::warn!(symbol, path = %path.display(), "load denied: not in safe-file set");
            return Err(LoadError::PermissionDenied(path));
        }

        if let Some(source) = self.cache.lock().get(&path) {
            return Ok(Loaded {
                path,
                source: Arc::clone(source),
            });
        }

        if !path.is_file() {
            tracing::warn!(symbol, path = %path.display(), "load denied: file absent");
            return Err(LoadError::NotFound(path));
        }

        let source: Arc<str> = std::fs::read_to_string(&path)
            .map_err(|_| LoadError::NotFound(path.clone()))?
            .into();

        tracing::debug!(symbol, path = %path.display(), "loaded file");
        self.cache.lock().insert(path.clone(), Arc::clone(&source));
        Ok(Loaded { path, source })
    }

    fn join_root(&self, rel: &Path) -> PathBuf {
        if rel.is_absolute() || self.config.dirs.root.as_os_str() == "." {
            rel.to_path_buf()
        } else {
            self.config.dirs.root.join(rel)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn loader_with(tmp: &TempDir, safe: &[&str]) -> SafeLoader {
        let root = tmp.path().to_path_buf();
        let mut config = FrameworkConfig::default();
        config.dirs.root.clone_from(&root);
        config.safe_files = safe.iter().map(|rel| root.join(rel)).collect();
        config
            .library
            .insert("Layout".to_string(), PathBuf::from("lib/Layout.html"));
        SafeLoader::new(Arc::new(config))
    }

    fn write(tmp: &TempDir, rel: &str, contents: &str) {
        let path = tmp.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_load_requires_membership_even_if_file_exists() {
        let tmp = TempDir::new().unwrap();
        write(&tmp, "view/SecretView.html", "secret");
        let loader = loader_with(&tmp, &[]);

        let err = loader.resolve_and_load("SecretView").unwrap_err();
        assert!(matches!(err, LoadError::PermissionDenied(_)));
    }

    #[test]
    fn test_listed_but_absent_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let loader = loader_with(&tmp, &["view/GhostView.html"]);

        let err = loader.resolve_and_load("GhostView").unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }

    #[test]
    fn test_both_failures_share_display() {
        let denied = LoadError::PermissionDenied(PathBuf::from("x"));
        let missing = LoadError::NotFound(PathBuf::from("x"));
        assert_eq!(denied.to_string(), missing.to_string());
    }

    #[test]
    fn test_successful_load_and_idempotence() {
        let tmp = TempDir::new().unwrap();
        write(&tmp, "view/HomeView.html", "<h1>home</h1>");
        let loader = loader_with(&tmp, &["view/HomeView.html"]);

        let first = loader.resolve_and_load("HomeView").unwrap();
        assert_eq!(&*first.source, "<h1>home</h1>");

        // Loading twice is a no-op: contents come from the cache even
        // if the file changed on disk after the first load.
        write(&tmp, "view/HomeView.html", "<h1>changed</h1>");
        let second = loader.resolve_and_load("HomeView").unwrap();
        assert_eq!(&*second.source, "<h1>home</h1>");
        assert!(Arc::ptr_eq(&first.source, &second.source));
    }

    #[test]
    fn test_library_symbol_resolution() {
        let tmp = TempDir::new().unwrap();
        write(&tmp, "lib/Layout.html", "layout");
        let loader = loader_with(&tmp, &["lib/Layout.html"]);

        let loaded = loader.resolve_and_load("Layout").unwrap();
        assert_eq!(&*loaded.source, "layout");
    }

    #[test]
    fn test_library_symbol_still_requires_membership() {
        let tmp = TempDir::new().unwrap();
        write(&tmp, "lib/Layout.html", "layout");
        let loader = loader_with(&tmp, &[]);

        let err = loader.resolve_and_load("Layout").unwrap_err();
        assert!(matches!(err, LoadError::PermissionDenied(_)));
    }

    #[test]
    fn test_unrecognized_symbol() {
        let tmp = TempDir::new().unwrap();
        let loader = loader_with(&tmp, &[]);
        let err = loader.resolve_and_load("NoSuchSuffix").unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }

    #[test]
    fn test_suffix_directory_mapping() {
        let tmp = TempDir::new().unwrap();
        let loader = loader_with(&tmp, &[]);
        let root = tmp.path();

        assert_eq!(
            loader.resolve("HomeController").unwrap(),
            root.join("controller/HomeController.html")
        );
        assert_eq!(
            loader.resolve("UserDAO").unwrap(),
            root.join("model/dao/UserDAO.html")
        );
        assert_eq!(
            loader.resolve("HomeView").unwrap(),
            root.join("view/HomeView.html")
        );
    }
}
