use crate::error::{IndexerError, Result};
use codeintel_code_chunker::{Language, SourceUnit};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Scanner for finding source units under a directory
pub struct FileScanner {
    root: PathBuf,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Scan directory for files with a known language (.gitignore aware)
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true);
        builder.filter_entry(move |entry| !FileScanner::is_ignored_scope(entry.path(), &root));

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if let Ok(meta) = entry.metadata() {
                        if meta.len() > MAX_FILE_SIZE_BYTES {
                            log::debug!(
                                "Skipping large file {} ({} bytes > {})",
                                path.display(),
                                meta.len(),
                                MAX_FILE_SIZE_BYTES
                            );
                            continue;
                        }
                    }

                    if Language::from_path(path) == Language::Unknown {
                        continue;
                    }

                    files.push(path.to_path_buf());
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        files.sort();
        log::info!("Found {} source files under {}", files.len(), self.root.display());
        files
    }

    /// Read every scanned file as a unit whose file id is its path relative to the root
    ///
    /// Files that are not valid UTF-8 are skipped with a warning.
    pub fn scan_units(&self) -> Result<Vec<SourceUnit>> {
        if !self.root.is_dir() {
            return Err(IndexerError::InvalidPath(self.root.display().to_string()));
        }

        let mut units = Vec::new();
        for path in self.scan() {
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    log::warn!("Skipping non-UTF-8 file {}", path.display());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            units.push(SourceUnit::from_path(self.file_id(&path), text));
        }
        Ok(units)
    }

    fn file_id(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn is_ignored_scope(path: &Path, root: &Path) -> bool {
        if let Ok(relative) = path.strip_prefix(root) {
            for component in relative.components() {
                if let std::path::Component::Normal(name) = component {
                    let lowered = name.to_string_lossy().to_lowercase();
                    if IGNORED_SCOPES.iter().any(|ignored| ignored == &lowered) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

const IGNORED_SCOPES: &[&str] = &[
    // VCS / tooling
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    // caches / builds
    ".cache",
    "node_modules",
    ".next",
    "build",
    "dist",
    "coverage",
    "target",
    ".venv",
    "venv",
    "__pycache__",
    // vendored code
    "vendor",
    "third_party",
];

const MAX_FILE_SIZE_BYTES: u64 = 1_048_576; // 1 MB
