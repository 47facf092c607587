use crate::config::OutputConfig;
use crate::ConfigError;
use std::path::{Path, PathBuf};

/// Directory layout of one harvest run
///
/// ```text
/// <root>/
///   pdfs/                     retrieved artifacts
///   ledger.json               retrieval ledger
///   reports/
///     STATISTICS.txt
///     failed_documents.txt
///     DOWNLOAD_SUMMARY.txt
///   documents.json            index (unless index-path points elsewhere)
/// ```
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
    index_path: PathBuf,
}

impl RunLayout {
    /// Creates a layout rooted at `root` with an explicit index location
    pub fn new(root: impl Into<PathBuf>, index_path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index_path: index_path.into(),
        }
    }

    /// Creates the layout described by the output configuration
    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(&config.directory, config.index_path())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join("pdfs")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.root.join("ledger.json")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn statistics_path(&self) -> PathBuf {
        self.reports_dir().join("STATISTICS.txt")
    }

    pub fn failure_log_path(&self) -> PathBuf {
        self.reports_dir().join("failed_documents.txt")
    }

    pub fn summary_path(&self) -> PathBuf {
        self.reports_dir().join("DOWNLOAD_SUMMARY.txt")
    }

    /// Creates every directory of the layout and checks that it is writable
    ///
    /// Runs before any network activity; a failure here is a configuration
    /// error and aborts the run at startup.
    pub fn prepare(&self) -> Result<(), ConfigError> {
        let mut dirs = vec![self.root.clone(), self.artifacts_dir(), self.reports_dir()];
        if let Some(parent) = self.index_path.parent() {
            if !parent.as_os_str().is_empty() {
                dirs.push(parent.to_path_buf());
            }
        }

        for dir in &dirs {
            std::fs::create_dir_all(dir).map_err(|e| ConfigError::OutputDirectory {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?;

            // Probe: creating (and dropping) a temp file proves the directory is writable
            tempfile::NamedTempFile::new_in(dir).map_err(|e| ConfigError::OutputDirectory {
                path: dir.display().to_string(),
                reason: format!("not writable: {}", e),
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths() {
        let layout = RunLayout::new("/data/run", "/data/run/documents.json");
        assert_eq!(layout.artifacts_dir(), PathBuf::from("/data/run/pdfs"));
        assert_eq!(layout.ledger_path(), PathBuf::from("/data/run/ledger.json"));
        assert_eq!(
            layout.failure_log_path(),
            PathBuf::from("/data/run/reports/failed_documents.txt")
        );
        assert_eq!(layout.index_path(), Path::new("/data/run/documents.json"));
    }

    #[test]
    fn test_from_config_defaults_index_into_root() {
        let config = OutputConfig {
            directory: "out".to_string(),
            index_path: None,
        };
        let layout = RunLayout::from_config(&config);
        assert_eq!(layout.index_path(), Path::new("out/documents.json"));
    }

    #[test]
    fn test_prepare_creates_directories() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("run");
        let layout = RunLayout::new(&root, dir.path().join("site").join("documents.json"));

        layout.prepare().unwrap();

        assert!(layout.artifacts_dir().is_dir());
        assert!(layout.reports_dir().is_dir());
        assert!(dir.path().join("site").is_dir());
    }

    #[test]
    fn test_prepare_rejects_file_as_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("occupied");
        std::fs::write(&root, b"not a directory").unwrap();

        let layout = RunLayout::new(&root, root.join("documents.json"));
        assert!(matches!(
            layout.prepare(),
            Err(ConfigError::OutputDirectory { .. })
        ));
    }
}
