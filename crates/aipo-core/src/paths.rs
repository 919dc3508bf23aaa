//! OS-convention storage locations and atomic writes (spec.md §9 "Paths").
//! Grounded in the teacher's temp-file + rename convention
//! (`vcr::VcrClient::save`), generalized into a run-scoped helper every
//! component that persists artifacts shares.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// The three OS-convention directories the engine writes under, resolvable
/// either from `AIPO_*` environment overrides (spec.md §6) or platform
/// defaults via `dirs`.
#[derive(Debug, Clone)]
pub struct Paths {
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl Paths {
    /// Resolve platform-convention directories under an `aipo` namespace,
    /// honoring `AIPO_OUTPUT_DIR` as an override for `data_dir` (spec.md §6).
    pub fn resolve() -> Self {
        let data_dir = std::env::var("AIPO_OUTPUT_DIR").map(PathBuf::from).unwrap_or_else(|_| {
            dirs::data_dir().unwrap_or_else(std::env::temp_dir).join("aipo")
        });
        let cache_dir = dirs::cache_dir().unwrap_or_else(std::env::temp_dir).join("aipo");
        let state_dir = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(std::env::temp_dir)
            .join("aipo");
        Self { data_dir, cache_dir, state_dir }
    }

    /// A fixed, non-platform-dependent layout rooted at `root` — used by
    /// tests and by explicit `--output-dir` CLI overrides.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            data_dir: root.join("data"),
            cache_dir: root.join("cache"),
            state_dir: root.join("state"),
        }
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.data_dir.join("runs")
    }

    pub fn reports_dir(&self, run_id: &str) -> PathBuf {
        std::env::var("AIPO_REPORTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| self.runs_dir().join(run_id).join("reports"))
    }

    pub fn transcripts_dir(&self, run_id: &str) -> PathBuf {
        std::env::var("AIPO_TRANSCRIPTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| self.runs_dir().join(run_id).join("transcripts"))
    }

    pub fn cache_db_path(&self) -> PathBuf {
        self.cache_dir.join("response_cache.sqlite")
    }

    pub fn memory_db_path(&self) -> PathBuf {
        self.state_dir.join("conversations.sqlite")
    }

    pub fn ensure_all(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        fs::create_dir_all(&self.cache_dir)?;
        fs::create_dir_all(&self.state_dir)?;
        Ok(())
    }
}

/// Writes `contents` to `path` atomically: write to a sibling `.tmp` file,
/// fsync, then rename over the destination (spec.md §3 EvidencePack
/// ownership: "archive sealing is atomic: write to tmp, fsync, rename").
pub fn atomic_write(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("atomic-write")
    ));

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_leaves_only_the_final_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.json");
        atomic_write(&dest, b"{}").unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "{}");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn under_lays_out_three_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::under(dir.path());
        paths.ensure_all().unwrap();
        assert!(paths.data_dir.exists());
        assert!(paths.cache_dir.exists());
        assert!(paths.state_dir.exists());
    }
}
