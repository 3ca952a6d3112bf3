//! Durable persistence of discovery results across runs.
//!
//! The [`ResultStore`] owns three line-oriented, human-inspectable files in
//! a state directory (by default `~/.coursedl`):
//!
//! - `results.jsonl` - one serialized [`DiscoveredMedia`] record per line
//! - `results-bad.txt` - one bare identifier per line (pages with no media)
//! - `rendered.txt` - one bare identifier per line (pages already exported
//!   as auxiliary documents)
//!
//! Any file may be absent on first run and is created empty. Loading is
//! lenient for the record file: a line that fails to parse is skipped with a
//! warning, never fatal. A read failure on any backing file IS fatal, since
//! the run cannot safely proceed without knowing prior state. Saving
//! overwrites all three files atomically (temp file + rename) and is invoked
//! from every exit path so no discovered work is lost on a crash mid-run.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::collector::{DiscoveredMedia, StateSnapshot};
use crate::error::Error;

/// File holding serialized positive records, one JSON object per line.
pub const RESULTS_FILE: &str = "results.jsonl";

/// File holding identifiers of pages with no usable media, one per line.
pub const NEGATIVES_FILE: &str = "results-bad.txt";

/// File holding identifiers of pages already exported as documents.
pub const RENDERED_FILE: &str = "rendered.txt";

/// Default state directory name under the user's home directory.
pub const STATE_DIR_NAME: &str = ".coursedl";

/// The three persisted sets, as loaded at process start.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PersistedState {
    /// Positive records in file order.
    pub positives: Vec<DiscoveredMedia>,
    /// Identifiers of pages with no usable media.
    pub negatives: Vec<String>,
    /// Identifiers of pages already exported as documents.
    pub rendered: Vec<String>,
}

/// Owner of the on-disk result files.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    /// Creates a store rooted at the given directory.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates a store rooted at the default home-scoped state directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoHomeDir`] when the home directory cannot be
    /// determined.
    pub fn in_home_dir() -> Result<Self, Error> {
        let home = dirs::home_dir().ok_or(Error::NoHomeDir)?;
        Ok(Self::new(home.join(STATE_DIR_NAME)))
    }

    /// Returns the state directory this store reads and writes.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Loads the three persisted sets, creating missing files empty.
    ///
    /// Malformed record lines are skipped with a warning. Blank lines are
    /// ignored in all three files.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the state directory or a backing file
    /// cannot be created or read. This is fatal at startup.
    pub fn load(&self) -> Result<PersistedState, Error> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::io(self.dir.clone(), e))?;

        let positives = self.load_records()?;
        let negatives = self.load_id_file(NEGATIVES_FILE)?;
        let rendered = self.load_id_file(RENDERED_FILE)?;

        debug!(
            dir = %self.dir.display(),
            positives = positives.len(),
            negatives = negatives.len(),
            rendered = rendered.len(),
            "loaded persisted state"
        );

        Ok(PersistedState {
            positives,
            negatives,
            rendered,
        })
    }

    /// Overwrites all three files from the given snapshot.
    ///
    /// Identifier files are written in sorted order so the on-disk artifacts
    /// are stable across runs. Each file is written to a temporary sibling
    /// and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when a file cannot be written or renamed. The
    /// caller reports the failure but must not let it mask whatever
    /// triggered the save.
    pub fn save(&self, snapshot: &StateSnapshot<'_>) -> Result<(), Error> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::io(self.dir.clone(), e))?;

        let mut records = String::new();
        for media in snapshot.positives {
            let line = serde_json::to_string(media)
                .map_err(|e| Error::io(self.dir.join(RESULTS_FILE), e.into()))?;
            records.push_str(&line);
            records.push('\n');
        }
        self.write_atomic(RESULTS_FILE, &records)?;

        self.write_atomic(NEGATIVES_FILE, &id_lines(snapshot.negatives))?;
        self.write_atomic(RENDERED_FILE, &id_lines(snapshot.rendered))?;

        debug!(
            dir = %self.dir.display(),
            positives = snapshot.positives.len(),
            "persisted state saved"
        );
        Ok(())
    }

    fn load_records(&self) -> Result<Vec<DiscoveredMedia>, Error> {
        let path = self.dir.join(RESULTS_FILE);
        let file = open_or_create(&path)?;

        let mut records = Vec::new();
        for (idx, line_result) in BufReader::new(file).lines().enumerate() {
            let line = line_result.map_err(|e| Error::io(path.clone(), e))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<DiscoveredMedia>(line) {
                Ok(media) => records.push(media),
                Err(e) => {
                    warn!(
                        file = %path.display(),
                        line = idx + 1,
                        error = %e,
                        "skipping malformed result line"
                    );
                }
            }
        }
        Ok(records)
    }

    fn load_id_file(&self, name: &str) -> Result<Vec<String>, Error> {
        let path = self.dir.join(name);
        let file = open_or_create(&path)?;

        let mut ids = Vec::new();
        for line_result in BufReader::new(file).lines() {
            let line = line_result.map_err(|e| Error::io(path.clone(), e))?;
            let line = line.trim();
            if !line.is_empty() {
                ids.push(line.to_string());
            }
        }
        Ok(ids)
    }

    fn write_atomic(&self, name: &str, contents: &str) -> Result<(), Error> {
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!("{name}.tmp"));
        fs::write(&tmp, contents).map_err(|e| Error::io(tmp.clone(), e))?;
        fs::rename(&tmp, &path).map_err(|e| Error::io(path, e))
    }
}

/// Opens a file for reading, creating it empty first if absent.
fn open_or_create(path: &Path) -> Result<fs::File, Error> {
    fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| Error::io(path.to_path_buf(), e))
}

fn id_lines(ids: &std::collections::HashSet<String>) -> String {
    let mut sorted: Vec<&str> = ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let mut out = String::new();
    for id in sorted {
        out.push_str(id);
        out.push('\n');
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;
    use crate::collector::DiscoveryCollector;

    fn media(id: &str, subtitle: Option<&str>) -> DiscoveredMedia {
        DiscoveredMedia {
            id: id.to_string(),
            course: "Signals & Systems".to_string(),
            chapter: "Week 2".to_string(),
            lecture: "Convolution".to_string(),
            segment: "Overview".to_string(),
            video_url: Some("https://cdn.example.com/v/conv.mp4".to_string()),
            subtitle_url: subtitle.map(ToString::to_string),
            base_directory: PathBuf::from("/out/Signals & Systems/Week 2"),
            base_filename: "Overview - Convolution".to_string(),
        }
    }

    #[test]
    fn test_load_creates_missing_files_empty() {
        let temp = TempDir::new().unwrap();
        let store = ResultStore::new(temp.path().join("state"));

        let state = store.load().unwrap();

        assert!(state.positives.is_empty());
        assert!(state.negatives.is_empty());
        assert!(state.rendered.is_empty());
        assert!(temp.path().join("state").join(RESULTS_FILE).exists());
        assert!(temp.path().join("state").join(NEGATIVES_FILE).exists());
        assert!(temp.path().join("state").join(RENDERED_FILE).exists());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let temp = TempDir::new().unwrap();
        let store = ResultStore::new(temp.path());

        let mut collector = DiscoveryCollector::new();
        assert!(collector.record(media("block-1", None)));
        assert!(collector.record(media(
            "block-2",
            Some("https://courses.example.org/handler/transcript/download")
        )));
        collector.mark_negative("block-3");
        collector.mark_rendered("block-4");

        store.save(&collector.snapshot()).unwrap();
        let state = store.load().unwrap();

        assert_eq!(state.positives.len(), 2);
        assert_eq!(state.positives[0].id, "block-1");
        assert_eq!(state.positives[0].subtitle_url, None);
        assert_eq!(
            state.positives[1].subtitle_url.as_deref(),
            Some("https://courses.example.org/handler/transcript/download")
        );
        assert_eq!(state.negatives, vec!["block-3".to_string()]);
        assert_eq!(state.rendered, vec!["block-4".to_string()]);
    }

    #[test]
    fn test_load_skips_malformed_record_lines() {
        let temp = TempDir::new().unwrap();
        let store = ResultStore::new(temp.path());

        let good = serde_json::to_string(&media("block-1", None)).unwrap();
        let contents = format!("{good}\nthis is not json\n");
        fs::write(temp.path().join(RESULTS_FILE), contents).unwrap();

        let state = store.load().unwrap();
        assert_eq!(state.positives.len(), 1);
        assert_eq!(state.positives[0].id, "block-1");
    }

    #[test]
    fn test_load_ignores_blank_lines() {
        let temp = TempDir::new().unwrap();
        let store = ResultStore::new(temp.path());

        fs::write(temp.path().join(NEGATIVES_FILE), "block-1\n\n  \nblock-2\n").unwrap();

        let state = store.load().unwrap();
        assert_eq!(
            state.negatives,
            vec!["block-1".to_string(), "block-2".to_string()]
        );
    }

    #[test]
    fn test_save_overwrites_previous_contents() {
        let temp = TempDir::new().unwrap();
        let store = ResultStore::new(temp.path());

        let mut first = DiscoveryCollector::new();
        assert!(first.record(media("block-1", None)));
        first.mark_negative("old-negative");
        store.save(&first.snapshot()).unwrap();

        let second = DiscoveryCollector::new();
        store.save(&second.snapshot()).unwrap();

        let state = store.load().unwrap();
        assert!(state.positives.is_empty());
        assert!(state.negatives.is_empty());
    }

    #[test]
    fn test_identifier_files_are_sorted() {
        let temp = TempDir::new().unwrap();
        let store = ResultStore::new(temp.path());

        let mut ids = HashSet::new();
        ids.insert("zeta".to_string());
        ids.insert("alpha".to_string());
        ids.insert("mid".to_string());
        let positives: Vec<DiscoveredMedia> = Vec::new();
        let rendered = HashSet::new();
        store
            .save(&StateSnapshot {
                positives: &positives,
                negatives: &ids,
                rendered: &rendered,
            })
            .unwrap();

        let contents = fs::read_to_string(temp.path().join(NEGATIVES_FILE)).unwrap();
        assert_eq!(contents, "alpha\nmid\nzeta\n");
    }
}
