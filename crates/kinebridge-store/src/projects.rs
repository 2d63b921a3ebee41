//! Project hierarchy on disk.
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   <project>/
//!     <subject>/
//!       subject_info.json
//!       <session>/
//!         <datafile>/
//! ```
//!
//! Listings return child *directories* only, sorted by name.  Every name is a
//! single path segment; anything that could escape the parent directory is
//! rejected with [`StoreError::InvalidName`].
//!
//! # Example
//!
//! ```rust
//! use kinebridge_store::projects::{ProjectStore, SubjectInfo};
//! use serde_json::json;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = ProjectStore::open(dir.path()).unwrap();
//!
//! store.create_project("gait-study").unwrap();
//! store
//!     .create_subject("gait-study", &SubjectInfo::new("S01", json!(72.5), json!(1.80)))
//!     .unwrap();
//! store.create_session("gait-study", "S01", "baseline").unwrap();
//!
//! assert_eq!(store.list_sessions("gait-study", "S01").unwrap(), vec!["baseline"]);
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{Level, StoreError};

/// File written inside every subject directory.
pub const SUBJECT_INFO_FILE: &str = "subject_info.json";

/// Contents of `subject_info.json`.
///
/// `weight` and `height` are stored exactly as the client sent them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectInfo {
    pub subject_id: String,
    pub weight: Value,
    pub height: Value,
}

impl SubjectInfo {
    pub fn new(subject_id: impl Into<String>, weight: Value, height: Value) -> Self {
        Self {
            subject_id: subject_id.into(),
            weight,
            height,
        }
    }
}

/// Filesystem-backed project tree rooted at a single directory.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
}

impl ProjectStore {
    /// Open the store at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn list_projects(&self) -> Result<Vec<String>, StoreError> {
        list_dirs(&self.root)
    }

    pub fn create_project(&self, name: &str) -> Result<(), StoreError> {
        self.create_child(&[], name, Level::Project)
    }

    pub fn list_subjects(&self, project: &str) -> Result<Vec<String>, StoreError> {
        self.list_children(&[project], Level::Project)
    }

    /// Create the subject directory and write its `subject_info.json`.
    pub fn create_subject(&self, project: &str, info: &SubjectInfo) -> Result<(), StoreError> {
        self.create_child(&[project], &info.subject_id, Level::Subject)?;
        let path = self
            .resolve(&[project, &info.subject_id])?
            .join(SUBJECT_INFO_FILE);
        fs::write(path, serde_json::to_vec(info)?)?;
        Ok(())
    }

    /// Read back a subject's `subject_info.json`.
    pub fn subject_info(&self, project: &str, subject: &str) -> Result<SubjectInfo, StoreError> {
        let dir = self.resolve(&[project, subject])?;
        if !dir.is_dir() {
            return Err(StoreError::NotFound(Level::Subject));
        }
        let raw = fs::read(dir.join(SUBJECT_INFO_FILE))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    pub fn list_sessions(&self, project: &str, subject: &str) -> Result<Vec<String>, StoreError> {
        self.list_children(&[project, subject], Level::Subject)
    }

    pub fn create_session(
        &self,
        project: &str,
        subject: &str,
        session: &str,
    ) -> Result<(), StoreError> {
        self.create_child(&[project, subject], session, Level::Session)
    }

    pub fn list_datafiles(
        &self,
        project: &str,
        subject: &str,
        session: &str,
    ) -> Result<Vec<String>, StoreError> {
        self.list_children(&[project, subject, session], Level::Session)
    }

    pub fn create_datafile(
        &self,
        project: &str,
        subject: &str,
        session: &str,
        datafile: &str,
    ) -> Result<(), StoreError> {
        self.create_child(&[project, subject, session], datafile, Level::Datafile)
    }

    /// Make sure `<root>/<relative>` exists, creating intermediate
    /// directories.  `relative` may contain several `/`-separated segments;
    /// empty segments are ignored.
    pub fn ensure_relative_dir(&self, relative: &str) -> Result<PathBuf, StoreError> {
        let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
        let path = self.resolve(&segments)?;
        fs::create_dir_all(&path)?;
        info!(path = %path.display(), "directory checked/created");
        Ok(path)
    }

    fn resolve(&self, segments: &[&str]) -> Result<PathBuf, StoreError> {
        let mut path = self.root.clone();
        for segment in segments {
            validate_name(segment)?;
            path.push(segment);
        }
        Ok(path)
    }

    fn list_children(&self, parent: &[&str], level: Level) -> Result<Vec<String>, StoreError> {
        let dir = self.resolve(parent)?;
        if !dir.is_dir() {
            return Err(StoreError::NotFound(level));
        }
        list_dirs(&dir)
    }

    fn create_child(&self, parent: &[&str], name: &str, level: Level) -> Result<(), StoreError> {
        validate_name(name)?;
        let parent_dir = self.resolve(parent)?;
        if !parent_dir.is_dir() {
            return Err(StoreError::NotFound(parent_level(level)));
        }
        let path = parent_dir.join(name);
        match fs::create_dir(&path) {
            Ok(()) => {
                info!(level = %level, path = %path.display(), "created directory");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(StoreError::AlreadyExists(level)),
            Err(e) => Err(e.into()),
        }
    }
}

fn parent_level(level: Level) -> Level {
    match level {
        Level::Project | Level::Subject => Level::Project,
        Level::Session => Level::Subject,
        Level::Datafile => Level::Session,
    }
}

/// Reject anything that is not a single, plain path segment.
pub(crate) fn validate_name(name: &str) -> Result<(), StoreError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn list_dirs(dir: &Path) -> Result<Vec<String>, StoreError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, ProjectStore) {
        let dir = tempfile::tempdir().expect("tmp dir");
        let store = ProjectStore::open(dir.path().join("Projects")).expect("open");
        (dir, store)
    }

    fn subject(id: &str) -> SubjectInfo {
        SubjectInfo::new(id, json!(70), json!("1.75"))
    }

    #[test]
    fn open_creates_root() {
        let (_dir, store) = store();
        assert!(store.root().is_dir());
        assert!(store.list_projects().unwrap().is_empty());
    }

    #[test]
    fn projects_are_listed_sorted_and_files_ignored() {
        let (_dir, store) = store();
        store.create_project("zeta").unwrap();
        store.create_project("alpha").unwrap();
        fs::write(store.root().join("notes.txt"), "x").unwrap();

        assert_eq!(store.list_projects().unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn duplicate_project_is_rejected() {
        let (_dir, store) = store();
        store.create_project("p").unwrap();
        assert!(matches!(
            store.create_project("p"),
            Err(StoreError::AlreadyExists(Level::Project))
        ));
    }

    #[test]
    fn create_subject_writes_info_file() {
        let (_dir, store) = store();
        store.create_project("p").unwrap();
        store.create_subject("p", &subject("S01")).unwrap();

        assert_eq!(store.list_subjects("p").unwrap(), vec!["S01"]);
        let info = store.subject_info("p", "S01").unwrap();
        assert_eq!(info, subject("S01"));

        let raw = fs::read_to_string(store.root().join("p/S01").join(SUBJECT_INFO_FILE)).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, json!({"subject_id": "S01", "weight": 70, "height": "1.75"}));
    }

    #[test]
    fn subject_under_missing_project_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.create_subject("ghost", &subject("S01")),
            Err(StoreError::NotFound(Level::Project))
        ));
        assert!(matches!(
            store.list_subjects("ghost"),
            Err(StoreError::NotFound(Level::Project))
        ));
    }

    #[test]
    fn full_hierarchy_round_trip() {
        let (_dir, store) = store();
        store.create_project("p").unwrap();
        store.create_subject("p", &subject("s")).unwrap();
        store.create_session("p", "s", "day1").unwrap();
        store.create_session("p", "s", "day0").unwrap();
        store.create_datafile("p", "s", "day1", "trial_03").unwrap();

        assert_eq!(store.list_sessions("p", "s").unwrap(), vec!["day0", "day1"]);
        assert_eq!(store.list_datafiles("p", "s", "day1").unwrap(), vec!["trial_03"]);
        assert!(store.list_datafiles("p", "s", "day0").unwrap().is_empty());
        assert!(matches!(
            store.create_datafile("p", "s", "day1", "trial_03"),
            Err(StoreError::AlreadyExists(Level::Datafile))
        ));
    }

    #[test]
    fn missing_levels_report_the_right_level() {
        let (_dir, store) = store();
        store.create_project("p").unwrap();
        assert!(matches!(
            store.list_sessions("p", "nobody"),
            Err(StoreError::NotFound(Level::Subject))
        ));
        assert!(matches!(
            store.create_session("p", "nobody", "x"),
            Err(StoreError::NotFound(Level::Subject))
        ));
        assert!(matches!(
            store.list_datafiles("p", "nobody", "x"),
            Err(StoreError::NotFound(Level::Session))
        ));
    }

    #[test]
    fn path_escapes_are_rejected() {
        let (_dir, store) = store();
        for bad in ["", ".", "..", "a/b", "..\\x"] {
            assert!(
                matches!(store.create_project(bad), Err(StoreError::InvalidName(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(matches!(
            store.list_subjects(".."),
            Err(StoreError::InvalidName(_))
        ));
    }

    #[test]
    fn ensure_relative_dir_creates_nested_path() {
        let (_dir, store) = store();
        let path = store.ensure_relative_dir("p/S01/day1/").unwrap();
        assert!(path.is_dir());
        assert!(path.ends_with("p/S01/day1"));
        // Existing directories are fine.
        store.ensure_relative_dir("p/S01").unwrap();
        assert!(matches!(
            store.ensure_relative_dir("p/../../etc"),
            Err(StoreError::InvalidName(_))
        ));
    }
}
