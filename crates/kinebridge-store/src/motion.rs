//! Motion-capture exports.
//!
//! Files are tab-separated.  The first [`HEADER_LINES`] lines are free-form
//! metadata, the next line holds the column names, and every following
//! non-blank line is one sample.  Only [`MOTION_COLUMNS`] are extracted.

use std::fs;
use std::ops::Index;
use std::path::PathBuf;

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

use crate::error::StoreError;
use crate::projects::validate_name;

/// Metadata lines preceding the column header.
pub const HEADER_LINES: usize = 4;

/// Columns extracted from every file, all of which must be present.
pub const MOTION_COLUMNS: [&str; 7] = [
    "pelvis_tx",
    "pelvis_ty",
    "pelvis_tz",
    "knee_angle_r",
    "knee_angle_l",
    "ankle_angle_r",
    "ankle_angle_l",
];

/// Extracted columns in [`MOTION_COLUMNS`] order.  Cells that are not
/// numbers become `None`.
///
/// Serialises as a JSON object `{column: [samples…]}` whose keys keep that
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionColumns {
    columns: Vec<(String, Vec<Option<f64>>)>,
}

impl MotionColumns {
    pub fn get(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, samples)| samples.as_slice())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Number of samples per column.
    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, |(_, samples)| samples.len())
    }
}

impl Index<&str> for MotionColumns {
    type Output = [Option<f64>];

    fn index(&self, name: &str) -> &Self::Output {
        match self.get(name) {
            Some(samples) => samples,
            None => panic!("no motion column named {name:?}"),
        }
    }
}

impl Serialize for MotionColumns {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, samples) in &self.columns {
            map.serialize_entry(name, samples)?;
        }
        map.end()
    }
}

/// Reads motion files from a single flat directory.
#[derive(Debug, Clone)]
pub struct MotionFileReader {
    dir: PathBuf,
}

impl MotionFileReader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// Names of the regular files in the data directory, sorted.
    pub fn list_filenames(&self) -> Result<Vec<String>, StoreError> {
        if !self.dir.is_dir() {
            return Err(StoreError::DirectoryMissing(self.dir.clone()));
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Load `filename` and extract [`MOTION_COLUMNS`].
    pub fn read_columns(&self, filename: &str) -> Result<MotionColumns, StoreError> {
        validate_name(filename)?;
        let path = self.dir.join(filename);
        if !path.is_file() {
            return Err(StoreError::FileNotFound(filename.to_string()));
        }
        let text = fs::read_to_string(&path)?;
        let columns = parse_columns(&text)?;
        debug!(
            file = %filename,
            rows = columns.rows(),
            "motion file parsed"
        );
        Ok(columns)
    }
}

/// Extract [`MOTION_COLUMNS`] from the text of a motion file.
pub fn parse_columns(text: &str) -> Result<MotionColumns, StoreError> {
    let mut lines = text.lines().skip(HEADER_LINES);
    let header: Vec<&str> = lines
        .next()
        .map(|h| h.split('\t').map(str::trim).collect())
        .unwrap_or_default();

    let mut indices = Vec::with_capacity(MOTION_COLUMNS.len());
    let mut missing = Vec::new();
    for name in MOTION_COLUMNS {
        match header.iter().position(|h| *h == name) {
            Some(i) => indices.push((name, i)),
            None => missing.push(name.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(StoreError::MissingColumns(missing));
    }

    let mut columns: Vec<(String, Vec<Option<f64>>)> = indices
        .iter()
        .map(|(name, _)| (name.to_string(), Vec::new()))
        .collect();

    for line in lines.filter(|l| !l.trim().is_empty()) {
        let cells: Vec<&str> = line.split('\t').collect();
        for ((_, i), (_, samples)) in indices.iter().zip(columns.iter_mut()) {
            let value = cells
                .get(*i)
                .and_then(|c| c.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite());
            samples.push(value);
        }
    }
    Ok(MotionColumns { columns })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Coordinates\n\
        version=1\n\
        nRows=3\n\
        endheader\n\
        time\tpelvis_tx\tpelvis_ty\tpelvis_tz\thip_flexion_r\tknee_angle_r\tknee_angle_l\tankle_angle_r\tankle_angle_l\n\
        0.00\t0.1\t0.9\t-0.05\t12.0\t-5.5\t-4.0\t2.0\t1.5\n\
        0.01\t0.11\t0.91\t-0.04\t12.5\t-6.0\t-4.2\t2.1\t1.4\n\
        \n\
        0.02\t0.12\t0.92\t-0.03\t13.0\t\t-4.4\t2.2\t1.3\n";

    #[test]
    fn parse_extracts_named_columns_only() {
        let cols = parse_columns(SAMPLE).unwrap();
        assert_eq!(cols.len(), MOTION_COLUMNS.len());
        assert!(!cols.contains_key("hip_flexion_r"));
        assert!(!cols.contains_key("time"));
        assert_eq!(cols["pelvis_tx"], vec![Some(0.1), Some(0.11), Some(0.12)]);
        assert_eq!(cols["ankle_angle_l"], vec![Some(1.5), Some(1.4), Some(1.3)]);
    }

    #[test]
    fn empty_cells_become_none() {
        let cols = parse_columns(SAMPLE).unwrap();
        assert_eq!(cols["knee_angle_r"], vec![Some(-5.5), Some(-6.0), None]);
    }

    #[test]
    fn missing_columns_are_reported() {
        let text = "a\nb\nc\nd\npelvis_tx\tpelvis_ty\n1\t2\n";
        match parse_columns(text) {
            Err(StoreError::MissingColumns(missing)) => {
                assert!(missing.contains(&"knee_angle_r".to_string()));
                assert!(!missing.contains(&"pelvis_tx".to_string()));
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn too_short_file_misses_every_column() {
        assert!(matches!(
            parse_columns("only\nthree\nlines\n"),
            Err(StoreError::MissingColumns(m)) if m.len() == MOTION_COLUMNS.len()
        ));
    }

    #[test]
    fn reader_lists_files_and_reads_columns() {
        let dir = tempfile::tempdir().expect("tmp dir");
        fs::write(dir.path().join("walk.mot"), SAMPLE).unwrap();
        fs::write(dir.path().join("a_run.mot"), SAMPLE).unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();

        let reader = MotionFileReader::new(dir.path());
        assert_eq!(reader.list_filenames().unwrap(), vec!["a_run.mot", "walk.mot"]);

        let cols = reader.read_columns("walk.mot").unwrap();
        assert_eq!(cols["pelvis_ty"].len(), 3);
    }

    #[test]
    fn reader_errors() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let reader = MotionFileReader::new(dir.path());
        assert!(matches!(
            reader.read_columns("absent.mot"),
            Err(StoreError::FileNotFound(_))
        ));
        assert!(matches!(
            reader.read_columns("../etc/passwd"),
            Err(StoreError::InvalidName(_))
        ));

        let missing = MotionFileReader::new(dir.path().join("nope"));
        assert!(matches!(
            missing.list_filenames(),
            Err(StoreError::DirectoryMissing(_))
        ));
    }

    #[test]
    fn columns_keep_declared_order() {
        let cols = parse_columns(SAMPLE).unwrap();
        assert!(cols.names().eq(MOTION_COLUMNS));
        assert_eq!(cols.rows(), 3);

        let text = serde_json::to_string(&cols).unwrap();
        let positions: Vec<usize> = MOTION_COLUMNS
            .iter()
            .map(|name| text.find(&format!("\"{name}\"")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{text}");
    }

    #[test]
    fn columns_serialise_as_json_object_of_arrays() {
        let cols = parse_columns(SAMPLE).unwrap();
        let value = serde_json::to_value(&cols).unwrap();
        assert_eq!(value["knee_angle_r"][2], serde_json::Value::Null);
        assert_eq!(value["pelvis_tz"][0], serde_json::json!(-0.05));
    }
}
