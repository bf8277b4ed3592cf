use std::path::{Path, PathBuf};

/// Identity of a subject: the CSV file's basename minus extension.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_stem()
            .and_then(|s| s.to_str())
            .map(|s| SubjectId(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A discovered subject CSV file: its path and derived identity.
#[derive(Debug, Clone)]
pub struct SubjectFile {
    pub path: PathBuf,
    pub id: SubjectId,
}

impl SubjectFile {
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let id = SubjectId::from_path(&path)?;
        Some(Self { path, id })
    }
}

/// Enumerate `*.csv` entries (case-sensitive, non-recursive) in `data_dir`.
pub fn discover_subjects(data_dir: &Path) -> std::io::Result<Vec<SubjectFile>> {
    let mut subjects = Vec::new();
    for entry in std::fs::read_dir(data_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        if let Some(subject) = SubjectFile::from_path(path) {
            subjects.push(subject);
        }
    }
    subjects.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(subjects)
}
