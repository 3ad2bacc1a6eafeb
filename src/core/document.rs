use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::error::SetupError;

/// A unit of knowledge-base text and the file it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub source: PathBuf,
    pub content: String,
}

/// Read the knowledge file.
///
/// A file with no non-whitespace text yields no documents.
pub fn load_documents(path: &Path) -> Result<Vec<Document>, SetupError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(SetupError::KnowledgeNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    Ok(vec![Document {
        source: path.to_path_buf(),
        content,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("knowledge.txt");
        let err = load_documents(&path).unwrap_err();
        assert!(matches!(err, SetupError::KnowledgeNotFound(p) if p == path));
    }

    #[test]
    fn test_loads_single_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Arctic terns migrate from pole to pole.").unwrap();

        let docs = load_documents(file.path()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source, file.path());
        assert!(docs[0].content.contains("Arctic terns"));
    }

    #[test]
    fn test_empty_file_yields_nothing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "  \n\n ").unwrap();
        assert!(load_documents(file.path()).unwrap().is_empty());
    }
}
