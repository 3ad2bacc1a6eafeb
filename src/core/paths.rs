use std::fs;
use std::io;
use std::path::PathBuf;

pub struct ProjectPaths {
    pub root: PathBuf,
    pub data: PathBuf,
    pub knowledge: PathBuf,
    pub vector_store: PathBuf,
    pub index_db: PathBuf,
}

impl ProjectPaths {
    pub fn from_root(root: PathBuf) -> Self {
        Self {
            data: root.join("data"),
            knowledge: root.join("data/knowledge.txt"),
            vector_store: root.join("db/vector_store"),
            index_db: root.join("db/vector_store/index.sqlite3"),
            root,
        }
    }

    /// Create `data/` and `db/vector_store/` if they are missing.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.data)?;
        fs::create_dir_all(&self.vector_store)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = ProjectPaths::from_root(PathBuf::from("/srv/kb"));
        assert_eq!(paths.knowledge, PathBuf::from("/srv/kb/data/knowledge.txt"));
        assert_eq!(
            paths.index_db,
            PathBuf::from("/srv/kb/db/vector_store/index.sqlite3")
        );
    }

    #[test]
    fn test_ensure_dirs_creates_missing() -> io::Result<()> {
        let tmp = tempfile::tempdir()?;
        let paths = ProjectPaths::from_root(tmp.path().to_path_buf());
        paths.ensure_dirs()?;
        assert!(paths.data.is_dir());
        assert!(paths.vector_store.is_dir());

        // Second call is a no-op
        paths.ensure_dirs()?;
        Ok(())
    }
}
