use anyhow::{Context, Result};
use fs2::FileExt;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Abstraction over file system operations for testing
pub trait FileSystem: Send + Sync {
    /// Read file contents as a string
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Replace file contents (atomically where the platform allows)
    fn write(&self, path: &Path, contents: &str) -> Result<()>;

    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if a path is a file
    fn is_file(&self, path: &Path) -> bool;

    /// Check if a path is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Create a directory and all parent directories
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read-modify-write `path` while holding an exclusive lock on it.
    ///
    /// `update` receives the current contents (empty for a new file) and
    /// returns the new contents, or `None` to leave the file as it is.
    fn update_locked(
        &self,
        path: &Path,
        update: &mut dyn FnMut(&str) -> Result<Option<String>>,
    ) -> Result<()>;
}

/// Real file system implementation using std::fs
#[derive(Debug, Default, Clone)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(contents.as_bytes())?;
        tmp.persist(path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        Ok(std::fs::create_dir_all(path)?)
    }

    fn update_locked(
        &self,
        path: &Path,
        update: &mut dyn FnMut(&str) -> Result<Option<String>>,
    ) -> Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("Failed to lock {}", path.display()))?;

        let mut current = String::new();
        file.read_to_string(&mut current)?;

        if let Some(next) = update(&current)? {
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(next.as_bytes())?;
            file.sync_all()?;
        }

        // Lock is released when the handle closes
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_write_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("App.vue");
        std::fs::write(&path, "old").unwrap();

        let fs = RealFileSystem;
        fs.write(&path, "new").unwrap();
        assert_eq!(fs.read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_real_update_locked_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zh.json");

        let fs = RealFileSystem;
        fs.update_locked(&path, &mut |current| {
            assert!(current.is_empty());
            Ok(Some("{}\n".to_string()))
        })
        .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}\n");

        fs.update_locked(&path, &mut |_| Ok(None)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}\n");
    }

    #[test]
    fn test_in_memory_file_system() {
        use mock::InMemoryFileSystem;

        let fs = InMemoryFileSystem::new();
        fs.add_file("src/views/Home.vue", "<template></template>");

        assert!(fs.exists(Path::new("src/views/Home.vue")));
        assert!(fs.is_file(Path::new("src/views/Home.vue")));
        assert!(fs.is_dir(Path::new("src/views")));
        assert!(fs.is_dir(Path::new("src")));

        fs.write(Path::new("src/new.ts"), "const a = 1;").unwrap();
        assert_eq!(
            fs.read_to_string(Path::new("src/new.ts")).unwrap(),
            "const a = 1;"
        );
        assert!(fs.read_to_string(Path::new("missing.ts")).is_err());
    }
}
