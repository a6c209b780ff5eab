//! File-backed configuration storage. Each component (the notary, each
//! security module) owns exactly one file under a caller-chosen directory and
//! treats its contents as a value: load the whole text, mutate an in-memory
//! copy, write the whole text back.

use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One configuration file. Writes are whole-file rewrites, made atomic by
/// writing a sibling temp file and renaming it into place.
#[derive(Debug, Clone, getset::Getters)]
#[getset(get = "pub")]
pub struct ConfigStore {
    /// The directory holding the configuration files.
    directory: PathBuf,
    /// This component's file name within the directory.
    filename: String,
}

fn storage_error(path: &Path, cause: std::io::Error) -> Error {
    Error::Storage {
        path: path.to_path_buf(),
        cause,
    }
}

impl ConfigStore {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(directory: P, filename: S) -> Self {
        Self {
            directory: directory.into(),
            filename: filename.into(),
        }
    }

    /// The full path of the configuration file.
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }

    /// Whether the configuration file currently exists.
    pub fn exists(&self) -> bool {
        self.path().is_file()
    }

    /// Read the entire configuration text. A missing file is not an error:
    /// the caller initializes a fresh default and stores it before
    /// proceeding.
    pub fn load(&self) -> Result<Option<String>> {
        let path = self.path();
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(cause) if cause.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(cause) => Err(storage_error(&path, cause)),
        }
    }

    /// Atomically overwrite the configuration with `text`. The directory is
    /// created on first use. Configuration may hold private key material, so
    /// the file is readable by the owner only.
    pub fn store(&self, text: &str) -> Result<()> {
        let path = self.path();
        fs::create_dir_all(&self.directory).map_err(|cause| storage_error(&path, cause))?;
        let staging = self.directory.join(format!("{}.tmp", self.filename));
        let result = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&staging)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                file.set_permissions(fs::Permissions::from_mode(0o600))?;
            }
            file.write_all(text.as_bytes())?;
            file.sync_all()?;
            fs::rename(&staging, &path)
        })();
        result.map_err(|cause| {
            let _ = fs::remove_file(&staging);
            storage_error(&path, cause)
        })
    }

    /// Delete the configuration file. Deleting a file that does not exist is
    /// fine; the component is simply uninitialized either way.
    pub fn delete(&self) -> Result<()> {
        let path = self.path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(cause) if cause.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(cause) => Err(storage_error(&path, cause)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path(), "notary.bali");
        assert_eq!(store.load().unwrap(), None);
        assert!(!store.exists());
    }

    #[test]
    fn store_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path(), "notary.bali");
        store.store("[\n    $state: $limited\n]").unwrap();
        assert!(store.exists());
        assert_eq!(
            store.load().unwrap().unwrap(),
            "[\n    $state: $limited\n]"
        );

        // overwrite replaces the whole file
        store.store("[:]").unwrap();
        assert_eq!(store.load().unwrap().unwrap(), "[:]");
    }

    #[test]
    fn store_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("deeply").join("nested");
        let store = ConfigStore::new(&nested, "ssm-v2.bali");
        store.store("[:]").unwrap();
        assert!(store.exists());
    }

    #[test]
    fn store_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path(), "notary.bali");
        store.store("[:]").unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("notary.bali")]);
    }

    #[cfg(unix)]
    #[test]
    fn store_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path(), "ssm-v2.bali");
        store.store("[:]").unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path(), "notary.bali");
        store.store("[:]").unwrap();
        store.delete().unwrap();
        assert!(!store.exists());
        // a second delete is a quiet no-op
        store.delete().unwrap();
    }
}
