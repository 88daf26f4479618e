//! Persistence collaborator for session material.
//!
//! Storage is a single-slot byte blob; the store never interprets the
//! contents. The default keeps sessions in process memory; `FileStorage`
//! survives restarts.

use std::io;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

/// Where serialized session bytes live between calls (and, for persistent
/// implementations, between process runs).
pub trait SessionStorage: Send + Sync {
    /// Fetch the stored bytes, if any. Unreadable state is treated as absent.
    fn get(&self) -> Option<Vec<u8>>;

    /// Replace the stored bytes.
    fn set(&self, bytes: &[u8]) -> io::Result<()>;

    /// Delete the stored bytes. Deleting nothing is not an error.
    fn clear(&self) -> io::Result<()>;
}

/// In-process storage; sessions do not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: RwLock<Option<Vec<u8>>>,
}

impl SessionStorage for MemoryStorage {
    fn get(&self) -> Option<Vec<u8>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, bytes: &[u8]) -> io::Result<()> {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(bytes.to_vec());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Single-file storage with restrictive permissions on Unix.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStorage for FileStorage {
    fn get(&self) -> Option<Vec<u8>> {
        std::fs::read(&self.path).ok()
    }

    fn set(&self, bytes: &[u8]) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, bytes)?;

        // The blob holds key material
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
