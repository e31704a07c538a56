use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

/// In-memory file-system for testing
pub mod in_memory_file_system;

/// File-system implementation using std::fs
pub mod os_file_system;

pub use in_memory_file_system::InMemoryFileSystem;
pub use os_file_system::OsFileSystem;

/// FileSystem abstraction instance
///
/// This should be `OsFileSystem` for non-testing environments and
/// `InMemoryFileSystem` for testing.
pub type FileSystemRef = Arc<dyn FileSystem + Send + Sync>;

/// Trait abstracting the file-system operations the cache and manifest
/// stores perform.
#[mockall::automock]
pub trait FileSystem: std::fmt::Debug {
  fn create_dir_all(&self, path: &Path) -> std::io::Result<()>;
  fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;
  fn read_to_string(&self, path: &Path) -> std::io::Result<String>;
  fn write(&self, path: &Path, contents: &[u8]) -> std::io::Result<()>;
  fn remove_file(&self, path: &Path) -> std::io::Result<()>;
  fn remove_dir_all(&self, path: &Path) -> std::io::Result<()>;
  fn is_file(&self, path: &Path) -> bool;
  fn is_dir(&self, path: &Path) -> bool;

  fn file_size(&self, path: &Path) -> std::io::Result<u64> {
    self.read(path).map(|contents| contents.len() as u64)
  }

  fn cwd(&self) -> std::io::Result<PathBuf> {
    Err(std::io::Error::other("Not implemented: FileSystem::cwd"))
  }
}
