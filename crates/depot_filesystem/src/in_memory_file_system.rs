use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use parking_lot::RwLock;

use crate::FileSystem;

/// In memory implementation of a file-system entry
#[derive(Debug)]
enum InMemoryFileSystemEntry {
  File { contents: Vec<u8> },
  Directory,
}

/// In memory implementation of the `FileSystem` trait, for testing purposes.
#[derive(Debug, Default)]
pub struct InMemoryFileSystem {
  files: RwLock<HashMap<PathBuf, InMemoryFileSystemEntry>>,
}

impl InMemoryFileSystem {
  pub fn new() -> Self {
    Self::default()
  }
}

impl FileSystem for InMemoryFileSystem {
  fn create_dir_all(&self, path: &Path) -> io::Result<()> {
    let mut files = self.files.write();
    let mut current = PathBuf::new();
    for component in path.components() {
      current.push(component);
      files
        .entry(current.clone())
        .or_insert(InMemoryFileSystemEntry::Directory);
    }
    Ok(())
  }

  fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
    let files = self.files.read();
    match files.get(path) {
      Some(InMemoryFileSystemEntry::File { contents }) => Ok(contents.clone()),
      Some(InMemoryFileSystemEntry::Directory) => Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        "Path is a directory",
      )),
      None => Err(io::Error::new(io::ErrorKind::NotFound, "File not found")),
    }
  }

  fn read_to_string(&self, path: &Path) -> io::Result<String> {
    let bytes = self.read(path)?;
    String::from_utf8(bytes).map_err(|_| io::Error::other("Unable to read file as string"))
  }

  fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
      self.create_dir_all(parent)?;
    }
    let mut files = self.files.write();
    files.insert(
      path.to_path_buf(),
      InMemoryFileSystemEntry::File {
        contents: contents.to_vec(),
      },
    );
    Ok(())
  }

  fn remove_file(&self, path: &Path) -> io::Result<()> {
    let mut files = self.files.write();
    match files.remove(path) {
      Some(InMemoryFileSystemEntry::File { .. }) => Ok(()),
      Some(entry @ InMemoryFileSystemEntry::Directory) => {
        files.insert(path.to_path_buf(), entry);
        Err(io::Error::new(
          io::ErrorKind::InvalidInput,
          "Path is a directory",
        ))
      }
      None => Err(io::Error::new(io::ErrorKind::NotFound, "File not found")),
    }
  }

  fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
    let mut files = self.files.write();
    files.retain(|existing, _| !existing.starts_with(path));
    Ok(())
  }

  fn is_file(&self, path: &Path) -> bool {
    matches!(
      self.files.read().get(path),
      Some(InMemoryFileSystemEntry::File { .. })
    )
  }

  fn is_dir(&self, path: &Path) -> bool {
    matches!(
      self.files.read().get(path),
      Some(InMemoryFileSystemEntry::Directory)
    )
  }

  fn file_size(&self, path: &Path) -> io::Result<u64> {
    self.read(path).map(|contents| contents.len() as u64)
  }
}
