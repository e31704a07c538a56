use std::path::PathBuf;

use anyhow::Context;
use depot_filesystem::FileSystemRef;

/// Bundles shipped inside the application install, looked up by their output
/// file name.
pub struct EmbeddedStore {
  fs: FileSystemRef,
  root: PathBuf,
}

impl EmbeddedStore {
  pub fn new(fs: FileSystemRef, root: impl Into<PathBuf>) -> Self {
    EmbeddedStore {
      fs,
      root: root.into(),
    }
  }

  pub fn contains(&self, file_name: &str) -> bool {
    self.fs.is_file(&self.root.join(file_name))
  }

  pub fn read(&self, file_name: &str) -> anyhow::Result<Vec<u8>> {
    self
      .fs
      .read(&self.root.join(file_name))
      .with_context(|| format!("failed to read embedded file '{file_name}'"))
  }
}
