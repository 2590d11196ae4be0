use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// The on-disk copy of the most recently applied model state.
#[derive(Debug, Clone)]
pub struct WeightsFile {
    path: PathBuf,
}

impl WeightsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the file contents with `bytes`.
    ///
    /// Goes through a sibling `.tmp` file renamed over the target.
    pub fn store(&self, bytes: &[u8]) -> io::Result<()> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");

        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)
    }

    /// Reads the last stored snapshot.
    pub fn load(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }
}
