use lagoon_core::{DownloadFailure, DownloadSink, EncodedImage};
use std::path::{Path, PathBuf};

/// Writes exported images into a directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectoryDownloadSink {
    dir: PathBuf,
}

impl DirectoryDownloadSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectoryDownloadSink {
    fn save(&self, image: &EncodedImage, file_name: &str) -> Result<(), DownloadFailure> {
        let failure = |err: std::io::Error| DownloadFailure {
            file_name: file_name.to_string(),
            message: err.to_string(),
        };
        std::fs::create_dir_all(&self.dir).map_err(failure)?;
        let path = self.dir.join(file_name);
        std::fs::write(&path, &image.bytes).map_err(failure)?;
        tracing::debug!(path = %path.display(), bytes = image.bytes.len(), "wrote export");
        Ok(())
    }
}
