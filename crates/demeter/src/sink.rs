// ABOUTME: Destinations for rendered exports: a directory on disk, or memory.
// ABOUTME: Sinks take a filename and the finished text, nothing else.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::SweepError;

/// Where a rendered export ends up. Rendering happens before `save` is
/// called, so a sink only handles placement.
pub trait ExportSink {
    fn save(&mut self, filename: &str, content: &str) -> Result<(), SweepError>;
}

/// Writes each export as a file under one directory, creating it on demand.
pub struct DirSink {
    dir: PathBuf,
}

impl DirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl ExportSink for DirSink {
    fn save(&mut self, filename: &str, content: &str) -> Result<(), SweepError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            SweepError::sink(self.dir.display().to_string(), "Save", Some(e.into()))
        })?;
        let path = self.dir.join(filename);
        fs::write(&path, content)
            .map_err(|e| SweepError::sink(path.display().to_string(), "Save", Some(e.into())))?;
        debug!("saved {} bytes to {}", content.len(), path.display());
        Ok(())
    }
}

/// Collects exports in memory. Used by tests and by callers that post-process
/// the rendered text themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub saved: Vec<(String, String)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExportSink for MemorySink {
    fn save(&mut self, filename: &str, content: &str) -> Result<(), SweepError> {
        self.saved.push((filename.to_string(), content.to_string()));
        Ok(())
    }
}
