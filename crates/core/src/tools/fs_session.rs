//! # Filesystem Sessions
//!
//! Generated documents live under a single output root and are addressed by
//! bare filename. A session is opened per run and held until the run
//! completes, fails or is evicted.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{PipelineError, PipelineResult};

/// Factory for sessions over one output root
#[derive(Debug, Clone)]
pub struct FsTool {
    root: PathBuf,
    connect_timeout: Duration,
    active: Arc<AtomicUsize>,
}

impl FsTool {
    pub fn new(root: impl Into<PathBuf>, connect_timeout: Duration) -> Self {
        Self {
            root: root.into(),
            connect_timeout,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Open a session, creating the output root if needed
    pub async fn connect(&self) -> PipelineResult<FsSession> {
        let root = self.root.clone();
        match tokio::time::timeout(self.connect_timeout, tokio::fs::create_dir_all(&root)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(PipelineError::Tool(format!(
                    "cannot open output directory {}: {}",
                    root.display(),
                    e
                )))
            }
            Err(_) => {
                return Err(PipelineError::Tool(format!(
                    "timed out after {:?} opening {}",
                    self.connect_timeout,
                    root.display()
                )))
            }
        }

        self.active.fetch_add(1, Ordering::SeqCst);
        let session = FsSession {
            id: uuid::Uuid::new_v4().to_string(),
            root,
            active: self.active.clone(),
        };
        tracing::debug!(session = %session.id, "Filesystem session opened");
        Ok(session)
    }

    /// Sessions currently held open
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// An open session over the output root
///
/// Dropping the session releases it; [`FsSession::close`] does the same
/// explicitly.
#[derive(Debug)]
pub struct FsSession {
    id: String,
    root: PathBuf,
    active: Arc<AtomicUsize>,
}

impl FsSession {
    pub async fn write_file(&self, filename: &str, content: &str) -> PipelineResult<()> {
        let path = self.resolve(filename)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| PipelineError::Tool(format!("cannot write {}: {}", filename, e)))
    }

    pub async fn read_file(&self, filename: &str) -> PipelineResult<String> {
        let path = self.resolve(filename)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| PipelineError::Tool(format!("cannot read {}: {}", filename, e)))
    }

    /// Release the session
    pub fn close(self) {
        tracing::debug!(session = %self.id, "Filesystem session closed");
    }

    fn resolve(&self, filename: &str) -> PipelineResult<PathBuf> {
        validate_filename(filename)?;
        Ok(self.root.join(filename))
    }
}

impl Drop for FsSession {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Only bare filenames are addressable
pub fn validate_filename(filename: &str) -> PipelineResult<()> {
    let trimmed = filename.trim();
    if trimmed.is_empty()
        || trimmed != filename
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
        || filename.contains('\0')
    {
        return Err(PipelineError::Tool(format!(
            "invalid document name '{}'",
            filename
        )));
    }
    Ok(())
}
