//! Artifact store: presence and contents of per-run output directories.
//!
//! The filesystem is the pipeline's only state store. Completeness of a
//! stage is judged by probing its artifact directory, so all probing goes
//! through the [`ArtifactStore`] trait and tests can substitute an in-memory
//! tree.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::registry::RunId;

/// One artifact area inside a run's directory subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Raw downloaded track messages.
    Bufr,
    /// Consolidated track file.
    Tracks,
    /// Track plots.
    TrackAnalysis,
    /// Per-storm wind field grids.
    WindFields,
    /// Per-storm, per-country impact files.
    Impacts,
    /// Impact plots and summaries.
    ImpactAnalysis,
    /// Finished report documents.
    Report,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 7] = [
        ArtifactKind::Bufr,
        ArtifactKind::Tracks,
        ArtifactKind::TrackAnalysis,
        ArtifactKind::WindFields,
        ArtifactKind::Impacts,
        ArtifactKind::ImpactAnalysis,
        ArtifactKind::Report,
    ];

    /// Directory name under the run root.
    pub fn dir_name(self) -> &'static str {
        match self {
            ArtifactKind::Bufr => "bufr",
            ArtifactKind::Tracks => "tracks",
            ArtifactKind::TrackAnalysis => "analysis_tracks",
            ArtifactKind::WindFields => "wind_fields",
            ArtifactKind::Impacts => "impacts",
            ArtifactKind::ImpactAnalysis => "analysis_impacts",
            ArtifactKind::Report => "report",
        }
    }
}

/// Read-only probe over a run's artifact directories.
///
/// A missing directory lists as empty: probing a hole is an audit answer,
/// not an IO failure. Errors are reserved for genuine IO problems.
pub trait ArtifactStore: Send + Sync {
    /// Whether the artifact directory itself exists.
    fn exists(&self, run: &RunId, kind: ArtifactKind) -> bool;

    /// Artifact filenames in the directory, sorted; empty if it is missing.
    fn list(&self, run: &RunId, kind: ArtifactKind) -> io::Result<Vec<String>>;

    /// Number of artifacts in the directory.
    fn count(&self, run: &RunId, kind: ArtifactKind) -> io::Result<usize> {
        Ok(self.list(run, kind)?.len())
    }

    /// Whether a specific artifact is present.
    fn has_file(&self, run: &RunId, kind: ArtifactKind, name: &str) -> bool {
        self.list(run, kind)
            .map(|files| files.iter().any(|f| f == name))
            .unwrap_or(false)
    }
}

/// Artifact store backed by the real working directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of one run.
    pub fn run_dir(&self, run: &RunId) -> PathBuf {
        self.root.join(run.as_str())
    }

    /// Directory of one artifact kind within a run.
    pub fn artifact_dir(&self, run: &RunId, kind: ArtifactKind) -> PathBuf {
        self.run_dir(run).join(kind.dir_name())
    }
}

impl ArtifactStore for FsStore {
    fn exists(&self, run: &RunId, kind: ArtifactKind) -> bool {
        self.artifact_dir(run, kind).is_dir()
    }

    fn list(&self, run: &RunId, kind: ArtifactKind) -> io::Result<Vec<String>> {
        let dir = self.artifact_dir(run, kind);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// In-memory artifact store for tests and dry runs.
///
/// Clones share the same tree, so a fake producer can hold a handle and
/// "write" artifacts that the checker then observes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<(RunId, ArtifactKind), Vec<String>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an (empty) artifact directory.
    pub fn create_dir(&self, run: &RunId, kind: ArtifactKind) {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .entry((run.clone(), kind))
            .or_default();
    }

    /// Adds one artifact, creating the directory if needed.
    pub fn add_file(&self, run: &RunId, kind: ArtifactKind, name: &str) {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .entry((run.clone(), kind))
            .or_default()
            .push(name.to_string());
    }
}

impl ArtifactStore for MemoryStore {
    fn exists(&self, run: &RunId, kind: ArtifactKind) -> bool {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .contains_key(&(run.clone(), kind))
    }

    fn list(&self, run: &RunId, kind: ArtifactKind) -> io::Result<Vec<String>> {
        let mut names = self
            .inner
            .lock()
            .expect("store lock poisoned")
            .get(&(run.clone(), kind))
            .cloned()
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }
}
