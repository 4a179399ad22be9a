//! The six pipeline stages and their dependency graph.

use std::fmt;

use crate::store::ArtifactKind;

/// One step of the six-step pipeline, in fixed execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Download,
    TrackAnalysis,
    WindFields,
    Impacts,
    ImpactAnalysis,
    Report,
}

impl StageKind {
    /// Execution order of the stages within one run.
    pub const ALL: [StageKind; 6] = [
        StageKind::Download,
        StageKind::TrackAnalysis,
        StageKind::WindFields,
        StageKind::Impacts,
        StageKind::ImpactAnalysis,
        StageKind::Report,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StageKind::Download => "download",
            StageKind::TrackAnalysis => "track_analysis",
            StageKind::WindFields => "wind_fields",
            StageKind::Impacts => "impacts",
            StageKind::ImpactAnalysis => "impact_analysis",
            StageKind::Report => "report",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        StageKind::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Artifact area this stage writes into.
    pub fn artifact_kind(self) -> ArtifactKind {
        match self {
            StageKind::Download => ArtifactKind::Bufr,
            StageKind::TrackAnalysis => ArtifactKind::TrackAnalysis,
            StageKind::WindFields => ArtifactKind::WindFields,
            StageKind::Impacts => ArtifactKind::Impacts,
            StageKind::ImpactAnalysis => ArtifactKind::ImpactAnalysis,
            StageKind::Report => ArtifactKind::Report,
        }
    }

    /// The stage whose output this stage consumes.
    ///
    /// The graph is intentionally asymmetric: the report consumes only the
    /// raw download, so a degraded report can still be produced when the
    /// analysis chain fails.
    pub fn predecessor(self) -> Option<StageKind> {
        match self {
            StageKind::Download => None,
            StageKind::TrackAnalysis | StageKind::WindFields | StageKind::Report => {
                Some(StageKind::Download)
            }
            StageKind::Impacts => Some(StageKind::WindFields),
            StageKind::ImpactAnalysis => Some(StageKind::Impacts),
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
