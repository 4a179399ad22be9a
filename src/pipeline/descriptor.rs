//! Per-run derived state.
//!
//! A [`RunDescriptor`] is rebuilt from scratch on every invocation by
//! probing the artifact tree; nothing in it survives process exit except
//! what the stage producers wrote to disk.

use crate::pipeline::stage::StageKind;
use crate::registry::RunId;

/// Stage at which a run legitimately stopped with zero work to do.
///
/// Distinct from failure: a forecast without named storms, or with storms
/// that never touch land, is complete, not broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalStep {
    /// The download contained no named storms.
    NoNamedStorms,
    /// Wind fields exist but no storm produced a nonzero impact.
    NoImpacts,
}

impl FinalStep {
    pub fn as_str(self) -> &'static str {
        match self {
            FinalStep::NoNamedStorms => "no_named_storms",
            FinalStep::NoImpacts => "no_impacts",
        }
    }
}

/// Derived state of one forecast run, rebuilt on every pass.
#[derive(Debug, Clone)]
pub struct RunDescriptor {
    pub run_id: RunId,
    /// Whether the run has a directory under the working root.
    pub exists_local: bool,
    /// Whether the remote feed still offers the run.
    pub exists_remote: bool,

    /// Raw track messages present. The report stage keys on this alone.
    pub download_ok: bool,
    /// Consolidated track file written; gates the analysis chain.
    pub tracks_ok: bool,
    pub track_analysis_ok: bool,
    pub wind_fields_ok: bool,
    pub impacts_ok: bool,
    pub impact_analysis_ok: bool,
    pub report_ok: bool,

    /// Storm identifiers extracted from the download filenames.
    pub storm_ids: Vec<String>,
    /// The subset of storm identifiers that are named storms.
    pub named_storms: Vec<String>,
    /// Any impact file reports an exposed population.
    pub has_affected: bool,
    /// Any impact file reports a displaced population.
    pub has_displaced: bool,

    pub final_step: Option<FinalStep>,
    /// Append-only diagnostics, in the order they were observed.
    pub errors: Vec<String>,
}

impl RunDescriptor {
    pub fn new(run_id: RunId, exists_local: bool, exists_remote: bool) -> Self {
        Self {
            run_id,
            exists_local,
            exists_remote,
            download_ok: false,
            tracks_ok: false,
            track_analysis_ok: false,
            wind_fields_ok: false,
            impacts_ok: false,
            impact_analysis_ok: false,
            report_ok: false,
            storm_ids: Vec::new(),
            named_storms: Vec::new(),
            has_affected: false,
            has_displaced: false,
            final_step: None,
            errors: Vec::new(),
        }
    }

    pub fn named_storm_count(&self) -> usize {
        self.named_storms.len()
    }

    /// Appends a diagnostic. Diagnostics are never removed.
    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Whether the stage this one consumes has succeeded.
    ///
    /// The analysis chain hangs off the consolidated track file; the report
    /// asks only for the raw download, so it can still be built degraded.
    pub fn prerequisite_met(&self, stage: StageKind) -> bool {
        match stage {
            StageKind::Download => true,
            StageKind::TrackAnalysis | StageKind::WindFields => self.tracks_ok,
            StageKind::Impacts => self.wind_fields_ok,
            StageKind::ImpactAnalysis => self.impacts_ok,
            StageKind::Report => self.download_ok,
        }
    }

    /// Whether the stage's own success flag is set.
    pub fn stage_ok(&self, stage: StageKind) -> bool {
        match stage {
            StageKind::Download => self.download_ok && self.tracks_ok,
            StageKind::TrackAnalysis => self.track_analysis_ok,
            StageKind::WindFields => self.wind_fields_ok,
            StageKind::Impacts => self.impacts_ok,
            StageKind::ImpactAnalysis => self.impact_analysis_ok,
            StageKind::Report => self.report_ok,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> RunDescriptor {
        RunDescriptor::new(RunId::parse("20250101000000").unwrap(), true, true)
    }

    #[test]
    fn test_new_descriptor_defaults_to_all_false() {
        let desc = descriptor();
        for stage in StageKind::ALL {
            assert!(!desc.stage_ok(stage));
        }
        assert!(desc.errors.is_empty());
        assert!(desc.final_step.is_none());
    }

    #[test]
    fn test_prerequisites_follow_the_track_file() {
        let mut desc = descriptor();
        assert!(desc.prerequisite_met(StageKind::Download));
        assert!(!desc.prerequisite_met(StageKind::TrackAnalysis));
        assert!(!desc.prerequisite_met(StageKind::WindFields));

        desc.tracks_ok = true;
        assert!(desc.prerequisite_met(StageKind::TrackAnalysis));
        assert!(desc.prerequisite_met(StageKind::WindFields));
        assert!(!desc.prerequisite_met(StageKind::Impacts));

        desc.wind_fields_ok = true;
        assert!(desc.prerequisite_met(StageKind::Impacts));
        desc.impacts_ok = true;
        assert!(desc.prerequisite_met(StageKind::ImpactAnalysis));
    }

    #[test]
    fn test_report_prerequisite_is_raw_download_only() {
        let mut desc = descriptor();
        desc.download_ok = true;
        // the whole analysis chain is down, the report still qualifies
        assert!(desc.prerequisite_met(StageKind::Report));
        assert!(!desc.prerequisite_met(StageKind::TrackAnalysis));
    }

    #[test]
    fn test_errors_grow_monotonically() {
        let mut desc = descriptor();
        desc.push_error("first");
        desc.push_error("second");
        assert_eq!(desc.errors, vec!["first", "second"]);
    }

    #[test]
    fn test_final_step_labels() {
        assert_eq!(FinalStep::NoNamedStorms.as_str(), "no_named_storms");
        assert_eq!(FinalStep::NoImpacts.as_str(), "no_impacts");
    }
}
