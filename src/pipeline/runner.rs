//! Stage runner: checks one stage of one run, optionally healing it.
//!
//! The runner never raises for ordinary pipeline conditions. Every way a
//! stage can end is an explicit [`StageOutcome`], and the controller decides
//! what each outcome means for the rest of the run. Only genuine IO
//! failures while probing escape as errors.

use thiserror::Error;
use tracing::info;

use crate::error::ProducerError;
use crate::pipeline::descriptor::{FinalStep, RunDescriptor};
use crate::pipeline::naming;
use crate::pipeline::stage::StageKind;
use crate::producers::StageProducers;
use crate::registry::RunId;
use crate::store::{ArtifactKind, ArtifactStore};

/// Errors that escape the stage runner's own handling.
#[derive(Debug, Error)]
pub enum StageError {
    /// Probing the artifact store failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How one stage of one run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Artifacts present, counters extracted, success flag set.
    Completed,
    /// The predecessor did not succeed; nothing recorded, root cause
    /// already captured when the predecessor failed.
    Skipped,
    /// The run legitimately stopped here with zero work to do.
    Stopped(FinalStep),
    /// Artifacts still missing after any attempted fix; recorded, and
    /// downstream stages will skip via their prerequisites.
    Incomplete,
    /// The producer failed during regeneration; recorded, and the rest of
    /// this run must not be processed.
    ProducerFailed,
}

/// Executes one stage against one run descriptor.
pub struct StageRunner<'a, S, P> {
    store: &'a S,
    producers: &'a P,
}

impl<'a, S: ArtifactStore, P: StageProducers> StageRunner<'a, S, P> {
    pub fn new(store: &'a S, producers: &'a P) -> Self {
        Self { store, producers }
    }

    /// Checks `stage` for the run, regenerating in fix mode, and mutates
    /// the descriptor with flags, counters and diagnostics.
    pub async fn run(
        &self,
        desc: &mut RunDescriptor,
        stage: StageKind,
        fix: bool,
    ) -> Result<StageOutcome, StageError> {
        if !desc.prerequisite_met(stage) {
            return Ok(StageOutcome::Skipped);
        }
        match stage {
            StageKind::Download => self.check_download(desc, fix).await,
            StageKind::TrackAnalysis => self.check_track_analysis(desc, fix).await,
            StageKind::WindFields => self.check_wind_fields(desc, fix).await,
            StageKind::Impacts => self.check_impacts(desc, fix).await,
            StageKind::ImpactAnalysis => self.check_impact_analysis(desc, fix).await,
            StageKind::Report => self.check_report(desc, fix).await,
        }
    }

    /// Invokes the stage's producer with `overwrite=true`, converting a
    /// producer failure into a recorded [`StageOutcome::ProducerFailed`].
    async fn regenerate(
        &self,
        desc: &mut RunDescriptor,
        stage: StageKind,
        run: &RunId,
    ) -> Result<(), StageOutcome> {
        info!(run = %run, stage = %stage, "regenerating missing artifacts");
        match self.producers.produce(stage, run, true).await {
            Ok(()) => Ok(()),
            Err(err) => {
                desc.push_error(stage_failure(stage, &err));
                Err(StageOutcome::ProducerFailed)
            }
        }
    }

    async fn check_download(
        &self,
        desc: &mut RunDescriptor,
        fix: bool,
    ) -> Result<StageOutcome, StageError> {
        let run = desc.run_id.clone();

        // a run the feed no longer offers cannot be re-downloaded
        if fix && desc.exists_remote && self.store.count(&run, ArtifactKind::Bufr)? == 0 {
            if let Err(outcome) = self.regenerate(desc, StageKind::Download, &run).await {
                return Ok(outcome);
            }
        }

        let files = self.store.list(&run, ArtifactKind::Bufr)?;
        if files.is_empty() {
            desc.push_error("no downloaded data found");
            return Ok(StageOutcome::Incomplete);
        }

        for file in &files {
            if !file.ends_with(naming::BUFR_EXTENSION) {
                desc.push_error(format!(
                    "unexpected non-{} download: {file}",
                    naming::BUFR_EXTENSION
                ));
            }
            if !file.contains(run.as_str()) {
                desc.push_error(format!(
                    "downloaded filename does not contain the run id {run}: {file}"
                ));
            }
            if !file.contains(naming::BUFR_MARKER) {
                desc.push_error(format!(
                    "downloaded filename does not contain '{}': {file}",
                    naming::BUFR_MARKER
                ));
            }
            match naming::storm_id(file) {
                Some(id) => desc.storm_ids.push(id.to_string()),
                None => desc.push_error(format!("cannot extract a storm id from: {file}")),
            }
        }
        desc.named_storms = desc
            .storm_ids
            .iter()
            .filter(|id| naming::is_named_storm(id))
            .cloned()
            .collect();
        desc.download_ok = true;

        if desc.named_storms.is_empty() {
            desc.final_step = Some(FinalStep::NoNamedStorms);
            return Ok(StageOutcome::Stopped(FinalStep::NoNamedStorms));
        }

        if fix && !self.store.has_file(&run, ArtifactKind::Tracks, naming::TRACKS_FILE) {
            if let Err(outcome) = self.regenerate(desc, StageKind::Download, &run).await {
                return Ok(outcome);
            }
        }
        if !self.store.has_file(&run, ArtifactKind::Tracks, naming::TRACKS_FILE) {
            desc.push_error(format!(
                "no track file {} found in {}/",
                naming::TRACKS_FILE,
                ArtifactKind::Tracks.dir_name()
            ));
            return Ok(StageOutcome::Incomplete);
        }
        desc.tracks_ok = true;
        Ok(StageOutcome::Completed)
    }

    async fn check_track_analysis(
        &self,
        desc: &mut RunDescriptor,
        fix: bool,
    ) -> Result<StageOutcome, StageError> {
        let run = desc.run_id.clone();
        if fix && self.store.count(&run, ArtifactKind::TrackAnalysis)? == 0 {
            if let Err(outcome) = self.regenerate(desc, StageKind::TrackAnalysis, &run).await {
                return Ok(outcome);
            }
        }
        if self.store.count(&run, ArtifactKind::TrackAnalysis)? == 0 {
            desc.push_error("no track plots found");
            return Ok(StageOutcome::Incomplete);
        }
        desc.track_analysis_ok = true;
        Ok(StageOutcome::Completed)
    }

    async fn check_wind_fields(
        &self,
        desc: &mut RunDescriptor,
        fix: bool,
    ) -> Result<StageOutcome, StageError> {
        let run = desc.run_id.clone();
        if fix && self.store.count(&run, ArtifactKind::WindFields)? == 0 {
            if let Err(outcome) = self.regenerate(desc, StageKind::WindFields, &run).await {
                return Ok(outcome);
            }
        }
        if self.store.count(&run, ArtifactKind::WindFields)? == 0 {
            desc.push_error("no wind fields calculated despite named storms");
            return Ok(StageOutcome::Incomplete);
        }
        desc.wind_fields_ok = true;
        Ok(StageOutcome::Completed)
    }

    async fn check_impacts(
        &self,
        desc: &mut RunDescriptor,
        fix: bool,
    ) -> Result<StageOutcome, StageError> {
        let run = desc.run_id.clone();

        // only a missing directory is missing work: an existing empty one
        // means the storms never produced a nonzero impact
        if fix && !self.store.exists(&run, ArtifactKind::Impacts) {
            if let Err(outcome) = self.regenerate(desc, StageKind::Impacts, &run).await {
                return Ok(outcome);
            }
        }

        let files = self.store.list(&run, ArtifactKind::Impacts)?;
        if files.is_empty() {
            desc.final_step = Some(FinalStep::NoImpacts);
            return Ok(StageOutcome::Stopped(FinalStep::NoImpacts));
        }

        for file in &files {
            if file.contains(naming::AFFECTED_MARKER) {
                desc.has_affected = true;
            }
            if file.contains(naming::DISPLACED_MARKER) {
                desc.has_displaced = true;
            }
            if desc.has_affected && desc.has_displaced {
                break;
            }
        }
        desc.impacts_ok = true;
        Ok(StageOutcome::Completed)
    }

    async fn check_impact_analysis(
        &self,
        desc: &mut RunDescriptor,
        fix: bool,
    ) -> Result<StageOutcome, StageError> {
        let run = desc.run_id.clone();
        if fix && self.store.count(&run, ArtifactKind::ImpactAnalysis)? == 0 {
            if let Err(outcome) = self.regenerate(desc, StageKind::ImpactAnalysis, &run).await {
                return Ok(outcome);
            }
        }
        if self.store.count(&run, ArtifactKind::ImpactAnalysis)? == 0 {
            desc.push_error("no impact plots found");
            return Ok(StageOutcome::Incomplete);
        }
        desc.impact_analysis_ok = true;
        Ok(StageOutcome::Completed)
    }

    async fn check_report(
        &self,
        desc: &mut RunDescriptor,
        fix: bool,
    ) -> Result<StageOutcome, StageError> {
        let run = desc.run_id.clone();
        if fix && !self.store.has_file(&run, ArtifactKind::Report, naming::REPORT_HTML) {
            if let Err(outcome) = self.regenerate(desc, StageKind::Report, &run).await {
                return Ok(outcome);
            }
        }
        if !self.store.has_file(&run, ArtifactKind::Report, naming::REPORT_HTML) {
            desc.push_error("no report found");
            return Ok(StageOutcome::Incomplete);
        }
        desc.report_ok = true;
        Ok(StageOutcome::Completed)
    }
}

fn stage_failure(stage: StageKind, err: &ProducerError) -> String {
    format!("{stage} regeneration failed: {err}")
}
