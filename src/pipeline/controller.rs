//! Pipeline controller: sequences stages per run and runs per batch.
//!
//! The controller owns the resilience properties of the traversal. Within a
//! run the first stage-terminating failure stops that run's remaining
//! stages; across runs a defect in one run's data never blocks the rest of
//! the batch. Audit mode and fix mode are the same traversal with a single
//! boolean toggle.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{FeedError, ProducerError};
use crate::feed::ForecastFeed;
use crate::index::{IndexBuilder, IndexError};
use crate::pipeline::audit::{self, AuditError, AUDIT_FILE};
use crate::pipeline::descriptor::RunDescriptor;
use crate::pipeline::naming;
use crate::pipeline::runner::{StageOutcome, StageRunner};
use crate::pipeline::stage::StageKind;
use crate::producers::StageProducers;
use crate::registry::{RunId, RunRegistry};
use crate::store::{ArtifactKind, ArtifactStore};

/// Errors that can occur during batch operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The remote feed could not be listed; the batch cannot be judged.
    #[error("forecast feed error: {0}")]
    Feed(#[from] FeedError),

    /// A producer failed outside the runner's catch boundary.
    #[error("producer error: {0}")]
    Producer(#[from] ProducerError),

    /// Index rebuild failed in a context where it is fatal.
    #[error("index rebuild error: {0}")]
    Index(#[from] IndexError),

    /// Writing the audit table failed.
    #[error("audit table error: {0}")]
    Audit(#[from] AuditError),

    /// IO error while probing artifacts.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Owns the stage chain and drives it over every known run.
pub struct PipelineController<S, P> {
    config: Config,
    store: S,
    producers: P,
    registry: RunRegistry,
    index: IndexBuilder,
}

impl<S: ArtifactStore, P: StageProducers> PipelineController<S, P> {
    pub fn new(config: Config, store: S, producers: P) -> Self {
        let registry = RunRegistry::new(config.working_dir.clone());
        let index = IndexBuilder::new(config.working_dir.clone(), config.pandoc_bin.clone());
        Self {
            config,
            store,
            producers,
            registry,
            index,
        }
    }

    /// Checks (and in fix mode heals) every known run, writes the audit
    /// table, and in fix mode rebuilds the index once.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Feed` if the remote listing is unavailable —
    /// without it, completeness cannot be judged. Per-run failures never
    /// surface here; they are rows in the returned table.
    pub async fn check_outputs(
        &self,
        feed: &dyn ForecastFeed,
        fix: bool,
    ) -> Result<Vec<RunDescriptor>, PipelineError> {
        let remote = self.registry.remote_runs(feed).await?;
        let local = self.registry.local_runs();
        info!(
            remote = remote.len(),
            local = local.len(),
            fix,
            "enumerated forecast runs"
        );

        let all: BTreeSet<RunId> = remote.union(&local).cloned().collect();
        let mut rows = Vec::with_capacity(all.len());
        for run in &all {
            info!(run = %run, "checking forecast run");
            rows.push(
                self.process_run(run, local.contains(run), remote.contains(run), fix)
                    .await,
            );
        }

        if fix {
            if let Err(err) = self.index.rebuild().await {
                error!(error = %err, "index rebuild failed");
            }
        }

        std::fs::create_dir_all(&self.config.working_dir)?;
        let path = self.config.working_dir.join(AUDIT_FILE);
        audit::write_audit_table(&path, &rows)?;
        info!(path = %path.display(), runs = rows.len(), "audit table written");
        Ok(rows)
    }

    /// Walks one run through the six stages in fixed order.
    ///
    /// Never fails: every defect ends up in the returned descriptor.
    pub async fn process_run(
        &self,
        run_id: &RunId,
        exists_local: bool,
        exists_remote: bool,
        fix: bool,
    ) -> RunDescriptor {
        let mut desc = RunDescriptor::new(run_id.clone(), exists_local, exists_remote);
        let runner = StageRunner::new(&self.store, &self.producers);

        for stage in StageKind::ALL {
            match runner.run(&mut desc, stage, fix).await {
                Ok(StageOutcome::Completed) => debug!(run = %run_id, %stage, "stage complete"),
                Ok(StageOutcome::Skipped) => debug!(run = %run_id, %stage, "prerequisite unmet, skipping"),
                Ok(StageOutcome::Incomplete) => debug!(run = %run_id, %stage, "artifacts missing"),
                Ok(StageOutcome::Stopped(step)) => {
                    info!(run = %run_id, %stage, reason = step.as_str(), "run stopped with nothing to do");
                }
                Ok(StageOutcome::ProducerFailed) => {
                    warn!(run = %run_id, %stage, "producer failed, abandoning remaining stages for this run");
                    break;
                }
                Err(err) => {
                    desc.push_error(format!("error checking {stage}: {err}"));
                    warn!(run = %run_id, %stage, error = %err, "probing failed, abandoning remaining stages for this run");
                    break;
                }
            }
        }
        desc
    }

    /// Runs the full producer chain for one forecast, end to end.
    ///
    /// With no run id, processes the latest remote cycle, falling back to
    /// the previous one if the newest has not been fully uploaded yet.
    /// Stops after the download when the forecast has no named storms.
    pub async fn process_single(
        &self,
        feed: &dyn ForecastFeed,
        run: Option<RunId>,
        overwrite: bool,
        redownload: bool,
    ) -> Result<RunId, PipelineError> {
        let run = match run {
            Some(run) => {
                self.producers.download(&run, redownload).await?;
                run
            }
            None => {
                let latest = feed.latest().await?;
                info!(run = %latest, "processing latest forecast");
                match self.producers.download(&latest, redownload).await {
                    Ok(()) => latest,
                    Err(err) => {
                        warn!(run = %latest, error = %err, "latest cycle unavailable, falling back one cycle");
                        let previous = latest.previous_cycle().ok_or(err)?;
                        self.producers.download(&previous, redownload).await?;
                        previous
                    }
                }
            }
        };

        let named = self.count_named_storms(&run)?;
        if named == 0 {
            info!(run = %run, "no named storms in forecast, nothing further to do");
            return Ok(run);
        }
        info!(run = %run, named, "processing forecast");

        self.producers.track_analysis(&run, overwrite).await?;
        self.producers.wind_fields(&run, overwrite).await?;
        self.producers.impacts(&run, overwrite).await?;
        self.producers.impact_analysis(&run, overwrite).await?;
        self.producers.report(&run, overwrite).await?;
        self.index.rebuild().await?;
        Ok(run)
    }

    /// Forces one stage's producer across every local run.
    ///
    /// Per-run failures are logged and counted, never propagated, so one
    /// broken run cannot stop a bulk regeneration.
    pub async fn regenerate_stage(&self, stage: StageKind) -> usize {
        let runs = self.registry.local_runs();
        info!(stage = %stage, runs = runs.len(), "regenerating stage across local runs");
        let mut failures = 0;
        for run in &runs {
            if let Err(err) = self.producers.produce(stage, run, true).await {
                error!(run = %run, error = %err, "regeneration failed");
                failures += 1;
            }
        }
        failures
    }

    /// Rebuilds the cross-run index page.
    pub async fn rebuild_index(&self) -> Result<std::path::PathBuf, IndexError> {
        self.index.rebuild().await
    }

    /// Gets the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gets a reference to the artifact store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Gets a reference to the stage producers.
    pub fn producers(&self) -> &P {
        &self.producers
    }

    fn count_named_storms(&self, run: &RunId) -> std::io::Result<usize> {
        let files = self.store.list(run, ArtifactKind::Bufr)?;
        Ok(files
            .iter()
            .filter_map(|f| naming::storm_id(f))
            .filter(|id| naming::is_named_storm(id))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::descriptor::FinalStep;
    use crate::pipeline::testing::FakeProducers;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    struct StaticFeed(Vec<&'static str>);

    #[async_trait]
    impl ForecastFeed for StaticFeed {
        async fn available_runs(&self) -> Result<Vec<RunId>, FeedError> {
            Ok(self.0.iter().map(|s| RunId::parse(s).unwrap()).collect())
        }
    }

    struct DownFeed;

    #[async_trait]
    impl ForecastFeed for DownFeed {
        async fn available_runs(&self) -> Result<Vec<RunId>, FeedError> {
            Err(FeedError::Unavailable("connection refused".to_string()))
        }
    }

    fn bufr_name(run: &str, storm: &str) -> String {
        format!(
            "A_JSXX02ECMF020000_C_ECMF_{run}_tropical_cyclone_track_{storm}_-68p5degW_14p5degN_bufr4.bin"
        )
    }

    fn config(dir: &tempfile::TempDir) -> Config {
        Config::default()
            .with_working_dir(dir.path())
            .with_pandoc_bin("true")
    }

    /// Seeds a run in the store up to and including `through`.
    fn seed_through(store: &MemoryStore, run: &RunId, through: StageKind) {
        let stages: Vec<StageKind> = StageKind::ALL
            .iter()
            .copied()
            .take_while(|s| *s != through)
            .chain(std::iter::once(through))
            .collect();
        for stage in stages {
            match stage {
                StageKind::Download => {
                    store.add_file(
                        run,
                        ArtifactKind::Bufr,
                        &bufr_name(run.as_str(), "ALEX"),
                    );
                    store.add_file(run, ArtifactKind::Tracks, naming::TRACKS_FILE);
                }
                StageKind::TrackAnalysis => {
                    store.add_file(
                        run,
                        ArtifactKind::TrackAnalysis,
                        &naming::track_plot_file(run),
                    );
                }
                StageKind::WindFields => {
                    store.add_file(
                        run,
                        ArtifactKind::WindFields,
                        &naming::wind_field_file("ALEX", run),
                    );
                }
                StageKind::Impacts => {
                    store.add_file(
                        run,
                        ArtifactKind::Impacts,
                        &naming::impact_file("ALEX", "PHL", naming::AFFECTED_MARKER),
                    );
                }
                StageKind::ImpactAnalysis => {
                    store.add_file(run, ArtifactKind::ImpactAnalysis, "ALEX_PHL_map.png");
                }
                StageKind::Report => {
                    store.add_file(run, ArtifactKind::Report, naming::REPORT_HTML);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_feed_failure_aborts_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let producers = FakeProducers::new(store.clone());
        let controller = PipelineController::new(config(&dir), store, producers);

        let result = controller.check_outputs(&DownFeed, false).await;
        assert!(matches!(result, Err(PipelineError::Feed(_))));
    }

    #[tokio::test]
    async fn test_failure_in_one_run_does_not_block_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let run_a = RunId::parse("20250101000000").unwrap();
        let run_b = RunId::parse("20250101120000").unwrap();

        // A is complete through wind fields; its impacts regeneration fails
        seed_through(&store, &run_a, StageKind::WindFields);
        seed_through(&store, &run_b, StageKind::Report);

        let producers = FakeProducers::new(store.clone())
            .failing_for_run(StageKind::Impacts, run_a.clone());
        let controller = PipelineController::new(config(&dir), store, producers);
        let feed = StaticFeed(vec!["20250101000000", "20250101120000"]);

        let rows = controller.check_outputs(&feed, true).await.unwrap();
        assert_eq!(rows.len(), 2);

        let a = &rows[0];
        assert!(a.download_ok && a.tracks_ok && a.track_analysis_ok && a.wind_fields_ok);
        assert!(!a.impacts_ok && !a.impact_analysis_ok && !a.report_ok);
        assert!(a.errors.iter().any(|e| e.contains("impacts regeneration failed")));

        let b = &rows[1];
        assert!(b.stage_ok(StageKind::Report));
        assert!(b.download_ok && b.wind_fields_ok && b.impacts_ok && b.impact_analysis_ok);
        assert!(b.errors.is_empty());
    }

    #[tokio::test]
    async fn test_every_known_run_appears_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        // run B exists both locally and remotely; A only remotely
        std::fs::create_dir(dir.path().join("20250101120000")).unwrap();
        let store = MemoryStore::new();
        let producers = FakeProducers::new(store.clone());
        let controller = PipelineController::new(config(&dir), store, producers);
        let feed = StaticFeed(vec!["20250101000000", "20250101120000"]);

        let rows = controller.check_outputs(&feed, false).await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.run_id.as_str()).collect();
        assert_eq!(ids, vec!["20250101000000", "20250101120000"]);

        assert!(!rows[0].exists_local && rows[0].exists_remote);
        assert!(rows[1].exists_local && rows[1].exists_remote);
    }

    #[tokio::test]
    async fn test_audit_table_written_even_when_runs_fail() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let producers = FakeProducers::new(store.clone());
        let controller = PipelineController::new(config(&dir), store, producers);
        let feed = StaticFeed(vec!["20250101000000"]);

        controller.check_outputs(&feed, false).await.unwrap();
        let table = std::fs::read_to_string(dir.path().join(AUDIT_FILE)).unwrap();
        assert_eq!(table.lines().count(), 2);
        assert!(table.contains("no downloaded data found"));
    }

    #[tokio::test]
    async fn test_fix_mode_survives_index_rebuild_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let producers = FakeProducers::new(store.clone());
        let broken_index = config(&dir).with_pandoc_bin("/nonexistent/pandoc");
        let controller = PipelineController::new(broken_index, store, producers);
        let feed = StaticFeed(vec!["20250101000000"]);

        // the batch still completes and reports
        let rows = controller.check_outputs(&feed, true).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_audit_mode_never_invokes_producers() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let producers = FakeProducers::new(store.clone());
        let controller = PipelineController::new(config(&dir), store, producers);
        let feed = StaticFeed(vec!["20250101000000"]);

        controller.check_outputs(&feed, false).await.unwrap();
        assert!(controller.producers.calls().is_empty());
    }

    #[tokio::test]
    async fn test_zero_storm_run_still_gets_a_report_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let run = RunId::parse("20250101000000").unwrap();
        store.add_file(&run, ArtifactKind::Bufr, &bufr_name(run.as_str(), "05"));
        store.add_file(&run, ArtifactKind::Report, naming::REPORT_HTML);
        let producers = FakeProducers::new(store.clone());
        let controller = PipelineController::new(config(&dir), store, producers);
        let feed = StaticFeed(vec!["20250101000000"]);

        let rows = controller.check_outputs(&feed, false).await.unwrap();
        let row = &rows[0];
        assert_eq!(row.final_step, Some(FinalStep::NoNamedStorms));
        assert!(row.download_ok);
        // the degraded report is still recognized
        assert!(row.report_ok);
        assert!(!row.tracks_ok && !row.wind_fields_ok);
    }

    #[tokio::test]
    async fn test_process_single_stops_after_download_without_named_storms() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let run = RunId::parse("20250101000000").unwrap();
        let producers = FakeProducers::new(store.clone()).on_download({
            move |store, run| {
                store.add_file(run, ArtifactKind::Bufr, &bufr_name(run.as_str(), "05"));
            }
        });
        let controller = PipelineController::new(config(&dir), store, producers);
        let feed = StaticFeed(vec![]);

        let finished = controller
            .process_single(&feed, Some(run.clone()), false, false)
            .await
            .unwrap();
        assert_eq!(finished, run);
        assert_eq!(
            controller.producers.calls(),
            vec![(StageKind::Download, false)]
        );
    }

    #[tokio::test]
    async fn test_process_single_runs_the_full_chain() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let run = RunId::parse("20250101000000").unwrap();
        let producers = FakeProducers::new(store.clone()).on_download(move |store, run| {
            store.add_file(run, ArtifactKind::Bufr, &bufr_name(run.as_str(), "ALEX"));
        });
        let controller = PipelineController::new(config(&dir), store, producers);
        let feed = StaticFeed(vec![]);

        controller
            .process_single(&feed, Some(run), true, false)
            .await
            .unwrap();
        let stages: Vec<StageKind> = controller
            .producers
            .calls()
            .into_iter()
            .map(|(stage, _)| stage)
            .collect();
        assert_eq!(stages, StageKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_process_single_falls_back_to_previous_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let latest = RunId::parse("20250102000000").unwrap();
        let producers = FakeProducers::new(store.clone())
            .failing_for_run(StageKind::Download, latest.clone());
        let controller = PipelineController::new(config(&dir), store, producers);
        let feed = StaticFeed(vec!["20250101120000", "20250102000000"]);

        let finished = controller
            .process_single(&feed, None, false, false)
            .await
            .unwrap();
        // the previous 12h cycle was downloaded instead
        assert_eq!(finished.as_str(), "20250101120000");
    }

    #[tokio::test]
    async fn test_regenerate_stage_isolates_per_run_failures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("20250101000000")).unwrap();
        std::fs::create_dir(dir.path().join("20250101120000")).unwrap();
        let store = MemoryStore::new();
        let producers = FakeProducers::new(store.clone())
            .failing_for_run(StageKind::Report, RunId::parse("20250101000000").unwrap());
        let controller = PipelineController::new(config(&dir), store, producers);

        let failures = controller.regenerate_stage(StageKind::Report).await;
        assert_eq!(failures, 1);
        // both runs were attempted with overwrite forced
        assert_eq!(
            controller.producers.calls(),
            vec![(StageKind::Report, true), (StageKind::Report, true)]
        );
    }
}
