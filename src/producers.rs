//! External stage producers.
//!
//! The scientific computations, plotting and report building are opaque
//! collaborators. Each conforms to the same contract: given a run id and an
//! overwrite flag, write into the run's designated directory or fail.
//! Producers own idempotency — with `overwrite=false` and non-empty output
//! they perform no work, with `overwrite=true` they always regenerate.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::ProducerCommands;
use crate::error::ProducerError;
use crate::pipeline::StageKind;
use crate::registry::RunId;

/// The six stage producer contracts consumed by the pipeline core.
#[async_trait]
pub trait StageProducers: Send + Sync {
    /// Fetches the raw track messages and writes the consolidated track file.
    async fn download(&self, run: &RunId, overwrite: bool) -> Result<(), ProducerError>;

    /// Renders the track plots.
    async fn track_analysis(&self, run: &RunId, overwrite: bool) -> Result<(), ProducerError>;

    /// Computes per-storm wind field grids.
    async fn wind_fields(&self, run: &RunId, overwrite: bool) -> Result<(), ProducerError>;

    /// Computes per-storm, per-country impact files.
    async fn impacts(&self, run: &RunId, overwrite: bool) -> Result<(), ProducerError>;

    /// Renders impact plots and summaries.
    async fn impact_analysis(&self, run: &RunId, overwrite: bool) -> Result<(), ProducerError>;

    /// Builds the run report documents.
    async fn report(&self, run: &RunId, overwrite: bool) -> Result<(), ProducerError>;

    /// Dispatches to the producer for `stage`.
    async fn produce(
        &self,
        stage: StageKind,
        run: &RunId,
        overwrite: bool,
    ) -> Result<(), ProducerError> {
        match stage {
            StageKind::Download => self.download(run, overwrite).await,
            StageKind::TrackAnalysis => self.track_analysis(run, overwrite).await,
            StageKind::WindFields => self.wind_fields(run, overwrite).await,
            StageKind::Impacts => self.impacts(run, overwrite).await,
            StageKind::ImpactAnalysis => self.impact_analysis(run, overwrite).await,
            StageKind::Report => self.report(run, overwrite).await,
        }
    }
}

/// Producers backed by configured external commands.
pub struct CommandProducers {
    commands: ProducerCommands,
}

impl CommandProducers {
    pub fn new(commands: ProducerCommands) -> Self {
        Self { commands }
    }

    async fn invoke(
        &self,
        stage: StageKind,
        command: &str,
        run: &RunId,
        overwrite: bool,
    ) -> Result<(), ProducerError> {
        let mut parts = command.split_whitespace();
        let program = parts.next().ok_or(ProducerError::EmptyCommand {
            stage: stage.name(),
        })?;

        let mut cmd = Command::new(program);
        cmd.args(parts).arg(run.as_str());
        if overwrite {
            cmd.arg("--overwrite");
        }

        debug!(stage = stage.name(), run = %run, overwrite, "invoking producer");
        let output = cmd.output().await.map_err(|source| ProducerError::Launch {
            stage: stage.name(),
            source,
        })?;

        if !output.status.success() {
            return Err(ProducerError::NonZeroExit {
                stage: stage.name(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StageProducers for CommandProducers {
    async fn download(&self, run: &RunId, overwrite: bool) -> Result<(), ProducerError> {
        self.invoke(StageKind::Download, &self.commands.download, run, overwrite)
            .await
    }

    async fn track_analysis(&self, run: &RunId, overwrite: bool) -> Result<(), ProducerError> {
        self.invoke(
            StageKind::TrackAnalysis,
            &self.commands.track_analysis,
            run,
            overwrite,
        )
        .await
    }

    async fn wind_fields(&self, run: &RunId, overwrite: bool) -> Result<(), ProducerError> {
        self.invoke(
            StageKind::WindFields,
            &self.commands.wind_fields,
            run,
            overwrite,
        )
        .await
    }

    async fn impacts(&self, run: &RunId, overwrite: bool) -> Result<(), ProducerError> {
        self.invoke(StageKind::Impacts, &self.commands.impacts, run, overwrite)
            .await
    }

    async fn impact_analysis(&self, run: &RunId, overwrite: bool) -> Result<(), ProducerError> {
        self.invoke(
            StageKind::ImpactAnalysis,
            &self.commands.impact_analysis,
            run,
            overwrite,
        )
        .await
    }

    async fn report(&self, run: &RunId, overwrite: bool) -> Result<(), ProducerError> {
        self.invoke(StageKind::Report, &self.commands.report, run, overwrite)
            .await
    }
}
