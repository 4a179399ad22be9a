//! Test doubles shared by the pipeline unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::ProducerError;
use crate::pipeline::stage::StageKind;
use crate::producers::StageProducers;
use crate::registry::RunId;
use crate::store::MemoryStore;

type OutputFn = Box<dyn Fn(&MemoryStore, &RunId) + Send + Sync>;

/// Scripted producers writing into a shared [`MemoryStore`].
///
/// Records every invocation, can be told to fail at one stage (optionally
/// only for one run), and otherwise executes the scripted output closure
/// for the stage, if any.
pub struct FakeProducers {
    store: MemoryStore,
    outputs: HashMap<StageKind, OutputFn>,
    fail: Option<StageKind>,
    fail_run: Option<(StageKind, RunId)>,
    calls: Arc<Mutex<Vec<(StageKind, bool)>>>,
}

impl FakeProducers {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            outputs: HashMap::new(),
            fail: None,
            fail_run: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Scripts what the producer for `stage` writes when invoked.
    pub fn on(
        mut self,
        stage: StageKind,
        f: impl Fn(&MemoryStore, &RunId) + Send + Sync + 'static,
    ) -> Self {
        self.outputs.insert(stage, Box::new(f));
        self
    }

    pub fn on_download(self, f: impl Fn(&MemoryStore, &RunId) + Send + Sync + 'static) -> Self {
        self.on(StageKind::Download, f)
    }

    /// Makes the producer for `stage` fail for every run.
    pub fn failing_at(mut self, stage: StageKind) -> Self {
        self.fail = Some(stage);
        self
    }

    /// Makes the producer for `stage` fail for one specific run only.
    pub fn failing_for_run(mut self, stage: StageKind, run: RunId) -> Self {
        self.fail_run = Some((stage, run));
        self
    }

    /// Every `(stage, overwrite)` invocation, in order.
    pub fn calls(&self) -> Vec<(StageKind, bool)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, stage: StageKind, run: &RunId, overwrite: bool) -> Result<(), ProducerError> {
        self.calls.lock().unwrap().push((stage, overwrite));
        let failing = self.fail == Some(stage)
            || self
                .fail_run
                .as_ref()
                .is_some_and(|(s, r)| *s == stage && r == run);
        if failing {
            return Err(ProducerError::NonZeroExit {
                stage: stage.name(),
                code: 1,
                stderr: "scripted failure".to_string(),
            });
        }
        if let Some(f) = self.outputs.get(&stage) {
            f(&self.store, run);
        }
        Ok(())
    }
}

#[async_trait]
impl StageProducers for FakeProducers {
    async fn download(&self, run: &RunId, overwrite: bool) -> Result<(), ProducerError> {
        self.record(StageKind::Download, run, overwrite)
    }

    async fn track_analysis(&self, run: &RunId, overwrite: bool) -> Result<(), ProducerError> {
        self.record(StageKind::TrackAnalysis, run, overwrite)
    }

    async fn wind_fields(&self, run: &RunId, overwrite: bool) -> Result<(), ProducerError> {
        self.record(StageKind::WindFields, run, overwrite)
    }

    async fn impacts(&self, run: &RunId, overwrite: bool) -> Result<(), ProducerError> {
        self.record(StageKind::Impacts, run, overwrite)
    }

    async fn impact_analysis(&self, run: &RunId, overwrite: bool) -> Result<(), ProducerError> {
        self.record(StageKind::ImpactAnalysis, run, overwrite)
    }

    async fn report(&self, run: &RunId, overwrite: bool) -> Result<(), ProducerError> {
        self.record(StageKind::Report, run, overwrite)
    }
}
