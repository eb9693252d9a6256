//! Task queue client and in-process worker runtime.
//!
//! Every unit of work is a [`Task`] whose arguments are plain serializable
//! data (ids, URLs, descriptions), so a unit can run on any worker without
//! sharing memory with whoever submitted it. [`TaskQueue`] runs them on the
//! tokio runtime: `submit` schedules a unit and returns a [`TaskHandle`]
//! whose `wait` blocks on its result, and chains are scheduled one link at a
//! time, each link only after the previous one resolved.

use crate::common::constants;
use crate::common::error::{CatalogError, Result};
use crate::domain::Dataset;
use crate::pipeline::chain::PublicationChain;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::descriptor::ResourceDescriptor;
use crate::pipeline::status::{PipelineStatus, StageKind, StageResult};
use crate::pipeline::{ingestion, logo, stages, upload};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Task {
    CreateDataPackage {
        project_id: Uuid,
        metadata_url: String,
        auto_upload: bool,
    },
    CreateDataset {
        project_id: Uuid,
        package_id: Uuid,
        resource: ResourceDescriptor,
        auto_upload: bool,
    },
    RunStage {
        stage: StageKind,
        dataset_id: Uuid,
        status: PipelineStatus,
    },
    RunChain {
        chain: PublicationChain,
        status: PipelineStatus,
    },
    UploadLogo {
        project_id: Uuid,
        filename: String,
        bytes: Vec<u8>,
    },
    /// Publishes a whole description without creating any records.
    UploadDataPackage { metadata_url: String },
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::CreateDataPackage { .. } => constants::CREATE_DATA_PACKAGE_TASK,
            Task::CreateDataset { .. } => constants::CREATE_DATASET_TASK,
            Task::RunStage { stage, .. } => stage.task_name(),
            Task::RunChain { .. } => "publication_chain",
            Task::UploadLogo { .. } => constants::UPLOAD_LOGO_TASK,
            Task::UploadDataPackage { .. } => constants::UPLOAD_DATA_PACKAGE_TASK,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutput {
    Done(bool),
    Stage(StageResult),
    Url(String),
    Published(Vec<String>),
}

impl TaskOutput {
    pub fn into_stage(self) -> Result<StageResult> {
        match self {
            TaskOutput::Stage(result) => Ok(result),
            other => Err(CatalogError::Task(format!("expected a stage result, got {:?}", other))),
        }
    }
}

/// Result slot of a submitted unit of work.
pub struct TaskHandle {
    id: Uuid,
    name: &'static str,
    rx: oneshot::Receiver<Result<TaskOutput>>,
}

impl TaskHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Waits for the unit to finish and returns its output. A worker that
    /// panicked surfaces as `CatalogError::Task`.
    pub async fn wait(self) -> Result<TaskOutput> {
        self.rx.await.map_err(|_| {
            CatalogError::Task(format!("{} ({}) ended without a result", self.name, self.id))
        })?
    }
}

#[derive(Clone)]
pub struct TaskQueue {
    ctx: PipelineContext,
    inflight: Arc<Mutex<Vec<JoinHandle<()>>>>,
    submissions: Arc<Mutex<HashMap<&'static str, usize>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TaskQueue {
    pub fn new(ctx: PipelineContext) -> Self {
        Self {
            ctx,
            inflight: Arc::new(Mutex::new(Vec::new())),
            submissions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Schedules `task` and returns immediately.
    pub fn submit(&self, task: Task) -> TaskHandle {
        let id = Uuid::new_v4();
        let name = task.name();
        let (tx, rx) = oneshot::channel();

        *lock(&self.submissions).entry(name).or_insert(0) += 1;
        debug!("Submitting {} ({})", name, id);

        let queue = self.clone();
        let span = info_span!("task", task = name, task_id = %id);
        let join = tokio::spawn(
            async move {
                let result = queue.execute(task).await;
                if let Err(e) = &result {
                    warn!("Task {} failed: {}", name, e);
                }
                // The submitter may have dropped its handle (fire-and-forget)
                let _ = tx.send(result);
            }
            .instrument(span),
        );
        {
            let mut inflight = lock(&self.inflight);
            inflight.retain(|h| !h.is_finished());
            inflight.push(join);
        }

        TaskHandle { id, name, rx }
    }

    /// Schedules the three publication stages for a dataset as one chain.
    pub fn submit_publication(&self, dataset_id: Uuid) -> TaskHandle {
        self.submit(Task::RunChain {
            chain: PublicationChain::standard(dataset_id),
            status: PipelineStatus::new(),
        })
    }

    pub fn submit_chain(&self, chain: PublicationChain) -> TaskHandle {
        self.submit(Task::RunChain {
            chain,
            status: PipelineStatus::new(),
        })
    }

    /// How many tasks named `name` were submitted so far.
    pub fn submitted_count(&self, name: &str) -> usize {
        lock(&self.submissions).get(name).copied().unwrap_or(0)
    }

    /// Waits until every submitted unit, including units submitted by other
    /// units while waiting, has finished.
    pub async fn wait_idle(&self) {
        loop {
            let pending: Vec<JoinHandle<()>> = std::mem::take(&mut *lock(&self.inflight));
            if pending.is_empty() {
                break;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    warn!("Worker ended abnormally: {}", e);
                }
            }
        }
    }

    async fn execute(&self, task: Task) -> Result<TaskOutput> {
        match task {
            Task::CreateDataPackage {
                project_id,
                metadata_url,
                auto_upload,
            } => ingestion::create_data_package(self, project_id, &metadata_url, auto_upload)
                .await
                .map(TaskOutput::Done),
            Task::CreateDataset {
                project_id,
                package_id,
                resource,
                auto_upload,
            } => ingestion::create_dataset(self, project_id, package_id, &resource, auto_upload)
                .await
                .map(TaskOutput::Done),
            Task::RunStage {
                stage,
                dataset_id,
                status,
            } => Ok(TaskOutput::Stage(
                stages::run_stage_isolated(&self.ctx, stage, status, dataset_id).await,
            )),
            Task::RunChain { chain, status } => self.run_chain(chain, status).await.map(TaskOutput::Stage),
            Task::UploadLogo {
                project_id,
                filename,
                bytes,
            } => logo::upload_logo(&self.ctx, project_id, &filename, bytes)
                .await
                .map(TaskOutput::Url),
            Task::UploadDataPackage { metadata_url } => upload::upload_data_package(&self.ctx, &metadata_url)
                .await
                .map(TaskOutput::Published),
        }
    }

    /// Runs each link as its own unit, scheduling the next one only once the
    /// previous has resolved, and threads the status through. Failed or
    /// panicked links do not stop the chain.
    async fn run_chain(&self, chain: PublicationChain, mut status: PipelineStatus) -> Result<StageResult> {
        let dataset_id = chain.dataset_id();
        let mut last = StageResult::Completed(status.clone());

        for &stage in chain.stages() {
            last = stages::run_stage_isolated(&self.ctx, stage, status, dataset_id).await;
            status = last.status().clone();
        }

        self.record_pipeline_status(dataset_id, &status).await;
        if last.is_not_ready() {
            info!("Chain for dataset {} ended with publishing not ready", dataset_id);
        }
        Ok(last)
    }

    async fn record_pipeline_status(&self, dataset_id: Uuid, status: &PipelineStatus) {
        let saved = async {
            let mut dataset = self.ctx.records.require_dataset(dataset_id).await?;
            dataset.pipeline_status = Some(status.clone());
            self.ctx.records.update_dataset(&dataset).await
        };
        if let Err(e) = saved.await {
            warn!("Could not record pipeline status for dataset {}: {}", dataset_id, e);
        }
    }

    /// Best-effort immediate publication. Missing artifacts are produced
    /// first, waiting for each prerequisite stage to finish; the publish stage
    /// is always enqueued last and its handle returned.
    pub async fn process_and_load(&self, dataset: &Dataset) -> Result<TaskHandle> {
        let dataset_id = dataset
            .id
            .ok_or_else(|| CatalogError::MissingField("dataset id".to_string()))?;
        let mut status = PipelineStatus::new();

        let current = self.ctx.records.require_dataset(dataset_id).await?;
        if current.preprocessed.is_none() {
            status = self
                .submit(Task::RunStage {
                    stage: StageKind::Preprocess,
                    dataset_id,
                    status,
                })
                .wait()
                .await?
                .into_stage()?
                .into_status();
        }
        if current.datamodel.is_none() {
            status = self
                .submit(Task::RunStage {
                    stage: StageKind::Model,
                    dataset_id,
                    status,
                })
                .wait()
                .await?
                .into_stage()?
                .into_status();
        }

        Ok(self.submit(Task::RunStage {
            stage: StageKind::Publish,
            dataset_id,
            status,
        }))
    }
}
