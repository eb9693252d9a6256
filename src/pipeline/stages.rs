//! The three publication stages.
//!
//! Each stage reloads the dataset by id, does its one piece of work, writes
//! exactly one artifact field and records its outcome in the status it was
//! handed. Stages never return an error: failures become `Failed` entries.

use crate::common::constants;
use crate::common::error::Result;
use crate::domain::{DataPackage, Dataset};
use crate::infra::blob_store::{dataset_key, model_key};
use crate::observability::metrics;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::resource::{reconstruct_resource, DataSource, Resource};
use crate::pipeline::status::{PipelineStatus, StageKind, StageOutcome, StageResult};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

async fn load_dataset(ctx: &PipelineContext, id: Uuid) -> Result<(Dataset, Option<DataPackage>)> {
    let dataset = ctx.records.require_dataset(id).await?;
    let package = match dataset.datapackage_id {
        Some(package_id) => Some(ctx.records.require_data_package(package_id).await?),
        None => None,
    };
    Ok((dataset, package))
}

async fn load_resource(ctx: &PipelineContext, id: Uuid, source: DataSource) -> Result<(Dataset, Resource)> {
    let (dataset, package) = load_dataset(ctx, id).await?;
    let resource = reconstruct_resource(&dataset, package.as_ref(), source, ctx.loader.clone())?;
    Ok((dataset, resource))
}

fn record(status: &mut PipelineStatus, stage: StageKind, outcome: StageOutcome) {
    match &outcome {
        StageOutcome::Succeeded(msg) => {
            metrics::pipeline::stage_success(stage);
            info!("{}", msg);
        }
        StageOutcome::Failed(msg) => {
            metrics::pipeline::stage_failure(stage);
            error!("{}", msg);
        }
    }
    status.record(stage, outcome);
}

async fn try_preprocess(ctx: &PipelineContext, id: Uuid) -> Result<String> {
    let (mut dataset, mut resource) = load_resource(ctx, id, DataSource::Original).await?;
    ctx.transformer.preprocess(&mut resource).await?;

    let bytes = resource.data.serialize().await?;
    let key = dataset_key(&dataset.name, &bytes);
    let url = ctx.blobs.put(&key, bytes, constants::CSV_CONTENT_TYPE).await?;

    dataset.preprocessed = Some(url);
    ctx.records.update_dataset(&dataset).await?;
    Ok(dataset.name)
}

/// Stage 1: clean the source CSV and upload it; sets `preprocessed`.
pub async fn preprocess_dataset(ctx: &PipelineContext, mut status: PipelineStatus, id: Uuid) -> StageResult {
    let span = info_span!("stage", task = constants::PREPROCESS_DATASET_TASK, dataset_id = %id);
    let outcome = match try_preprocess(ctx, id).instrument(span).await {
        Ok(name) => StageOutcome::Succeeded(format!("Successfully preprocessed dataset {}", name)),
        Err(e) => StageOutcome::Failed(StageKind::Preprocess.failure_message(e)),
    };
    record(&mut status, StageKind::Preprocess, outcome);
    StageResult::Completed(status)
}

async fn try_generate_model(ctx: &PipelineContext, id: Uuid) -> Result<String> {
    let (mut dataset, mut resource) = load_resource(ctx, id, DataSource::Preprocessed).await?;
    let model = ctx.transformer.infer_model(&mut resource).await?;

    let bytes = serde_json::to_vec_pretty(&model)?;
    let key = model_key(&dataset.name, &bytes);
    let url = ctx.blobs.put(&key, bytes, constants::JSON_CONTENT_TYPE).await?;

    dataset.datamodel = Some(url);
    ctx.records.update_dataset(&dataset).await?;
    Ok(dataset.name)
}

/// Stage 2: infer a model from the preprocessed CSV and upload it; sets `datamodel`.
pub async fn generate_model(ctx: &PipelineContext, mut status: PipelineStatus, id: Uuid) -> StageResult {
    let span = info_span!("stage", task = constants::GENERATE_MODEL_TASK, dataset_id = %id);
    let outcome = match try_generate_model(ctx, id).instrument(span).await {
        Ok(name) => StageOutcome::Succeeded(format!("Successfully generated model for dataset {}", name)),
        Err(e) => StageOutcome::Failed(StageKind::Model.failure_message(e)),
    };
    record(&mut status, StageKind::Model, outcome);
    StageResult::Completed(status)
}

enum PublishAttempt {
    Published(String),
    NotReady(String),
}

async fn try_publish(ctx: &PipelineContext, id: Uuid) -> Result<PublishAttempt> {
    let mut dataset = ctx.records.require_dataset(id).await?;
    let (data_url, model_url) = match (&dataset.preprocessed, &dataset.datamodel) {
        (Some(d), Some(m)) => (d.clone(), m.clone()),
        _ => return Ok(PublishAttempt::NotReady(dataset.name)),
    };

    let publication = ctx.publisher.publish(&data_url, &model_url).await?;
    dataset.openspending = Some(publication.url);
    ctx.records.update_dataset(&dataset).await?;
    Ok(PublishAttempt::Published(dataset.name))
}

/// Stage 3: submit both artifacts to the publishing service; sets
/// `openspending`. Returns `NotReady` without touching the status when either
/// artifact is missing.
pub async fn publish_dataset(ctx: &PipelineContext, mut status: PipelineStatus, id: Uuid) -> StageResult {
    let span = info_span!("stage", task = constants::PUBLISH_DATASET_TASK, dataset_id = %id);
    let outcome = match try_publish(ctx, id).instrument(span).await {
        Ok(PublishAttempt::NotReady(name)) => {
            metrics::pipeline::publish_not_ready();
            warn!("Dataset {} is not ready for publishing", name);
            return StageResult::NotReady(status);
        }
        Ok(PublishAttempt::Published(name)) => {
            StageOutcome::Succeeded(format!("Successfully uploaded dataset {}", name))
        }
        Err(e) => StageOutcome::Failed(StageKind::Publish.failure_message(e)),
    };
    record(&mut status, StageKind::Publish, outcome);
    StageResult::Completed(status)
}

/// Runs one stage by kind.
pub async fn run_stage(ctx: &PipelineContext, stage: StageKind, status: PipelineStatus, id: Uuid) -> StageResult {
    match stage {
        StageKind::Preprocess => preprocess_dataset(ctx, status, id).await,
        StageKind::Model => generate_model(ctx, status, id).await,
        StageKind::Publish => publish_dataset(ctx, status, id).await,
    }
}

/// Runs one stage on its own worker. A worker that panics is recorded as a
/// failure of that stage, so the status stays complete.
pub async fn run_stage_isolated(
    ctx: &PipelineContext,
    stage: StageKind,
    status: PipelineStatus,
    id: Uuid,
) -> StageResult {
    let worker_ctx = ctx.clone();
    let mut fallback = status.clone();
    let worker = tokio::spawn(
        async move { run_stage(&worker_ctx, stage, status, id).await }
            .instrument(info_span!("link", task = stage.task_name(), dataset_id = %id)),
    );
    match worker.await {
        Ok(result) => result,
        Err(e) => {
            let detail = format!("worker aborted: {}", e);
            record(&mut fallback, stage, StageOutcome::Failed(stage.failure_message(detail)));
            StageResult::Completed(fallback)
        }
    }
}
