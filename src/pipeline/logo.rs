use crate::common::error::Result;
use crate::infra::blob_store::logo_key;
use crate::observability::metrics;
use crate::pipeline::context::PipelineContext;
use tracing::info;
use uuid::Uuid;

/// Uploads a project logo under a fresh unique key and points the project at
/// it. Returns the logo URL.
pub async fn upload_logo(
    ctx: &PipelineContext,
    project_id: Uuid,
    filename: &str,
    bytes: Vec<u8>,
) -> Result<String> {
    let token = Uuid::new_v4().simple().to_string();
    let key = logo_key(&token, filename);
    let content_type = mime_guess::from_path(filename).first_or_octet_stream();

    let url = ctx.blobs.put(&key, bytes, content_type.as_ref()).await?;

    let mut project = ctx.records.require_project(project_id).await?;
    project.logo_url = Some(url.clone());
    ctx.records.update_project(&project).await?;

    metrics::blobs::logo_uploaded();
    info!("Uploaded logo for project '{}' to {}", project.title, url);
    Ok(url)
}
