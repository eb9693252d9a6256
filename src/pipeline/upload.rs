use crate::common::constants;
use crate::common::error::Result;
use crate::infra::blob_store::{dataset_key, model_key};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::resource::resource_from_descriptor;
use tracing::info;

/// Publishes every resource of the description at `metadata_url` without
/// touching the record store: preprocess, infer the model, upload both and
/// hand them to the publishing service. The first failing resource aborts
/// the upload. Returns the publication URLs in resource order.
pub async fn upload_data_package(ctx: &PipelineContext, metadata_url: &str) -> Result<Vec<String>> {
    let descriptor = ctx.fetcher.fetch(metadata_url).await?;
    let mut publications = Vec::with_capacity(descriptor.resources.len());

    for described in &descriptor.resources {
        let mut resource = resource_from_descriptor(described, metadata_url, ctx.loader.clone())?;
        ctx.transformer.preprocess(&mut resource).await?;
        let model = ctx.transformer.infer_model(&mut resource).await?;
        let name = resource.metadata.name.clone();

        let data = resource.data.serialize().await?;
        let key = dataset_key(&name, &data);
        let data_url = ctx.blobs.put(&key, data, constants::CSV_CONTENT_TYPE).await?;

        let model = serde_json::to_vec_pretty(&model)?;
        let key = model_key(&name, &model);
        let model_url = ctx.blobs.put(&key, model, constants::JSON_CONTENT_TYPE).await?;

        let publication = ctx.publisher.publish(&data_url, &model_url).await?;
        info!("Published {} from '{}' as {}", name, descriptor.name, publication.url);
        publications.push(publication.url);
    }
    Ok(publications)
}
