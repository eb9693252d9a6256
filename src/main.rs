use anyhow::Context;
use bdp_catalog::common::config::Config;
use bdp_catalog::domain::Project;
use bdp_catalog::infra::{
    build_blob_store, CsvResourceTransformer, HttpMetadataFetcher, OpenSpendingPublisher,
    ReqwestSourceLoader,
};
use bdp_catalog::observability::init_logging;
use bdp_catalog::pipeline::{PipelineContext, Task, TaskOutput, TaskQueue};
use bdp_catalog::storage::{InMemoryStorage, RecordStore};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "bdp_catalog")]
#[command(about = "Budget data package ingestion and OpenSpending publication")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a project, ingest a data package into it and publish its datasets
    Ingest {
        /// Title of the project to create
        #[arg(long)]
        title: String,
        /// URL of the data package description (http, https or file)
        #[arg(long)]
        metadata_url: String,
        /// Create the records without running the publication chain
        #[arg(long)]
        no_auto_upload: bool,
        /// Logo image to upload for the project
        #[arg(long)]
        logo: Option<PathBuf>,
    },
    /// Publish every resource of a data package without creating records
    Upload {
        /// URL of the data package description (http, https or file)
        #[arg(long)]
        metadata_url: String,
    },
    /// Fetch a data package description and list its resources
    Inspect {
        #[arg(long)]
        metadata_url: String,
    },
}

fn build_context(config: &Config) -> anyhow::Result<PipelineContext> {
    let loader = Arc::new(ReqwestSourceLoader::new());
    Ok(PipelineContext {
        records: Arc::new(InMemoryStorage::new()),
        blobs: build_blob_store(&config.blob_store).context("Failed to set up blob store")?,
        loader: loader.clone(),
        fetcher: Arc::new(HttpMetadataFetcher::new(loader)),
        transformer: Arc::new(CsvResourceTransformer::new()),
        publisher: Arc::new(
            OpenSpendingPublisher::new(&config.publisher).context("Failed to set up publisher")?,
        ),
    })
}

async fn run_ingest(
    queue: &TaskQueue,
    title: String,
    metadata_url: String,
    auto_upload: bool,
    logo: Option<PathBuf>,
) -> anyhow::Result<()> {
    let records = queue.context().records.clone();

    let mut project = Project::new(title, whoami());
    records.create_project(&mut project).await?;
    let project_id = project.id.context("project was stored without an id")?;
    info!("Created project '{}' ({})", project.slug, project_id);

    if let Some(path) = logo {
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read logo {}", path.display()))?;
        let filename = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("logo")
            .to_string();
        queue.submit(Task::UploadLogo {
            project_id,
            filename,
            bytes,
        });
    }

    let created = queue
        .submit(Task::CreateDataPackage {
            project_id,
            metadata_url: metadata_url.clone(),
            auto_upload,
        })
        .wait()
        .await
        .with_context(|| format!("Failed to ingest {}", metadata_url))?;
    if created != TaskOutput::Done(true) {
        warn!("Unexpected ingestion result: {:?}", created);
    }

    queue.wait_idle().await;

    println!("\n📊 Results for project {}:", project.slug);
    if let Some(project) = records.get_project(project_id).await? {
        if let Some(logo_url) = project.logo_url {
            println!("   Logo: {}", logo_url);
        }
    }
    for package in records.get_data_packages_by_project(project_id).await? {
        let Some(package_id) = package.id else { continue };
        println!("   Package {} ({})", package.name, package.slug);
        for dataset in records.get_datasets_by_package(package_id).await? {
            println!("     - {}", dataset.name);
            println!("       preprocessed: {}", dataset.preprocessed.as_deref().unwrap_or("-"));
            println!("       datamodel:    {}", dataset.datamodel.as_deref().unwrap_or("-"));
            println!("       openspending: {}", dataset.openspending.as_deref().unwrap_or("-"));
            if let Some(status) = dataset.pipeline_status {
                for (stage, message) in status.messages() {
                    println!("       [{}] {}", stage, message);
                }
            }
        }
    }
    Ok(())
}

async fn run_upload(queue: &TaskQueue, metadata_url: String) -> anyhow::Result<()> {
    let output = queue
        .submit(Task::UploadDataPackage {
            metadata_url: metadata_url.clone(),
        })
        .wait()
        .await
        .with_context(|| format!("Failed to upload {}", metadata_url))?;
    if let TaskOutput::Published(urls) = output {
        println!("\n📤 Published {} datasets:", urls.len());
        for url in urls {
            println!("   {}", url);
        }
    }
    Ok(())
}

async fn run_inspect(queue: &TaskQueue, metadata_url: String) -> anyhow::Result<()> {
    let descriptor = queue.context().fetcher.fetch(&metadata_url).await?;
    println!("📦 {} ({} resources)", descriptor.name, descriptor.resources.len());
    for resource in &descriptor.resources {
        println!(
            "   - {} [{}] {}",
            resource.display_name(),
            resource.resource_type.as_deref().unwrap_or("?"),
            resource.path.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn whoami() -> String {
    std::env::var("USER").unwrap_or_else(|_| "bdp_catalog".to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = init_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let queue = TaskQueue::new(build_context(&config)?);

    let result = match cli.command {
        Commands::Ingest {
            title,
            metadata_url,
            no_auto_upload,
            logo,
        } => {
            let auto_upload = config.pipeline.auto_upload && !no_auto_upload;
            run_ingest(&queue, title, metadata_url, auto_upload, logo).await
        }
        Commands::Upload { metadata_url } => run_upload(&queue, metadata_url).await,
        Commands::Inspect { metadata_url } => run_inspect(&queue, metadata_url).await,
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
