//! Counters for the ingestion and publication pipeline.
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed.

use crate::pipeline::status::StageKind;
use std::fmt;

/// All metric names used by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Ingestion
    PackagesIngested,
    PackageFetchErrors,
    DatasetsCreated,
    DatasetsFailed,

    // Publication stages
    StageSuccess,
    StageFailure,
    PublishNotReady,

    // Blob store
    BlobUploads,
    LogosUploaded,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::PackagesIngested => "bdp_ingest_packages_total",
            MetricName::PackageFetchErrors => "bdp_ingest_fetch_errors_total",
            MetricName::DatasetsCreated => "bdp_ingest_datasets_created_total",
            MetricName::DatasetsFailed => "bdp_ingest_datasets_failed_total",
            MetricName::StageSuccess => "bdp_pipeline_stage_success_total",
            MetricName::StageFailure => "bdp_pipeline_stage_failure_total",
            MetricName::PublishNotReady => "bdp_pipeline_publish_not_ready_total",
            MetricName::BlobUploads => "bdp_blob_uploads_total",
            MetricName::LogosUploaded => "bdp_blob_logos_uploaded_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub mod ingest {
    use super::MetricName;

    pub fn package_ingested() {
        ::metrics::counter!(MetricName::PackagesIngested.as_str()).increment(1);
    }

    pub fn fetch_error() {
        ::metrics::counter!(MetricName::PackageFetchErrors.as_str()).increment(1);
    }

    pub fn dataset_created() {
        ::metrics::counter!(MetricName::DatasetsCreated.as_str()).increment(1);
    }

    pub fn dataset_failed() {
        ::metrics::counter!(MetricName::DatasetsFailed.as_str()).increment(1);
    }
}

pub mod pipeline {
    use super::{MetricName, StageKind};

    pub fn stage_success(stage: StageKind) {
        ::metrics::counter!(MetricName::StageSuccess.as_str(), "stage" => stage.status_key())
            .increment(1);
    }

    pub fn stage_failure(stage: StageKind) {
        ::metrics::counter!(MetricName::StageFailure.as_str(), "stage" => stage.status_key())
            .increment(1);
    }

    pub fn publish_not_ready() {
        ::metrics::counter!(MetricName::PublishNotReady.as_str()).increment(1);
    }
}

pub mod blobs {
    use super::MetricName;

    pub fn upload(bytes: usize) {
        ::metrics::counter!(MetricName::BlobUploads.as_str()).increment(1);
        ::metrics::histogram!("bdp_blob_upload_bytes").record(bytes as f64);
    }

    pub fn logo_uploaded() {
        ::metrics::counter!(MetricName::LogosUploaded.as_str()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_names_follow_convention() {
        for name in [
            MetricName::PackagesIngested,
            MetricName::DatasetsCreated,
            MetricName::StageSuccess,
            MetricName::BlobUploads,
        ] {
            assert!(name.as_str().starts_with("bdp_"));
            assert!(name.as_str().ends_with("_total"));
        }
    }
}
