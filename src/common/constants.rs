/// Status keys under which each publication stage records its outcome.
/// These are the keys callers see in the accumulated pipeline status.
pub const PREPROCESS_STATUS_KEY: &str = "preprocess";
pub const MODEL_STATUS_KEY: &str = "model";
pub const OPENSPENDING_STATUS_KEY: &str = "openspending";

// Task names, as they appear in spans, logs and serialized tasks
pub const CREATE_DATA_PACKAGE_TASK: &str = "create_data_package";
pub const CREATE_DATASET_TASK: &str = "create_dataset";
pub const PREPROCESS_DATASET_TASK: &str = "preprocess_dataset";
pub const GENERATE_MODEL_TASK: &str = "generate_model";
pub const PUBLISH_DATASET_TASK: &str = "publish_dataset";
pub const UPLOAD_LOGO_TASK: &str = "upload_logo";
pub const UPLOAD_DATA_PACKAGE_TASK: &str = "upload_data_package";

// Blob store key prefixes
pub const DATASETS_PREFIX: &str = "datasets";
pub const MODELS_PREFIX: &str = "models";
pub const LOGOS_PREFIX: &str = "logos";

/// Field in the publishing service response holding the publication URL
pub const PUBLICATION_URL_FIELD: &str = "html_url";

pub const CSV_CONTENT_TYPE: &str = "text/csv";
pub const JSON_CONTENT_TYPE: &str = "application/json";

pub const DEFAULT_CONFIG_PATH: &str = "bdp_catalog.toml";
pub const DEFAULT_BLOB_ROOT: &str = "data/blobs";
