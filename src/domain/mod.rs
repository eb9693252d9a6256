use crate::pipeline::status::PipelineStatus;
use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

static OPENSPENDING_SLUG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"http[s]*://[a-zA-Z0-9.-]+/([a-z0-9-]+)/?").expect("valid openspending slug regex")
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Option<Uuid>,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub creator: String,
    pub featured_viz: Option<Uuid>,
    pub logo_url: Option<String>,
}

impl Project {
    pub fn new(title: impl Into<String>, creator: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            slug: String::new(),
            description: String::new(),
            creator: creator.into(),
            featured_viz: None,
            logo_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPackage {
    pub id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    /// Metadata URL the package description was fetched from
    pub path: Option<String>,
    pub project_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: Option<Uuid>,
    pub datapackage_id: Option<Uuid>,
    pub project_id: Uuid,
    pub created: DateTime<Utc>,

    // Artifact URLs, set by the publication stages
    pub preprocessed: Option<String>,
    pub datamodel: Option<String>,
    pub openspending: Option<String>,

    // Copied from the resource description
    pub path: Option<String>,
    pub name: String,
    pub currency: String,
    pub date_last_updated: NaiveDateTime,
    pub date_published: NaiveDateTime,
    pub fiscal_year: Option<NaiveDateTime>,
    pub granularity: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub dataset_type: String,
    pub description: Option<String>,

    /// Outcome of the last completed publication chain
    pub pipeline_status: Option<PipelineStatus>,
}

impl Dataset {
    /// True once both artifacts the publishing service needs exist.
    pub fn is_publishable(&self) -> bool {
        self.preprocessed.is_some() && self.datamodel.is_some()
    }

    /// Slug of the dataset on the publishing service, taken from the first path
    /// segment of the publication URL.
    pub fn openspending_slug(&self) -> Option<String> {
        let url = self.openspending.as_deref()?;
        OPENSPENDING_SLUG_RE
            .captures(url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationType {
    Bubbletree,
    Barchart,
    Treemap,
    Linebars,
    Stackedbar,
}

impl VisualizationType {
    pub const ALL: [VisualizationType; 5] = [
        VisualizationType::Bubbletree,
        VisualizationType::Barchart,
        VisualizationType::Treemap,
        VisualizationType::Linebars,
        VisualizationType::Stackedbar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VisualizationType::Bubbletree => "bubbletree",
            VisualizationType::Barchart => "barchart",
            VisualizationType::Treemap => "treemap",
            VisualizationType::Linebars => "linebars",
            VisualizationType::Stackedbar => "stackedbar",
        }
    }
}

impl fmt::Display for VisualizationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisualizationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VisualizationType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown visualization type: {}", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visualization {
    pub id: Option<Uuid>,
    pub dataset_id: Uuid,
    pub order: i32,
    pub drilldowns: String,
    pub cuts: Option<String>,
    #[serde(rename = "type")]
    pub viz_type: VisualizationType,
    pub description: Option<String>,
}

impl Visualization {
    pub fn new(dataset_id: Uuid, viz_type: VisualizationType, drilldowns: impl Into<String>) -> Self {
        Self {
            id: None,
            dataset_id,
            order: 0,
            drilldowns: drilldowns.into(),
            cuts: None,
            viz_type,
            description: None,
        }
    }
}

/// Lowercase, ASCII-alphanumeric, hyphen-separated form of `input`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }
    slug
}
