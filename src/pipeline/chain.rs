use crate::common::error::{CatalogError, Result};
use crate::pipeline::status::StageKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An ordered list of stages to run for one dataset. Built through
/// [`ChainBuilder`], which rejects orders that would run a stage before one
/// it depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ChainParts")]
pub struct PublicationChain {
    dataset_id: Uuid,
    stages: Vec<StageKind>,
}

/// Wire form of a chain, validated through [`ChainBuilder`] on the way in.
#[derive(Deserialize)]
struct ChainParts {
    dataset_id: Uuid,
    stages: Vec<StageKind>,
}

impl TryFrom<ChainParts> for PublicationChain {
    type Error = CatalogError;

    fn try_from(parts: ChainParts) -> Result<Self> {
        parts
            .stages
            .into_iter()
            .fold(PublicationChain::builder(parts.dataset_id), ChainBuilder::then)
            .build()
    }
}

impl PublicationChain {
    pub fn builder(dataset_id: Uuid) -> ChainBuilder {
        ChainBuilder {
            dataset_id,
            stages: Vec::new(),
        }
    }

    /// preprocess → model → publish
    pub fn standard(dataset_id: Uuid) -> Self {
        Self {
            dataset_id,
            stages: vec![StageKind::Preprocess, StageKind::Model, StageKind::Publish],
        }
    }

    pub fn dataset_id(&self) -> Uuid {
        self.dataset_id
    }

    pub fn stages(&self) -> &[StageKind] {
        &self.stages
    }
}

pub struct ChainBuilder {
    dataset_id: Uuid,
    stages: Vec<StageKind>,
}

impl ChainBuilder {
    pub fn then(mut self, stage: StageKind) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn build(self) -> Result<PublicationChain> {
        if self.stages.is_empty() {
            return Err(CatalogError::Pipeline("chain has no stages".to_string()));
        }
        for (i, stage) in self.stages.iter().enumerate() {
            if self.stages[..i].contains(stage) {
                return Err(CatalogError::Pipeline(format!(
                    "stage '{}' appears more than once",
                    stage
                )));
            }
            // A dependency may be absent (its artifact can already exist) but
            // never scheduled after its dependent.
            if let Some(late) = stage
                .dependencies()
                .iter()
                .find(|dep| self.stages[i + 1..].contains(dep))
            {
                return Err(CatalogError::Pipeline(format!(
                    "stage '{}' is scheduled before its dependency '{}'",
                    stage, late
                )));
            }
        }
        Ok(PublicationChain {
            dataset_id: self.dataset_id,
            stages: self.stages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_matches_standard_chain() {
        let id = Uuid::new_v4();
        let built = PublicationChain::builder(id)
            .then(StageKind::Preprocess)
            .then(StageKind::Model)
            .then(StageKind::Publish)
            .build()
            .unwrap();
        assert_eq!(built, PublicationChain::standard(id));
    }

    #[test]
    fn test_partial_chains_are_allowed() {
        let id = Uuid::new_v4();
        let chain = PublicationChain::builder(id)
            .then(StageKind::Model)
            .then(StageKind::Publish)
            .build()
            .unwrap();
        assert_eq!(chain.stages(), &[StageKind::Model, StageKind::Publish]);
    }

    #[test]
    fn test_rejects_out_of_order_and_duplicate_stages() {
        let id = Uuid::new_v4();
        let err = PublicationChain::builder(id)
            .then(StageKind::Publish)
            .then(StageKind::Preprocess)
            .build()
            .unwrap_err();
        assert!(matches!(err, CatalogError::Pipeline(ref m) if m.contains("before its dependency")));

        let err = PublicationChain::builder(id)
            .then(StageKind::Preprocess)
            .then(StageKind::Preprocess)
            .build()
            .unwrap_err();
        assert!(matches!(err, CatalogError::Pipeline(ref m) if m.contains("more than once")));

        assert!(PublicationChain::builder(id).build().is_err());
    }

    #[test]
    fn test_deserialized_chains_are_validated() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(PublicationChain::standard(id)).unwrap();
        let back: PublicationChain = serde_json::from_value(json).unwrap();
        assert_eq!(back, PublicationChain::standard(id));

        let reordered = serde_json::json!({
            "dataset_id": id,
            "stages": ["openspending", "preprocess"],
        });
        let err = serde_json::from_value::<PublicationChain>(reordered).unwrap_err();
        assert!(err.to_string().contains("before its dependency"), "{}", err);
    }
}
