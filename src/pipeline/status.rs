use crate::common::constants;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The three publication stages, in the order a chain runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StageKind {
    #[serde(rename = "preprocess")]
    Preprocess,
    #[serde(rename = "model")]
    Model,
    #[serde(rename = "openspending")]
    Publish,
}

impl StageKind {
    /// Key the stage reports under in the accumulated status.
    pub fn status_key(&self) -> &'static str {
        match self {
            StageKind::Preprocess => constants::PREPROCESS_STATUS_KEY,
            StageKind::Model => constants::MODEL_STATUS_KEY,
            StageKind::Publish => constants::OPENSPENDING_STATUS_KEY,
        }
    }

    pub fn task_name(&self) -> &'static str {
        match self {
            StageKind::Preprocess => constants::PREPROCESS_DATASET_TASK,
            StageKind::Model => constants::GENERATE_MODEL_TASK,
            StageKind::Publish => constants::PUBLISH_DATASET_TASK,
        }
    }

    /// Status message recorded when the stage fails with `detail`.
    pub fn failure_message(&self, detail: impl fmt::Display) -> String {
        match self {
            StageKind::Preprocess => format!("Failed to preprocess dataset: {}", detail),
            StageKind::Model => format!("Failed to generate model for dataset: {}", detail),
            StageKind::Publish => format!("Failed to send dataset to OpenSpending: {}", detail),
        }
    }

    /// Stages whose artifacts this stage consumes.
    pub fn dependencies(&self) -> &'static [StageKind] {
        match self {
            StageKind::Preprocess => &[],
            StageKind::Model => &[StageKind::Preprocess],
            StageKind::Publish => &[StageKind::Preprocess, StageKind::Model],
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status_key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "message", rename_all = "lowercase")]
pub enum StageOutcome {
    Succeeded(String),
    Failed(String),
}

impl StageOutcome {
    pub fn message(&self) -> &str {
        match self {
            StageOutcome::Succeeded(m) | StageOutcome::Failed(m) => m,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Succeeded(_))
    }
}

/// Running record of every stage attempted so far, threaded from one stage to
/// the next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStatus {
    stages: BTreeMap<StageKind, StageOutcome>,
}

impl PipelineStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: StageKind, outcome: StageOutcome) {
        self.stages.insert(stage, outcome);
    }

    pub fn get(&self, stage: StageKind) -> Option<&StageOutcome> {
        self.stages.get(&stage)
    }

    pub fn message(&self, stage: StageKind) -> Option<&str> {
        self.get(stage).map(|o| o.message())
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn all_succeeded(&self) -> bool {
        !self.stages.is_empty() && self.stages.values().all(|o| o.is_success())
    }

    /// Flat stage-key to message mapping, the shape operators read.
    pub fn messages(&self) -> BTreeMap<&'static str, String> {
        self.stages
            .iter()
            .map(|(k, o)| (k.status_key(), o.message().to_string()))
            .collect()
    }
}

/// What a stage hands to the next link of the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageResult {
    /// The stage ran; its outcome is recorded in the status.
    Completed(PipelineStatus),
    /// Publishing was requested before both artifacts existed. The status is
    /// returned untouched.
    NotReady(PipelineStatus),
}

impl StageResult {
    pub fn status(&self) -> &PipelineStatus {
        match self {
            StageResult::Completed(s) | StageResult::NotReady(s) => s,
        }
    }

    pub fn into_status(self) -> PipelineStatus {
        match self {
            StageResult::Completed(s) | StageResult::NotReady(s) => s,
        }
    }

    pub fn is_not_ready(&self) -> bool {
        matches!(self, StageResult::NotReady(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_keyed_by_stage_in_chain_order() {
        let mut status = PipelineStatus::new();
        status.record(StageKind::Publish, StageOutcome::Failed("down".into()));
        status.record(StageKind::Preprocess, StageOutcome::Succeeded("ok".into()));

        let keys: Vec<_> = status.messages().keys().copied().collect();
        assert_eq!(keys, vec!["openspending", "preprocess"]);
        let ordered: Vec<_> = status.stages.keys().copied().collect();
        assert_eq!(ordered, vec![StageKind::Preprocess, StageKind::Publish]);
        assert!(!status.all_succeeded());
    }

    #[test]
    fn test_status_serializes_with_stage_keys() {
        let mut status = PipelineStatus::new();
        status.record(StageKind::Model, StageOutcome::Succeeded("done".into()));
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["stages"]["model"]["outcome"], "succeeded");
        assert_eq!(json["stages"]["model"]["message"], "done");
    }

    #[test]
    fn test_not_ready_keeps_status() {
        let mut status = PipelineStatus::new();
        status.record(StageKind::Preprocess, StageOutcome::Failed("boom".into()));
        let result = StageResult::NotReady(status.clone());
        assert!(result.is_not_ready());
        assert_eq!(result.into_status(), status);
    }
}
