use serde::{Deserialize, Serialize};

/// Condition communicating the overall outcome of reconciliation.
pub const READY_CONDITION: &str = "Ready";
/// Condition marking a terminal, non-retried failure state.
pub const STALLED_CONDITION: &str = "Stalled";
/// Condition marking an attempt in progress.
pub const RECONCILING_CONDITION: &str = "Reconciling";

/// Reason codes recorded on conditions.
pub mod reason {
    pub const SUCCEEDED: &str = "Succeeded";
    pub const PROGRESSING: &str = "Progressing";
    pub const PROGRESSING_WITH_RETRY: &str = "ProgressingWithRetry";
    pub const GET_RESOURCE_FAILED: &str = "GetResourceFailed";
    pub const AUTHENTICATED_CONTEXT_CREATION_FAILED: &str = "AuthenticatedContextCreationFailed";
    pub const GET_COMPONENT_DESCRIPTOR_FAILED: &str = "GetComponentDescriptorFailed";
    pub const COMPONENT_DESCRIPTOR_NOT_FOUND: &str = "ComponentDescriptorNotFound";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// A named boolean-with-reason status field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
}

/// The ordered condition set carried by an object's status block.
///
/// Setting a condition replaces any existing condition of the same
/// type in place; new conditions append.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conditions(Vec<Condition>);

impl Conditions {
    pub fn get(&self, kind: &str) -> Option<&Condition> {
        self.0.iter().find(|c| c.kind == kind)
    }

    pub fn has(&self, kind: &str) -> bool {
        self.get(kind).is_some()
    }

    /// True when the named condition exists with status True.
    pub fn is_true(&self, kind: &str) -> bool {
        matches!(self.get(kind), Some(c) if c.status == ConditionStatus::True)
    }

    pub fn set(&mut self, condition: Condition) {
        match self.0.iter_mut().find(|c| c.kind == condition.kind) {
            Some(existing) => *existing = condition,
            None => self.0.push(condition),
        }
    }

    pub fn delete(&mut self, kind: &str) {
        self.0.retain(|c| c.kind != kind);
    }

    pub fn mark_true(&mut self, kind: &str, reason: &str, message: impl Into<String>) {
        self.set(Condition {
            kind: kind.to_string(),
            status: ConditionStatus::True,
            reason: reason.to_string(),
            message: message.into(),
        });
    }

    pub fn mark_false(&mut self, kind: &str, reason: &str, message: impl Into<String>) {
        self.set(Condition {
            kind: kind.to_string(),
            status: ConditionStatus::False,
            reason: reason.to_string(),
            message: message.into(),
        });
    }

    /// Mark the object as progressing through an attempt.
    pub fn mark_reconciling(&mut self, reason: &str, message: impl Into<String>) {
        self.mark_true(RECONCILING_CONDITION, reason, message);
    }

    /// Mark the object stalled. Stalled excludes Reconciling, so the
    /// progress condition is dropped here rather than left to rot.
    pub fn mark_stalled(&mut self, reason: &str, message: impl Into<String>) {
        let message = message.into();
        self.mark_true(STALLED_CONDITION, reason, message);
        self.delete(RECONCILING_CONDITION);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Condition> {
        self.0.iter()
    }
}
