//! Per-entity sync outcomes and the status summaries rendered from them
//!
//! Outcomes are kept as values until the very end of a cycle; only
//! [`StatusReport::render`] knows the text grammar stored on the resource.

use std::fmt;

/// Summary written when a pass touched nothing
pub const NO_ACTION: &str = "No action was taken";

/// Label shared by every entity declared without a name
pub const MISSING_NAME_LABEL: &str = "missing name";

/// What happened to one entity during a cycle
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncAction {
    /// The entity did not exist and was created
    Created,
    /// The entity existed and was overwritten with the declared state
    Updated,
    /// No call was made for the entity
    Skipped(String),
    /// The service rejected the call or could not be reached
    Failed(String),
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::Created => write!(f, "created"),
            SyncAction::Updated => write!(f, "updated"),
            SyncAction::Skipped(reason) => write!(f, "{}", reason),
            SyncAction::Failed(detail) => write!(f, "error: {}", detail),
        }
    }
}

/// Outcome of one entity, keyed by its status label
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Usually the qualified name
    pub label: String,
    /// What happened
    pub action: SyncAction,
}

/// Ordered outcomes of one pass over one entity kind
///
/// Entries keep first-recorded order. Recording a label twice replaces the
/// earlier action in place, so repeated missing names collapse into one entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusReport {
    entries: Vec<SyncOutcome>,
}

impl StatusReport {
    /// Record the outcome for `label`
    pub fn record(&mut self, label: impl Into<String>, action: SyncAction) {
        let label = label.into();
        match self.entries.iter_mut().find(|entry| entry.label == label) {
            Some(entry) => entry.action = action,
            None => self.entries.push(SyncOutcome { label, action }),
        }
    }

    /// Record an entity that was skipped because it has no name
    pub fn record_missing_name(&mut self, message: &str) {
        self.record(MISSING_NAME_LABEL, SyncAction::Skipped(message.to_string()));
    }

    /// Outcome recorded for `label`, if any
    pub fn get(&self, label: &str) -> Option<&SyncAction> {
        self.entries
            .iter()
            .find(|entry| entry.label == label)
            .map(|entry| &entry.action)
    }

    /// Outcomes in recorded order
    pub fn entries(&self) -> &[SyncOutcome] {
        &self.entries
    }

    /// True if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as `"{label}: {action}"` pairs joined by `", "`
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return NO_ACTION.to_string();
        }
        self.entries
            .iter()
            .map(|entry| format!("{}: {}", entry.label, entry.action))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// The three summaries persisted on a ConsulACL after a cycle
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AclStatusSummary {
    /// Rendered policy pass
    pub policies: String,
    /// Rendered role pass
    pub roles: String,
    /// Rendered binding rule pass
    pub bind_rules: String,
}

impl AclStatusSummary {
    /// Render the three pass reports
    pub fn from_reports(
        policies: &StatusReport,
        roles: &StatusReport,
        bind_rules: &StatusReport,
    ) -> Self {
        Self {
            policies: policies.render(),
            roles: roles.render(),
            bind_rules: bind_rules.render(),
        }
    }
}
