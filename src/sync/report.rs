use std::fmt;

use chrono::{DateTime, Utc};

use crate::markdown::MergeAction;

/// Why an item was left alone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Not modified since the last run
    Unchanged,
    NoFrontMatter,
    /// Header has no `notion_id`
    NotLinked,
    /// The linked id does not resolve to a page
    InvalidRecord(String),
}

/// Outcome of processing one file, note or project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Pushed { blocks: usize },
    Written(MergeAction),
    Skipped(SkipReason),
    Failed(String),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    /// File path, or note / project title
    pub item: String,
    pub outcome: Outcome,
}

/// Outcomes of one direction of a run, in processing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub items: Vec<ItemReport>,
}

impl PassReport {
    pub fn record(&mut self, item: impl Into<String>, outcome: Outcome) {
        self.items.push(ItemReport {
            item: item.into(),
            outcome,
        });
    }

    pub fn outcome_of(&self, item: &str) -> Option<&Outcome> {
        self.items.iter().find(|r| r.item == item).map(|r| &r.outcome)
    }

    /// Items that changed something locally or remotely
    pub fn changed(&self) -> usize {
        self.items
            .iter()
            .filter(|r| match &r.outcome {
                Outcome::Pushed { .. } => true,
                Outcome::Written(action) => *action != MergeAction::Unchanged,
                _ => false,
            })
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.items
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Skipped(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.items.iter().filter(|r| r.outcome.is_failure()).count()
    }
}

/// Result of a complete run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub previous_cursor: DateTime<Utc>,
    pub cursor: DateTime<Utc>,
    pub push: PassReport,
    pub pull: PassReport,
    /// Duration of sync in milliseconds
    pub duration_ms: u64,
}

impl SyncReport {
    pub fn failed(&self) -> usize {
        self.push.failed() + self.pull.failed()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pushed {} ({} skipped, {} failed), pulled {} ({} skipped, {} failed) in {}ms",
            self.push.changed(),
            self.push.skipped(),
            self.push.failed(),
            self.pull.changed(),
            self.pull.skipped(),
            self.pull.failed(),
            self.duration_ms
        )
    }
}
