//! Operations offered by the service and the severity floor each applies.

use crate::checker::{ChangeSet, CheckContext};
use crate::comparator::Comparator;
use crate::diff::DiffTree;
use crate::types::Level;

/// What a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Raw structural diff; classification is skipped.
    Diff,
    /// Changes at or above [`Level::Warn`].
    BreakingChanges,
    /// Every classified change.
    Changelog,
}

impl Operation {
    pub const ALL: [Operation; 3] = [
        Operation::Diff,
        Operation::BreakingChanges,
        Operation::Changelog,
    ];

    /// Command name reported to telemetry and used by the CLI.
    pub fn command(&self) -> &'static str {
        match self {
            Operation::Diff => "diff",
            Operation::BreakingChanges => "breaking",
            Operation::Changelog => "changelog",
        }
    }

    /// Last segment of the HTTP route.
    pub fn route(&self) -> &'static str {
        match self {
            Operation::Diff => "diff",
            Operation::BreakingChanges => "breaking-changes",
            Operation::Changelog => "changelog",
        }
    }

    /// Top-level key of a serialized change report.
    pub fn report_key(&self) -> &'static str {
        self.route()
    }

    /// Lowest severity kept, or `None` when classification is bypassed.
    pub fn floor(&self) -> Option<Level> {
        match self {
            Operation::Diff => None,
            Operation::BreakingChanges => Some(Level::Warn),
            Operation::Changelog => Some(Level::Info),
        }
    }
}

/// Result of one operation, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Diff(DiffTree),
    Changes {
        operation: Operation,
        changes: ChangeSet,
    },
}

impl Report {
    /// True for a breaking-changes report that found anything.
    pub fn has_breaking_changes(&self) -> bool {
        match self {
            Report::Changes {
                operation: Operation::BreakingChanges,
                changes,
            } => !changes.is_empty(),
            _ => false,
        }
    }
}

/// Keep the changes admitted by the operation's floor.
pub fn apply_floor(operation: Operation, changes: ChangeSet) -> ChangeSet {
    match operation.floor() {
        Some(floor) => changes.at_least(floor),
        None => changes,
    }
}

/// Turn a diff tree into the report for `operation`.
pub fn classify_result(
    operation: Operation,
    comparator: &dyn Comparator,
    tree: DiffTree,
    ctx: &CheckContext,
) -> Report {
    if operation == Operation::Diff {
        return Report::Diff(tree);
    }
    let changes = apply_floor(operation, comparator.classify(&tree, ctx));
    Report::Changes { operation, changes }
}
