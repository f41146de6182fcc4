//! Per-kind credential state and the decision table driving the workflow.

use super::model::{CredentialKind, IosCredentials};

/// Where a single credential kind stands during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindState {
    /// Nothing stored for this kind
    Absent,
    /// Stored remotely but not yet checked during this run
    PresentUnvalidated,
    Valid,
    Invalid,
}

impl KindState {
    /// Initial state of `kind` given what the build service returned.
    #[must_use]
    pub fn from_existing(existing: Option<&IosCredentials>, kind: CredentialKind) -> Self {
        match existing {
            Some(creds) if creds.has(kind) => Self::PresentUnvalidated,
            _ => Self::Absent,
        }
    }
}

/// What the workflow does next for a credential kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Prompt the operator or delegate generation to the build service
    Collect,
    /// Ask the build service to re-check stored material
    Revalidate,
    /// Nothing left to do for this kind
    Proceed,
    /// Stop the run; the operator must rerun with `--clear-credentials`
    Abort,
}

/// Map a kind's state and the clear-credentials flag to the next action.
///
/// Collection and revalidation are mutually exclusive for any input: the clear
/// flag forces collection, otherwise only `Absent` collects and only
/// `PresentUnvalidated` revalidates.
#[must_use]
pub fn next_action(state: KindState, clear_credentials: bool) -> NextAction {
    if clear_credentials {
        return match state {
            KindState::Valid => NextAction::Proceed,
            _ => NextAction::Collect,
        };
    }

    match state {
        KindState::Absent => NextAction::Collect,
        KindState::PresentUnvalidated => NextAction::Revalidate,
        KindState::Valid => NextAction::Proceed,
        KindState::Invalid => NextAction::Abort,
    }
}
