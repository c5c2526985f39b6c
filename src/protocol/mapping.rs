use super::adk::RemoteRole;
use super::normalized::{FinishReason, NormalizedRole};

// ---------------------------------------------------------------------------
// Role mappings
// ---------------------------------------------------------------------------

/// The ADK schema only knows `user` and `model`; system prompts and tool
/// results travel as user turns.
#[must_use]
pub fn normalized_role_to_remote(role: NormalizedRole) -> RemoteRole {
    match role {
        NormalizedRole::System | NormalizedRole::User | NormalizedRole::Tool => RemoteRole::User,
        NormalizedRole::Assistant => RemoteRole::Model,
    }
}

// ---------------------------------------------------------------------------
// Finish reason mappings
// ---------------------------------------------------------------------------

/// Map a remote `finishReason` onto the closed client vocabulary.
///
/// Only `STOP` has a dedicated mapping; every other non-empty value is
/// `other`. An empty string carries no information and yields `None`.
#[must_use]
pub fn remote_finish_to_normalized(reason: &str) -> Option<FinishReason> {
    match reason {
        "" => None,
        "STOP" => Some(FinishReason::Stop),
        _ => Some(FinishReason::Other),
    }
}
