//! Turns decoded ADK events into the minimal client event sequence.
//!
//! The service reports text two ways within one turn: `partial` events carry
//! the cumulative text so far, and a closing non-partial event repeats the
//! authoritative full text. [`DeltaReconciler`] tracks what has already been
//! emitted so the client sees each character exactly once.

use smallvec::SmallVec;

use crate::protocol::adk::{RemoteEvent, RemotePart, UsageMetadata};
use crate::protocol::mapping::remote_finish_to_normalized;
use crate::protocol::normalized::{ClientStreamEvent, FinishReason, Usage};
use crate::util::next_call_id;

/// Events produced by one remote event. Most events yield zero or one.
pub type ReconciledEvents = SmallVec<[ClientStreamEvent; 2]>;

const UNKNOWN_EVENT_ID: &str = "unknown";

/// Text state of the current turn.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TurnText {
    /// Nothing emitted yet.
    #[default]
    NoText,
    /// Partial snapshots are arriving; holds the text emitted so far.
    Streaming(String),
    /// A final event closed the turn; holds its authoritative text.
    Finalized(String),
}

impl TurnText {
    #[must_use]
    pub fn running_text(&self) -> &str {
        match self {
            TurnText::NoText => "",
            TurnText::Streaming(text) | TurnText::Finalized(text) => text,
        }
    }
}

/// Per-request reconciliation state.
#[derive(Debug, Default)]
pub struct DeltaReconciler {
    turn: TurnText,
    usage: Usage,
    reason: FinishReason,
    finished: bool,
}

impl DeltaReconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one remote event and append the client events it causes.
    pub fn apply(&mut self, event: &RemoteEvent, out: &mut ReconciledEvents) {
        if self.finished {
            return;
        }
        if let Some(metadata) = event.usage_metadata.as_ref() {
            self.usage = usage_from_metadata(metadata);
        }
        if let Some(reason) = event
            .finish_reason
            .as_deref()
            .and_then(remote_finish_to_normalized)
        {
            self.reason = reason;
        }
        if event.error_code.is_some() || event.error_message.is_some() {
            tracing::warn!(
                error_code = event.error_code.as_deref().unwrap_or(""),
                error_message = event.error_message.as_deref().unwrap_or(""),
                "ADK event reported an error"
            );
            self.reason = FinishReason::Error;
        }

        let event_id = event.id.as_deref().unwrap_or(UNKNOWN_EVENT_ID);
        let partial = event.is_partial();
        for part in event.parts() {
            match part {
                RemotePart::Text(text) => {
                    let delta = if partial {
                        self.apply_partial(text)
                    } else {
                        self.apply_final(text)
                    };
                    if let Some(delta) = delta {
                        out.push(ClientStreamEvent::TextDelta {
                            id: event_id.to_string(),
                            delta,
                        });
                    }
                }
                RemotePart::FunctionCall(call) => {
                    let args_text_delta = serde_json::to_string(&call.args)
                        .unwrap_or_else(|_| "{}".to_string());
                    out.push(ClientStreamEvent::ToolCallDelta {
                        tool_call_id: call.id.clone().unwrap_or_else(next_call_id),
                        tool_name: call.name.clone(),
                        args_text_delta,
                    });
                }
                RemotePart::FunctionResponse(response) => {
                    tracing::debug!(
                        tool_name = %response.name,
                        tool_call_id = response.id.as_deref().unwrap_or(""),
                        "ADK function response observed"
                    );
                }
                RemotePart::InlineData(data) => {
                    tracing::debug!(mime_type = %data.mime_type, "ADK inline data part ignored");
                }
            }
        }
    }

    /// Close the stream. Returns the single `Finish` event on the first call
    /// and `None` afterwards.
    pub fn finish(&mut self) -> Option<ClientStreamEvent> {
        if self.finished {
            return None;
        }
        self.finished = true;
        let reason = match self.reason {
            FinishReason::Unknown => FinishReason::Stop,
            other => other,
        };
        Some(ClientStreamEvent::Finish {
            reason,
            usage: self.usage,
        })
    }

    #[must_use]
    pub fn turn(&self) -> &TurnText {
        &self.turn
    }

    #[must_use]
    pub fn running_text(&self) -> &str {
        self.turn.running_text()
    }

    #[must_use]
    pub fn usage(&self) -> Usage {
        self.usage
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    // A partial after a final starts a new turn. A snapshot that does not
    // extend the running text is emitted whole.
    fn apply_partial(&mut self, snapshot: &str) -> Option<String> {
        let previous = match std::mem::take(&mut self.turn) {
            TurnText::Streaming(text) => text,
            TurnText::NoText | TurnText::Finalized(_) => String::new(),
        };
        let delta = match snapshot.strip_prefix(previous.as_str()) {
            Some(suffix) => suffix,
            None => {
                tracing::debug!(
                    emitted = previous.len(),
                    snapshot = snapshot.len(),
                    "partial snapshot does not extend emitted text; resuming from empty"
                );
                snapshot
            }
        };
        let delta = (!delta.is_empty()).then(|| delta.to_string());
        self.turn = TurnText::Streaming(snapshot.to_string());
        delta
    }

    // The final text always becomes the running text. After streaming, only
    // a strict extension of what was emitted produces a delta.
    fn apply_final(&mut self, text: &str) -> Option<String> {
        let delta = match std::mem::take(&mut self.turn) {
            TurnText::NoText | TurnText::Finalized(_) => {
                (!text.is_empty()).then(|| text.to_string())
            }
            TurnText::Streaming(emitted) => match text.strip_prefix(emitted.as_str()) {
                Some(suffix) if !suffix.is_empty() => Some(suffix.to_string()),
                Some(_) => None,
                None => {
                    tracing::warn!(
                        emitted = emitted.len(),
                        final_len = text.len(),
                        "final text does not extend streamed text; keeping streamed output"
                    );
                    None
                }
            },
        };
        self.turn = TurnText::Finalized(text.to_string());
        delta
    }
}

fn usage_from_metadata(metadata: &UsageMetadata) -> Usage {
    let prompt_tokens = metadata.prompt_token_count.unwrap_or(0);
    let completion_tokens = metadata.candidates_token_count.unwrap_or(0);
    Usage {
        prompt_tokens,
        completion_tokens,
        total_tokens: metadata
            .total_token_count
            .unwrap_or(prompt_tokens.saturating_add(completion_tokens)),
        reasoning_tokens: metadata.thoughts_token_count,
    }
}
