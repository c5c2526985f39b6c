use std::time::{Duration, Instant};

use tracing::info;

use crate::protocol::normalized::{ClientStreamEvent, FinishReason, Usage};

/// Log token usage for a completed stream at INFO level.
pub fn log_stream_usage(model: &str, reason: FinishReason, usage: &Usage, duration: Duration) {
    info!(
        model = model,
        finish_reason = reason.as_str(),
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        total_tokens = usage.total_tokens,
        reasoning_tokens = usage.reasoning_tokens.unwrap_or(0),
        duration_seconds = duration.as_secs_f64(),
        "stream completed"
    );
}

/// Watches a client event stream and logs usage when its `Finish` passes.
#[derive(Debug)]
pub struct StreamUsageLog {
    model: String,
    started: Instant,
    text_chars: usize,
    tool_calls: usize,
}

impl StreamUsageLog {
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            started: Instant::now(),
            text_chars: 0,
            tool_calls: 0,
        }
    }

    pub fn observe(&mut self, event: &ClientStreamEvent) {
        match event {
            ClientStreamEvent::TextDelta { delta, .. } => {
                self.text_chars += delta.chars().count();
            }
            ClientStreamEvent::ToolCallDelta { .. } => self.tool_calls += 1,
            ClientStreamEvent::Finish { reason, usage } => {
                tracing::debug!(
                    model = %self.model,
                    text_chars = self.text_chars,
                    tool_calls = self.tool_calls,
                    "stream output summary"
                );
                log_stream_usage(&self.model, *reason, usage, self.started.elapsed());
            }
        }
    }

    #[must_use]
    pub fn text_chars(&self) -> usize {
        self.text_chars
    }

    #[must_use]
    pub fn tool_calls(&self) -> usize {
        self.tool_calls
    }
}
