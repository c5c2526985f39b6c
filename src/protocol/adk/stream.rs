use crate::error::AdapterError;
use crate::protocol::adk::RemoteEvent;

/// Decode the payload of one `data:` frame into an ADK event.
///
/// # Errors
///
/// Returns [`AdapterError::MalformedFrame`] when the payload is not a JSON
/// object of the event shape. Callers log and skip these frames.
pub fn parse_adk_event(payload: &str) -> Result<RemoteEvent, AdapterError> {
    serde_json::from_str::<RemoteEvent>(payload).map_err(|err| {
        AdapterError::MalformedFrame(format!("{err} (payload: {})", preview(payload)))
    })
}

fn preview(payload: &str) -> &str {
    const MAX_PREVIEW_BYTES: usize = 120;
    if payload.len() <= MAX_PREVIEW_BYTES {
        return payload;
    }
    let mut end = MAX_PREVIEW_BYTES;
    while !payload.is_char_boundary(end) {
        end -= 1;
    }
    &payload[..end]
}
