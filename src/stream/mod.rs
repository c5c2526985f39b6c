pub mod reconciler;
pub mod sse;

pub use reconciler::{DeltaReconciler, ReconciledEvents, TurnText};
pub use sse::{sse_data_stream, SseLineDecoder, Utf8ChunkDecoder};

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::error::AdapterError;
use crate::protocol::adk::stream::parse_adk_event;
use crate::protocol::normalized::ClientStreamEvent;

/// Lazy, finite sequence of client events for one `/run_sse` call.
///
/// Ends with exactly one `Finish` on a clean close, or with exactly one
/// `Err` (and no `Finish`) when the body read fails.
pub type ClientEventStream =
    Pin<Box<dyn Stream<Item = Result<ClientStreamEvent, AdapterError>> + Send>>;

type FrameStream<E> = Pin<Box<dyn Stream<Item = Result<String, E>> + Send>>;

struct PipelineState<E> {
    frames: Option<FrameStream<E>>,
    reconciler: DeltaReconciler,
    scratch: ReconciledEvents,
    pending: VecDeque<ClientStreamEvent>,
    skipped_frames: usize,
}

/// Build the decode, parse and reconcile pipeline over a response body.
///
/// Frames that fail to decode are logged and skipped. A read error from
/// `byte_stream` is surfaced once as [`AdapterError::TransportUnavailable`]
/// and ends the sequence. Dropping the returned stream drops the body.
pub fn client_event_stream<S, E>(byte_stream: S) -> ClientEventStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = PipelineState {
        frames: Some(Box::pin(sse_data_stream(byte_stream)) as FrameStream<E>),
        reconciler: DeltaReconciler::new(),
        scratch: ReconciledEvents::new(),
        pending: VecDeque::with_capacity(4),
        skipped_frames: 0,
    };

    let stream = futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }

            let frames = state.frames.as_mut()?;
            match frames.next().await {
                Some(Ok(payload)) => match parse_adk_event(&payload) {
                    Ok(event) => {
                        state.reconciler.apply(&event, &mut state.scratch);
                        state.pending.extend(state.scratch.drain(..));
                    }
                    Err(err) => {
                        state.skipped_frames += 1;
                        tracing::warn!(error = %err, "skipping malformed ADK frame");
                    }
                },
                Some(Err(err)) => {
                    state.frames = None;
                    tracing::warn!(error = %err, "ADK stream body read failed");
                    let err =
                        AdapterError::TransportUnavailable(format!("stream read failed: {err}"));
                    return Some((Err(err), state));
                }
                None => {
                    state.frames = None;
                    if state.skipped_frames > 0 {
                        tracing::debug!(
                            skipped_frames = state.skipped_frames,
                            "ADK stream ended with skipped frames"
                        );
                    }
                    if let Some(finish) = state.reconciler.finish() {
                        state.pending.push_back(finish);
                    }
                }
            }
        }
    });
    Box::pin(stream)
}
