pub mod config;
pub mod error;
pub mod model;
pub mod observability;
pub mod protocol;
pub mod session;
pub mod stream;
pub mod transport;

mod util;

pub use error::AdapterError;
pub use model::{AdkLanguageModel, AdkProvider, LanguageModel, StreamRequest, StreamResponse};
pub use protocol::normalized::{ClientStreamEvent, FinishReason, NormalizedMessage, Usage};
