//! Provider Adapters
//!
//! Pluggable upstream providers. Each adapter hides one provider's wire format
//! behind the [`ProviderAdapter`] trait and yields canonical [`Delta`]s.
//!
//! # Supported Formats
//!
//! - OpenAI-compatible SSE (`data: {json}` ... `data: [DONE]`)
//! - DeepSeek reasoning streams (bare JSON lines with `reasoning_content`)
//! - GreatWall event-tagged workflow streams

pub mod decoder;
pub mod deepseek;
pub mod greatwall;
pub mod http;
pub mod lines;
pub mod mock;
pub mod openai;
pub mod registry;
pub mod retry;
pub mod traits;

pub use decoder::{decode_lines, decode_stream, decoder_for, DecodeError, LineDecoder, LineOutcome};
pub use http::{AdapterBuildError, HttpProviderAdapter};
pub use lines::{LineError, LineStream, MAX_LINE_BYTES};
pub use mock::ScriptedAdapter;
pub use registry::{AdapterRegistry, AdapterRegistryBuilder, ProviderEntry};
pub use retry::RetryConfig;
pub use traits::{BackendError, Delta, DeltaStream, LlmRequest, ProviderAdapter, WireFormat};
