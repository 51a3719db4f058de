//! Model infrastructure module
//!
//! # Structure
//! - `types` - Request, raw completion, and error types
//! - `traits` - ModelProvider trait
//! - `adapter` - Conversation history to wire format
//! - `normalizer` - Raw completion to NormalizedResponse
//! - `clients` - HTTP client implementations

pub mod adapter;
pub mod clients;
pub mod normalizer;
pub mod traits;
pub mod types;

pub use clients::OpenAIClient;
pub use normalizer::normalize;
pub use traits::ModelProvider;
pub use types::{CompletionRequest, ModelError, RawCompletion};
