//! Model backends
//!
//! Every agent talks to a model through the [`ModelBackend`] trait. The
//! OpenAI-compatible backend is used for real runs; the mock backend answers
//! deterministically for offline runs and tests.

mod mock;
mod openai;
mod registry;
mod traits;

pub use mock::{MockBackend, MockConfig, Responder};
pub use openai::{OpenAiBackend, OpenAiConfig};
pub use registry::{BackendFactory, BackendKind};
pub use traits::*;
