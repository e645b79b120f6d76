//! Type definitions for judge-panel
//!
//! Chat/message types exchanged with model backends, the evaluation task,
//! and the terminal Feedback record.

mod feedback;
mod message;
mod task;

pub use feedback::*;
pub use message::*;
pub use task::*;
