//! Document state management

mod linked;
pub mod mutations;
mod state;

pub use linked::{Handle, LinkedDocumentSet, LinkedEntry};
pub use mutations::{FormLevel, InteractionKind, MutationError};
pub use state::{reduce, DocumentState, DocumentStore, Event, DEFAULT_TITLE};
