//! Interactive field editor: gesture state plus the session reducer that owns
//! a document's field list and value map.

pub mod gesture;
pub mod handlers;
pub mod session;

pub use session::{EditorEvent, EditorOutcome, EditorSession, EditorSettings};
