pub mod citation;
pub mod objective;
pub mod playback;
pub mod prompt;
pub mod result;
pub mod scope;

mod error;

pub use error::{Error, Result};
pub use result::{ConversationId, Neighbor, QueryResult, TurnContext};
pub use scope::Scope;
