pub mod models;
pub mod prompt;
pub mod relay;
pub mod session;
pub mod store;

pub use models::{Conversation, Role, Turn};
pub use relay::{Relay, RelayError, RelayReply};
pub use session::{Backend, HistoryMode, Session};
pub use store::{ConversationStore, StoreStats};
