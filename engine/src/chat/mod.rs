//! Chat Store, resources, and chat files (spec §4.5, §3, C5).

pub mod file;
pub mod memory;
pub mod resource;
pub mod store;

pub use file::{ChatFile, ChatFileStore, SqliteChatFileStore};
pub use memory::InMemoryChatStore;
pub use resource::{Resource, SqliteResourceStore};
pub use store::{ChatStore, SqliteChatStore};
