pub mod blind_index;
pub mod envelope;
pub mod error;
pub mod in_memory_backend;
pub mod key_hierarchy;
pub mod store;

#[cfg(feature = "sqlite")]
pub mod storage;

pub use blind_index::{BlindIndexTranslator, HmacTokenizer};
pub use envelope::EnvelopeCipher;
pub use error::*;
pub use in_memory_backend::InMemoryBackend;
pub use key_hierarchy::KeyHierarchy;
pub use store::DocumentStore;

#[cfg(feature = "sqlite")]
pub use storage::SqliteBackend;
