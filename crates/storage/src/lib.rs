#![forbid(unsafe_code)]

pub mod records;
pub mod repository;
pub mod sqlite;
pub mod state;

pub use repository::{InMemoryStore, KeyValueStore, Storage, StorageError};
pub use state::{QuizStateStore, StateKey};
