#![forbid(unsafe_code)]

pub mod firestore;
pub mod local;
pub mod repository;
pub mod sqlite;

pub use local::LocalProgressStore;
pub use repository::{KeyValueStore, RemoteProgressStore, Storage, StorageError};
