//! Record store access: client wrapper, typed collections, schemas

pub mod mongo;
pub mod schemas;
pub mod store;

pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MutMetadata, RetryPolicy};
pub use store::Store;
