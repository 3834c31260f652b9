pub mod mysql;
pub mod observer;
pub mod schema;

use async_trait::async_trait;

use crate::errors::StorageError;
use crate::messages::Message;

pub use mysql::MySqlStore;
pub use observer::StorageObserver;

/// Destination for decoded messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn store(&self, message: &Message) -> Result<(), StorageError>;
}
