// src/storage/mod.rs

pub mod memory;

#[cfg(test)]
mod tests;

pub use memory::{MemoryOrderStore, MemoryTransaction};

use super::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use uuid::Uuid;

/// A Priority or Status row, reduced to what ordering needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedItem {
    /// Surrogate id, positive and never reused
    pub id: i64,

    /// Public key exposed by the API
    pub key: Uuid,

    /// Tenant the order values are unique within
    pub owner: String,

    pub name: String,

    /// Position, `1..=N` within the owner
    pub order: i64,
}

/// A unit of work scoped to one owner.
///
/// Writes become visible to other transactions only on [`commit`]. Dropping
/// a transaction without committing discards its writes.
///
/// [`commit`]: OrderTransaction::commit
#[async_trait]
pub trait OrderTransaction: Send {
    /// All rows of `owner`, sorted by `order`
    async fn list_by_owner(&mut self, owner: &str) -> Result<Vec<OrderedItem>>;

    /// Sets the order of one row. Fails if another row of the owner already
    /// holds `new_order`.
    async fn update_order(&mut self, id: i64, owner: &str, new_order: i64) -> Result<()>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

/// The storage collaborator of the reorder algorithm
#[async_trait]
pub trait OrderStore: Send + Sync + Debug {
    // The type of configuration this store accepts
    type Config: Send + Sync;

    type Transaction: OrderTransaction;

    // Creates a new instance of this store with the given configuration
    async fn new(config: Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Opens a transaction on `owner`. Transactions on the same owner
    /// serialize; different owners proceed independently.
    async fn begin(&self, owner: &str) -> Result<Self::Transaction>;
}
