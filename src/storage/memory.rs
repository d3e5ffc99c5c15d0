// src/storage/memory.rs

// In-memory ordered-list storage (for testing and lightweight usage).
// Mirrors a relational table with a unique (owner, order) constraint.
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time;
use tracing::debug;
use uuid::Uuid;

use crate::config::MemoryStoreConfig;
use crate::error::{CoreError, Result, StorageError};
use crate::storage::{OrderStore, OrderTransaction, OrderedItem};
use crate::storage_op;

type Rows = HashMap<String, Vec<OrderedItem>>;

/// In-memory store implementation
#[derive(Debug, Clone)]
pub struct MemoryOrderStore {
    /// Committed rows, keyed by owner
    rows: Arc<RwLock<Rows>>,

    /// One async lock per owner, held for the lifetime of a transaction
    owner_locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,

    next_id: Arc<AtomicI64>,

    config: MemoryStoreConfig,
}

impl MemoryOrderStore {
    /// Creates a new in-memory store with the given configuration
    pub fn new(config: MemoryStoreConfig) -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
            owner_locks: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicI64::new(1)),
            config,
        }
    }

    fn read_rows(&self) -> RwLockReadGuard<'_, Rows> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_rows(&self) -> RwLockWriteGuard<'_, Rows> {
        self.rows.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn owner_lock(&self, owner: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .owner_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // A lock only referenced by the map has no holder and no waiter
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);

        Arc::clone(locks.entry(owner.to_string()).or_default())
    }

    /// Number of owners with a lock entry, mostly useful for tests
    pub fn owner_lock_count(&self) -> usize {
        self.owner_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Waits for exclusive access to `owner`, bounded by the lock timeout
    async fn lock_owner(&self, owner: &str) -> Result<OwnedMutexGuard<()>> {
        let lock = self.owner_lock(owner);
        time::timeout(self.config.lock_timeout, lock.lock_owned())
            .await
            .map_err(|_| CoreError::Storage(StorageError::LockTimeout(owner.to_string())))
    }

    /// Inserts a row at a caller-chosen position
    pub async fn insert(&self, owner: &str, name: &str, order: i64) -> Result<OrderedItem> {
        if order < 1 {
            return Err(CoreError::Validation(
                "Order must be greater than or equal to 1".to_string(),
            ));
        }

        let _guard = self.lock_owner(owner).await?;
        let mut rows = self.write_rows();
        let owned = rows.entry(owner.to_string()).or_default();

        if owned.len() >= self.config.max_items_per_owner {
            return Err(StorageError::CapacityExceeded(owner.to_string()).into());
        }
        if owned.iter().any(|r| r.order == order) {
            return Err(StorageError::UniqueViolation {
                owner: owner.to_string(),
                order,
            }
            .into());
        }

        let item = OrderedItem {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            key: Uuid::new_v4(),
            owner: owner.to_string(),
            name: name.to_string(),
            order,
        };
        owned.push(item.clone());

        Ok(item)
    }

    /// Removes a row. Remaining rows keep their order values.
    pub async fn delete(&self, owner: &str, id: i64) -> Result<bool> {
        let _guard = self.lock_owner(owner).await?;
        let mut rows = self.write_rows();

        let Some(owned) = rows.get_mut(owner) else {
            return Ok(false);
        };
        let before = owned.len();
        owned.retain(|r| r.id != id);

        Ok(owned.len() != before)
    }

    /// Committed rows of `owner`, sorted by order
    pub fn list(&self, owner: &str) -> Vec<OrderedItem> {
        let mut owned = self.read_rows().get(owner).cloned().unwrap_or_default();
        owned.sort_by_key(|r| r.order);
        owned
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    type Config = MemoryStoreConfig;
    type Transaction = MemoryTransaction;

    async fn new(config: Self::Config) -> Result<Self> {
        Ok(Self::new(config))
    }

    async fn begin(&self, owner: &str) -> Result<Self::Transaction> {
        let started = Instant::now();
        let guard = self.lock_owner(owner).await;
        storage_op!("begin", owner, guard, started.elapsed().as_millis() as u64);
        let guard = guard?;

        let staged = self.read_rows().get(owner).cloned().unwrap_or_default();

        Ok(MemoryTransaction {
            owner: owner.to_string(),
            staged,
            rows: Arc::clone(&self.rows),
            started,
            _guard: guard,
        })
    }
}

/// Transaction over a private copy of one owner's rows
#[derive(Debug)]
pub struct MemoryTransaction {
    owner: String,
    staged: Vec<OrderedItem>,
    rows: Arc<RwLock<Rows>>,
    started: Instant,
    _guard: OwnedMutexGuard<()>,
}

impl MemoryTransaction {
    fn ensure_owner(&self, owner: &str) -> Result<()> {
        if owner == self.owner {
            Ok(())
        } else {
            Err(StorageError::OwnerMismatch {
                expected: self.owner.clone(),
                actual: owner.to_string(),
            }
            .into())
        }
    }
}

#[async_trait]
impl OrderTransaction for MemoryTransaction {
    async fn list_by_owner(&mut self, owner: &str) -> Result<Vec<OrderedItem>> {
        self.ensure_owner(owner)?;

        let mut owned = self.staged.clone();
        owned.sort_by_key(|r| r.order);
        Ok(owned)
    }

    async fn update_order(&mut self, id: i64, owner: &str, new_order: i64) -> Result<()> {
        self.ensure_owner(owner)?;

        // Unique (owner, order), checked row by row like a database would
        if self.staged.iter().any(|r| r.id != id && r.order == new_order) {
            return Err(StorageError::UniqueViolation {
                owner: owner.to_string(),
                order: new_order,
            }
            .into());
        }

        let row = self
            .staged
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StorageError::RowNotFound {
                id,
                owner: owner.to_string(),
            })?;
        row.order = new_order;

        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let result: Result<()> = {
            let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
            if self.staged.is_empty() {
                rows.remove(&self.owner);
            } else {
                rows.insert(self.owner.clone(), self.staged);
            }
            Ok(())
        };

        storage_op!(
            "commit",
            self.owner.as_str(),
            result,
            self.started.elapsed().as_millis() as u64
        );
        result
    }

    async fn rollback(self) -> Result<()> {
        debug!(owner = self.owner.as_str(), "Transaction rolled back");
        Ok(())
    }
}
