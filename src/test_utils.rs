// src/test_utils.rs

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::MemoryStoreConfig;
use crate::error::{CoreError, Result, StorageError};
use crate::http::HeaderSink;
use crate::storage::{MemoryOrderStore, MemoryTransaction, OrderStore, OrderTransaction, OrderedItem};

/// Store that fails the n-th `update_order` call (1-based, counted across
/// transactions). Everything else goes to a [`MemoryOrderStore`].
#[derive(Debug, Clone)]
pub struct FailingOrderStore {
    pub inner: MemoryOrderStore,
    fail_on_update: usize,
    updates: Arc<AtomicUsize>,
}

impl FailingOrderStore {
    pub fn new(inner: MemoryOrderStore, fail_on_update: usize) -> Self {
        Self {
            inner,
            fail_on_update,
            updates: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

pub struct FailingTransaction {
    inner: MemoryTransaction,
    fail_on_update: usize,
    updates: Arc<AtomicUsize>,
}

#[async_trait]
impl OrderStore for FailingOrderStore {
    type Config = (MemoryStoreConfig, usize);
    type Transaction = FailingTransaction;

    async fn new(config: Self::Config) -> Result<Self> {
        Ok(Self::new(MemoryOrderStore::new(config.0), config.1))
    }

    async fn begin(&self, owner: &str) -> Result<Self::Transaction> {
        Ok(FailingTransaction {
            inner: self.inner.begin(owner).await?,
            fail_on_update: self.fail_on_update,
            updates: Arc::clone(&self.updates),
        })
    }
}

#[async_trait]
impl OrderTransaction for FailingTransaction {
    async fn list_by_owner(&mut self, owner: &str) -> Result<Vec<OrderedItem>> {
        self.inner.list_by_owner(owner).await
    }

    async fn update_order(&mut self, id: i64, owner: &str, new_order: i64) -> Result<()> {
        let n = self.updates.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_on_update {
            return Err(CoreError::Storage(StorageError::Backend(format!(
                "injected failure on update {}",
                n
            ))));
        }
        self.inner.update_order(id, owner, new_order).await
    }

    async fn commit(self) -> Result<()> {
        self.inner.commit().await
    }

    async fn rollback(self) -> Result<()> {
        self.inner.rollback().await
    }
}

/// Memory store with a short lock timeout
pub fn memory_store() -> MemoryOrderStore {
    MemoryOrderStore::new(MemoryStoreConfig {
        lock_timeout: std::time::Duration::from_millis(200),
        max_items_per_owner: 100,
    })
}

/// Inserts `names` for `owner` at orders 1..=N
pub async fn seed(store: &MemoryOrderStore, owner: &str, names: &[&str]) -> Vec<OrderedItem> {
    let mut seeded = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        seeded.push(store.insert(owner, name, i as i64 + 1).await.unwrap());
    }
    seeded
}

/// `(name, order)` pairs sorted by order
pub fn name_orders(items: &[OrderedItem]) -> Vec<(String, i64)> {
    let mut pairs: Vec<_> = items.iter().map(|i| (i.name.clone(), i.order)).collect();
    pairs.sort_by_key(|(_, order)| *order);
    pairs
}

/// Minimal downstream response
#[derive(Debug, Default)]
pub struct ResponseStub {
    pub status: u16,
    pub headers: HashMap<String, String>,
}

impl ResponseStub {
    pub fn ok() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
        }
    }
}

impl HeaderSink for ResponseStub {
    fn set_header(&mut self, name: &str, value: String) {
        self.headers.insert(name.to_string(), value);
    }
}
