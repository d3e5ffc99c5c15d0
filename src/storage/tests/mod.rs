// src/storage/tests/mod.rs


// Common checks any ordered-list store should pass
pub(crate) mod common {
    use crate::error::{CoreError, Result, StorageError};
    use crate::storage::{OrderStore, OrderTransaction};

    // Writes become visible on commit only
    pub async fn test_commit_visibility<S: OrderStore>(store: &S, owner: &str) -> Result<()> {
        let mut tx = store.begin(owner).await?;
        let rows = tx.list_by_owner(owner).await?;
        assert!(rows.len() >= 2, "needs at least two rows");

        let (first, second) = (rows[0].id, rows[1].id);
        tx.update_order(first, owner, -first).await?;
        tx.update_order(second, owner, 1).await?;
        tx.update_order(first, owner, 2).await?;
        tx.commit().await?;

        let mut tx = store.begin(owner).await?;
        let rows = tx.list_by_owner(owner).await?;
        assert_eq!(rows[0].id, second);
        assert_eq!(rows[1].id, first);
        tx.rollback().await?;

        Ok(())
    }

    // The unique (owner, order) constraint holds inside a transaction
    pub async fn test_unique_order<S: OrderStore>(store: &S, owner: &str) -> Result<()> {
        let mut tx = store.begin(owner).await?;
        let rows = tx.list_by_owner(owner).await?;

        let err = tx
            .update_order(rows[1].id, owner, rows[0].order)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Storage(StorageError::UniqueViolation { .. })
        ));

        // Writing a row's own value is not a conflict
        tx.update_order(rows[0].id, owner, rows[0].order).await?;
        tx.rollback().await?;

        Ok(())
    }

    // Rolled back writes are discarded
    pub async fn test_rollback_discards<S: OrderStore>(store: &S, owner: &str) -> Result<()> {
        let mut tx = store.begin(owner).await?;
        let before = tx.list_by_owner(owner).await?;
        tx.update_order(before[0].id, owner, -before[0].id).await?;
        tx.rollback().await?;

        let mut tx = store.begin(owner).await?;
        assert_eq!(tx.list_by_owner(owner).await?, before);
        tx.rollback().await?;

        Ok(())
    }
}
