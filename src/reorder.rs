// src/reorder.rs

use std::collections::HashMap;
use std::fmt;

use tracing::{error, info, warn};

use crate::error::{CoreError, Result};
use crate::storage::{OrderStore, OrderTransaction, OrderedItem};

/// Kind of ordered record, used in user-facing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderedEntity {
    Priority,
    Status,
}

impl fmt::Display for OrderedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderedEntity::Priority => f.write_str("Priority"),
            OrderedEntity::Status => f.write_str("Status"),
        }
    }
}

/// Moves one record of an owner's ordered list to a new position.
///
/// The records between the old and the new position shift by one toward the
/// vacated slot. Rows are first parked on negative placeholders (`-id`) and
/// then given their final positions, so a unique `(owner, order)`
/// constraint never sees two rows on the same value. Everything happens in
/// one transaction of the store.
#[derive(Debug)]
pub struct OrderedListReorder<S>
where
    S: OrderStore,
{
    store: S,
    entity: OrderedEntity,
}

impl<S> OrderedListReorder<S>
where
    S: OrderStore,
{
    pub fn new(store: S, entity: OrderedEntity) -> Self {
        Self { store, entity }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Moves the record at `from_order` to `to_order` and returns the owner's
    /// records sorted by their new order.
    ///
    /// Fails with [`CoreError::NotFound`] when nothing sits at `from_order`
    /// and with [`CoreError::Validation`] when `to_order` is outside
    /// `1..=N`. Any failure leaves the stored orders untouched.
    pub async fn apply(&self, owner: &str, from_order: i64, to_order: i64) -> Result<Vec<OrderedItem>> {
        info!(
            entity = %self.entity,
            owner,
            from_order,
            to_order,
            "Reordering"
        );

        let mut tx = match self.store.begin(owner).await {
            Ok(tx) => tx,
            Err(err) => {
                error!(entity = %self.entity, owner, error = %err, "Could not open transaction");
                return Err(err);
            }
        };

        match self.apply_in(&mut tx, owner, from_order, to_order).await {
            Ok(items) => {
                tx.commit().await?;
                info!(entity = %self.entity, owner, items = items.len(), "Reorder committed");
                Ok(items)
            }
            Err(err) => {
                warn!(entity = %self.entity, owner, error = %err, "Reorder rolled back");
                if let Err(rollback_err) = tx.rollback().await {
                    error!(owner, error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn apply_in(
        &self,
        tx: &mut S::Transaction,
        owner: &str,
        from_order: i64,
        to_order: i64,
    ) -> Result<Vec<OrderedItem>> {
        let items = tx.list_by_owner(owner).await?;

        if !items.iter().any(|item| item.order == from_order) {
            return Err(CoreError::NotFound(format!(
                "{} with order {} not found for user",
                self.entity, from_order
            )));
        }

        let count = items.len() as i64;
        if to_order < 1 || to_order > count {
            return Err(CoreError::Validation(format!(
                "Target order must be between 1 and {}",
                count
            )));
        }

        if from_order == to_order {
            return Ok(items);
        }

        let plan = plan_reorder(&items, from_order, to_order)?;

        for item in &items {
            tx.update_order(item.id, owner, placeholder(item.id)?).await?;
        }
        for &(id, new_order) in &plan {
            tx.update_order(id, owner, new_order).await?;
        }

        tx.list_by_owner(owner).await
    }
}

/// Negative parking slot for a row during the first write phase
fn placeholder(id: i64) -> Result<i64> {
    if id > 0 {
        Ok(-id)
    } else {
        Err(CoreError::Internal(format!(
            "row id {} cannot be parked on a negative order",
            id
        )))
    }
}

/// Computes `(id, new_order)` for every item when the item at `from_order`
/// moves to `to_order`.
///
/// The items' orders must be exactly `1..=N`; both positions must lie in
/// that range.
pub fn plan_reorder(items: &[OrderedItem], from_order: i64, to_order: i64) -> Result<Vec<(i64, i64)>> {
    let count = items.len() as i64;
    let order_to_id: HashMap<i64, i64> = items.iter().map(|item| (item.order, item.id)).collect();

    let mut orders: Vec<i64> = (1..=count).collect();
    if order_to_id.len() != items.len() || !orders.iter().all(|o| order_to_id.contains_key(o)) {
        return Err(CoreError::Internal(
            "stored orders are not a permutation of 1..N".to_string(),
        ));
    }
    if !(1..=count).contains(&from_order) || !(1..=count).contains(&to_order) {
        return Err(CoreError::Internal(format!(
            "cannot move {} to {} in a list of {}",
            from_order, to_order, count
        )));
    }

    // Remove and reinsert: a move, not a swap
    orders.remove((from_order - 1) as usize);
    orders.insert((to_order - 1) as usize, from_order);

    Ok(orders
        .iter()
        .enumerate()
        .map(|(position, order)| (order_to_id[order], position as i64 + 1))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn items(orders: &[(i64, i64)]) -> Vec<OrderedItem> {
        orders
            .iter()
            .map(|&(id, order)| OrderedItem {
                id,
                key: Uuid::new_v4(),
                owner: "alice".to_string(),
                name: format!("item-{}", id),
                order,
            })
            .collect()
    }

    #[test]
    fn test_move_down_shifts_the_rest_up() {
        // A=1, B=2, C=3 with ids 10, 20, 30
        let plan = plan_reorder(&items(&[(10, 1), (20, 2), (30, 3)]), 1, 3).unwrap();
        assert_eq!(plan, vec![(20, 1), (30, 2), (10, 3)]);
    }

    #[test]
    fn test_move_up_shifts_the_rest_down() {
        let plan = plan_reorder(&items(&[(10, 1), (20, 2), (30, 3)]), 3, 1).unwrap();
        assert_eq!(plan, vec![(30, 1), (10, 2), (20, 3)]);
    }

    #[test]
    fn test_move_is_not_a_swap() {
        let plan = plan_reorder(
            &items(&[(1, 1), (2, 2), (3, 3), (4, 4), (5, 5)]),
            2,
            4,
        )
        .unwrap();
        assert_eq!(plan, vec![(1, 1), (3, 2), (4, 3), (2, 4), (5, 5)]);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let plan = plan_reorder(&items(&[(30, 3), (10, 1), (20, 2)]), 2, 1).unwrap();
        assert_eq!(plan, vec![(20, 1), (10, 2), (30, 3)]);
    }

    #[test]
    fn test_gaps_are_rejected() {
        let err = plan_reorder(&items(&[(1, 1), (2, 3)]), 1, 2).unwrap_err();
        assert!(matches!(err, CoreError::Internal(_)));
    }

    #[test]
    fn test_placeholders_are_negative() {
        assert_eq!(placeholder(7).unwrap(), -7);
        assert!(placeholder(0).is_err());
    }

    #[test]
    fn test_entity_names() {
        assert_eq!(OrderedEntity::Priority.to_string(), "Priority");
        assert_eq!(OrderedEntity::Status.to_string(), "Status");
    }
}
