//! The cart value.

use std::collections::BTreeMap;

use common::{CartLine, OwnerId, StockKey};

use crate::{CartError, Result};

/// A set of pending selections owned by one principal.
///
/// Lines are keyed by (item, size), so adding an existing pair increments
/// its quantity instead of duplicating it. Iteration is in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    owner_id: OwnerId,
    lines: BTreeMap<StockKey, u32>,
}

impl Cart {
    /// Creates an empty cart.
    pub fn new(owner_id: OwnerId) -> Self {
        Self {
            owner_id,
            lines: BTreeMap::new(),
        }
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    /// Adds units of an item in a size, merging with an existing line.
    pub fn add(&mut self, key: StockKey, quantity: u32) -> Result<u32> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }

        let line = self.lines.entry(key).or_insert(0);
        *line = line.saturating_add(quantity);
        Ok(*line)
    }

    /// Replaces the quantity of an existing line.
    pub fn update_quantity(&mut self, key: StockKey, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }

        let line = self.lines.get_mut(&key).ok_or(CartError::LineNotFound {
            item_id: key.item_id,
            size_id: key.size_id,
        })?;
        *line = quantity;
        Ok(())
    }

    /// Removes a line.
    pub fn remove(&mut self, key: StockKey) -> Result<()> {
        self.lines
            .remove(&key)
            .map(|_| ())
            .ok_or(CartError::LineNotFound {
                item_id: key.item_id,
                size_id: key.size_id,
            })
    }

    /// Returns the quantity held for a key, if any.
    pub fn quantity_of(&self, key: StockKey) -> Option<u32> {
        self.lines.get(&key).copied()
    }

    /// Returns the lines in key order.
    pub fn lines(&self) -> Vec<CartLine> {
        self.lines
            .iter()
            .map(|(key, quantity)| CartLine {
                item_id: key.item_id,
                size_id: key.size_id,
                quantity: *quantity,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns the total number of units across all lines.
    pub fn total_quantity(&self) -> u32 {
        self.lines
            .values()
            .fold(0u32, |total, quantity| total.saturating_add(*quantity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart() -> Cart {
        Cart::new(OwnerId::new("alice"))
    }

    #[test]
    fn test_new_cart_is_empty() {
        let cart = cart();
        assert!(cart.is_empty());
        assert_eq!(cart.total_quantity(), 0);
        assert_eq!(cart.owner_id().as_str(), "alice");
    }

    #[test]
    fn test_add_existing_line_increments() {
        let mut cart = cart();
        let key = StockKey::new(1, 2);

        assert_eq!(cart.add(key, 2).unwrap(), 2);
        assert_eq!(cart.add(key, 3).unwrap(), 5);

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.quantity_of(key), Some(5));
    }

    #[test]
    fn test_add_zero_is_rejected() {
        let mut cart = cart();
        let result = cart.add(StockKey::new(1, 2), 0);
        assert!(matches!(
            result,
            Err(CartError::InvalidQuantity { quantity: 0 })
        ));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_quantity_replaces() {
        let mut cart = cart();
        let key = StockKey::new(1, 2);
        cart.add(key, 4).unwrap();

        cart.update_quantity(key, 1).unwrap();
        assert_eq!(cart.quantity_of(key), Some(1));

        assert!(matches!(
            cart.update_quantity(key, 0),
            Err(CartError::InvalidQuantity { .. })
        ));
        assert_eq!(cart.quantity_of(key), Some(1));
    }

    #[test]
    fn test_total_quantity_saturates() {
        let mut cart = cart();
        cart.add(StockKey::new(1, 1), u32::MAX).unwrap();
        cart.add(StockKey::new(2, 1), 5).unwrap();

        assert_eq!(cart.total_quantity(), u32::MAX);
    }

    #[test]
    fn test_update_missing_line() {
        let mut cart = cart();
        let result = cart.update_quantity(StockKey::new(7, 1), 2);
        assert!(matches!(result, Err(CartError::LineNotFound { .. })));
    }

    #[test]
    fn test_remove() {
        let mut cart = cart();
        let key = StockKey::new(1, 2);
        cart.add(key, 1).unwrap();

        cart.remove(key).unwrap();
        assert!(cart.is_empty());
        assert!(matches!(
            cart.remove(key),
            Err(CartError::LineNotFound { .. })
        ));
    }

    #[test]
    fn test_lines_in_key_order() {
        let mut cart = cart();
        cart.add(StockKey::new(3, 1), 1).unwrap();
        cart.add(StockKey::new(1, 2), 2).unwrap();
        cart.add(StockKey::new(1, 1), 3).unwrap();

        let keys: Vec<StockKey> = cart.lines().iter().map(CartLine::key).collect();
        assert_eq!(
            keys,
            vec![
                StockKey::new(1, 1),
                StockKey::new(1, 2),
                StockKey::new(3, 1)
            ]
        );
        assert_eq!(cart.total_quantity(), 6);
    }
}
