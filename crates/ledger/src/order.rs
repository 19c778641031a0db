//! Committed orders and their lines.

use chrono::{DateTime, Utc};
use common::{IdempotencyKey, ItemId, Money, OrderId, OwnerId, SizeId};
use serde::{Deserialize, Serialize};

use crate::{OrderStatus, ShippingDetails};

/// One line of a committed order.
///
/// The unit price is the one captured when stock was reserved, never the
/// current catalog price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: ItemId,
    pub size_id: SizeId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    /// Returns the total price for this line (quantity * unit_price).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// An order as handed to [`crate::OrderLedger::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub owner_id: OwnerId,
    pub shipping: ShippingDetails,
    pub payment_method: String,
    /// Authorization handle id returned by the payment gateway.
    pub payment_reference: String,
    pub total: Money,
    pub lines: Vec<OrderLine>,
    pub idempotency_key: Option<IdempotencyKey>,
}

impl NewOrder {
    /// Assigns an id and timestamp, producing a `Pending` order.
    pub fn into_order(self, id: OrderId, created_at: DateTime<Utc>) -> Order {
        Order {
            id,
            owner_id: self.owner_id,
            created_at,
            shipping: self.shipping,
            payment_method: self.payment_method,
            payment_reference: self.payment_reference,
            status: OrderStatus::Pending,
            total: self.total,
            lines: self.lines,
            idempotency_key: self.idempotency_key,
        }
    }
}

/// A committed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub owner_id: OwnerId,
    pub created_at: DateTime<Utc>,
    pub shipping: ShippingDetails,
    pub payment_method: String,
    pub payment_reference: String,
    pub status: OrderStatus,
    pub total: Money,
    pub lines: Vec<OrderLine>,
    pub idempotency_key: Option<IdempotencyKey>,
}

impl Order {
    /// Returns the total quantity of all lines.
    pub fn total_quantity(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |total, line| total.saturating_add(line.quantity))
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_order() -> NewOrder {
        NewOrder {
            owner_id: OwnerId::new("alice"),
            shipping: crate::shipping::sample(),
            payment_method: "card".to_string(),
            payment_reference: "auth_0001".to_string(),
            total: Money::from_cents(12000),
            lines: vec![OrderLine {
                item_id: ItemId::new(1),
                size_id: SizeId::new(2),
                quantity: 2,
                unit_price: Money::from_cents(6000),
            }],
            idempotency_key: None,
        }
    }

    #[test]
    fn test_into_order_starts_pending() {
        let id = OrderId::new();
        let order = new_order().into_order(id, Utc::now());

        assert_eq!(order.id, id);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_quantity(), 2);
        assert!(!order.is_terminal());
    }

    #[test]
    fn test_line_total() {
        let order = new_order();
        assert_eq!(order.lines[0].line_total(), Money::from_cents(12000));
    }

    #[test]
    fn test_serialization() {
        let order = new_order().into_order(OrderId::new(), Utc::now());
        let json = serde_json::to_string(&order).unwrap();
        let deserialized: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, deserialized);
    }
}
