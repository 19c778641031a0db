//! All-or-nothing stock reservation with optimistic concurrency.

use std::collections::BTreeMap;

use common::{CartLine, ItemId, Money, SizeId, StockKey};
use serde::{Deserialize, Serialize};

use crate::{ReservationError, SizeStock, StockStore, StoreError};

/// Attempts made before a reservation gives up on version conflicts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// One reserved line, with the unit price captured at reservation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedLine {
    pub item_id: ItemId,
    pub size_id: SizeId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl ReservedLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Stock successfully taken out of inventory for one checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    lines: Vec<ReservedLine>,
    total: Money,
}

impl Reservation {
    pub fn lines(&self) -> &[ReservedLine] {
        &self.lines
    }

    /// Sum of unit price × quantity over all lines.
    pub fn total(&self) -> Money {
        self.total
    }

    /// The lines as (item, size, quantity) tuples, suitable for [`ReservationEngine::release`].
    pub fn to_cart_lines(&self) -> Vec<CartLine> {
        self.lines
            .iter()
            .map(|line| CartLine {
                item_id: line.item_id,
                size_id: line.size_id,
                quantity: line.quantity,
            })
            .collect()
    }
}

/// Outcome of a single validate-then-decrement pass.
enum Attempt {
    Reserved(Reservation),
    Conflict(StockKey),
}

/// A validated line waiting to be decremented.
struct PlannedLine {
    stock: SizeStock,
    quantity: u32,
    unit_price: Money,
}

/// Validates cart lines against current stock and reserves them atomically.
///
/// Each pass reads every row, checks availability, then decrements the rows
/// one by one with a compare-and-swap on the version read during validation.
/// If any decrement loses a race, the decrements already applied by that pass
/// are added back and the whole pass is retried, up to `max_attempts` times.
#[derive(Debug, Clone)]
pub struct ReservationEngine<S: StockStore> {
    store: S,
    max_attempts: u32,
}

impl<S: StockStore> ReservationEngine<S> {
    /// Creates an engine with the default retry bound.
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Overrides the number of attempts (at least one attempt is always made).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Reserves every line or none of them.
    #[tracing::instrument(skip(self, lines), fields(line_count = lines.len()))]
    pub async fn reserve(&self, lines: &[CartLine]) -> Result<Reservation, ReservationError> {
        let requested = merge_lines(lines)?;

        for attempt in 1..=self.max_attempts {
            match self.try_reserve(&requested).await? {
                Attempt::Reserved(reservation) => {
                    tracing::debug!(attempt, total = %reservation.total(), "stock reserved");
                    return Ok(reservation);
                }
                Attempt::Conflict(key) => {
                    metrics::counter!("reservation_conflicts_total").increment(1);
                    tracing::debug!(attempt, %key, "version conflict, retrying reservation");
                }
            }
        }

        tracing::warn!(
            attempts = self.max_attempts,
            "reservation abandoned after repeated conflicts"
        );
        Err(ReservationError::ConcurrentModification {
            attempts: self.max_attempts,
        })
    }

    /// Adds previously reserved quantities back to stock.
    ///
    /// Every line is attempted even if an earlier one fails; the first
    /// storage error is returned afterwards. Rows that have disappeared are
    /// skipped with a warning.
    #[tracing::instrument(skip(self, lines), fields(line_count = lines.len()))]
    pub async fn release(&self, lines: &[CartLine]) -> Result<(), ReservationError> {
        let pairs: Vec<(StockKey, u32)> = lines.iter().map(|l| (l.key(), l.quantity)).collect();
        self.add_back(&pairs).await.map_err(ReservationError::from)
    }

    async fn try_reserve(
        &self,
        requested: &BTreeMap<StockKey, u32>,
    ) -> Result<Attempt, ReservationError> {
        let mut plan = Vec::with_capacity(requested.len());

        for (&key, &quantity) in requested {
            let unavailable = || ReservationError::LineUnavailable {
                item_id: key.item_id,
                size_id: key.size_id,
            };

            let stock = self.store.get_stock(key).await?.ok_or_else(unavailable)?;
            let item = self
                .store
                .get_item(key.item_id)
                .await?
                .ok_or_else(unavailable)?;

            if stock.quantity < quantity {
                return Err(ReservationError::InsufficientStock {
                    item_id: key.item_id,
                    size_id: key.size_id,
                    requested: quantity,
                    available: stock.quantity,
                });
            }

            plan.push(PlannedLine {
                stock,
                quantity,
                unit_price: item.unit_price,
            });
        }

        let mut applied: Vec<(StockKey, u32)> = Vec::with_capacity(plan.len());
        for planned in &plan {
            let key = planned.stock.key;
            let outcome = self
                .store
                .compare_and_decrement(key, planned.stock.version, planned.quantity)
                .await;

            match outcome {
                Ok(true) => applied.push((key, planned.quantity)),
                Ok(false) => {
                    self.add_back(&applied).await?;
                    return Ok(Attempt::Conflict(key));
                }
                Err(e) => {
                    if let Err(revert) = self.add_back(&applied).await {
                        tracing::error!(error = %revert, "failed to revert partial reservation");
                    }
                    return Err(e.into());
                }
            }
        }

        let lines: Vec<ReservedLine> = plan
            .iter()
            .map(|p| ReservedLine {
                item_id: p.stock.key.item_id,
                size_id: p.stock.key.size_id,
                quantity: p.quantity,
                unit_price: p.unit_price,
            })
            .collect();
        let total = lines.iter().map(ReservedLine::line_total).sum();

        Ok(Attempt::Reserved(Reservation { lines, total }))
    }

    async fn add_back(&self, pairs: &[(StockKey, u32)]) -> Result<(), StoreError> {
        let mut first_error = None;

        for &(key, quantity) in pairs {
            match self.store.increment(key, quantity).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(%key, quantity, "stock row missing, quantity not restored");
                }
                Err(e) => {
                    tracing::error!(%key, quantity, error = %e, "failed to restore stock");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Collapses duplicate keys and orders lines by key.
///
/// Ordering by key means two reservations that share rows always touch
/// them in the same sequence.
fn merge_lines(lines: &[CartLine]) -> Result<BTreeMap<StockKey, u32>, ReservationError> {
    if lines.is_empty() {
        return Err(ReservationError::EmptyReservation);
    }

    let mut merged = BTreeMap::new();
    for line in lines {
        if line.quantity == 0 {
            return Err(ReservationError::InvalidQuantity {
                item_id: line.item_id,
                size_id: line.size_id,
            });
        }
        let entry = merged.entry(line.key()).or_insert(0u32);
        *entry = entry.saturating_add(line.quantity);
    }

    Ok(merged)
}
