use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{IdempotencyKey, ItemId, Money, OrderId, OwnerId, SizeId};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    LedgerError, NewOrder, Order, OrderLedger, OrderLine, OrderStatus, Result, ShippingDetails,
};

/// Attempts at a conditional status update before giving up on a racing writer.
const STATUS_UPDATE_ATTEMPTS: usize = 3;

const ORDER_COLUMNS: &str = r#"
    o.id, o.owner_id, o.created_at, o.payment_method, o.payment_reference,
    o.status, o.total_cents, o.idempotency_key,
    s.full_name, s.address_line1, s.address_line2, s.city, s.state,
    s.postal_code, s.country, s.phone_number
"#;

/// PostgreSQL-backed order ledger.
#[derive(Debug, Clone)]
pub struct PostgresOrderLedger {
    pool: PgPool,
}

impl PostgresOrderLedger {
    /// Creates a new PostgreSQL order ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn insert_lines(
        tx: &mut Transaction<'_, Postgres>,
        order_id: OrderId,
        lines: &[OrderLine],
    ) -> Result<()> {
        for (position, line) in lines.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| LedgerError::Corrupt(format!("line position {position} out of range")))?;
            let quantity = i32::try_from(line.quantity).map_err(|_| {
                LedgerError::Corrupt(format!("quantity {} out of range", line.quantity))
            })?;

            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, position, item_id, size_id, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order_id.as_uuid())
            .bind(position)
            .bind(line.item_id.as_i64())
            .bind(line.size_id.as_i64())
            .bind(quantity)
            .bind(line.unit_price.cents())
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn load_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(
            r#"
            SELECT item_id, size_id, quantity, unit_price_cents
            FROM order_lines
            WHERE order_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_line).collect()
    }

    async fn load_orders(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let mut order = Self::row_to_order(row)?;
            order.lines = self.load_lines(order.id).await?;
            orders.push(order);
        }
        Ok(orders)
    }

    fn row_to_line(row: PgRow) -> Result<OrderLine> {
        let quantity: i32 = row.try_get("quantity")?;
        let quantity = u32::try_from(quantity)
            .map_err(|_| LedgerError::Corrupt(format!("negative line quantity {quantity}")))?;

        Ok(OrderLine {
            item_id: ItemId::new(row.try_get("item_id")?),
            size_id: SizeId::new(row.try_get("size_id")?),
            quantity,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        })
    }

    /// Maps an order row joined with its shipping details. Lines are loaded separately.
    fn row_to_order(row: PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<OrderStatus>()
            .map_err(|e| LedgerError::Corrupt(e.to_string()))?;
        let owner_id: String = row.try_get("owner_id")?;
        let idempotency_key: Option<String> = row.try_get("idempotency_key")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let id: Uuid = row.try_get("id")?;

        Ok(Order {
            id: OrderId::from_uuid(id),
            owner_id: OwnerId::new(owner_id),
            created_at,
            shipping: ShippingDetails {
                full_name: row.try_get("full_name")?,
                address_line1: row.try_get("address_line1")?,
                address_line2: row.try_get("address_line2")?,
                city: row.try_get("city")?,
                state: row.try_get("state")?,
                postal_code: row.try_get("postal_code")?,
                country: row.try_get("country")?,
                phone_number: row.try_get("phone_number")?,
            },
            payment_method: row.try_get("payment_method")?,
            payment_reference: row.try_get("payment_reference")?,
            status,
            total: Money::from_cents(row.try_get("total_cents")?),
            lines: Vec::new(),
            idempotency_key: idempotency_key.map(IdempotencyKey::new),
        })
    }
}

#[async_trait]
impl OrderLedger for PostgresOrderLedger {
    #[tracing::instrument(skip(self, order), fields(owner_id = %order.owner_id))]
    async fn create(&self, order: NewOrder) -> Result<Order> {
        let order_id = OrderId::new();
        let shipping_id = Uuid::new_v4();
        let shipping = &order.shipping;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO shipping_details (id, full_name, address_line1, address_line2, city, state, postal_code, country, phone_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(shipping_id)
        .bind(&shipping.full_name)
        .bind(&shipping.address_line1)
        .bind(&shipping.address_line2)
        .bind(&shipping.city)
        .bind(&shipping.state)
        .bind(&shipping.postal_code)
        .bind(&shipping.country)
        .bind(&shipping.phone_number)
        .execute(&mut *tx)
        .await?;

        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            INSERT INTO orders (id, owner_id, shipping_details_id, payment_method, payment_reference, status, total_cents, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING created_at
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(order.owner_id.as_str())
        .bind(shipping_id)
        .bind(&order.payment_method)
        .bind(&order.payment_reference)
        .bind(OrderStatus::Pending.as_str())
        .bind(order.total.cents())
        .bind(order.idempotency_key.as_ref().map(IdempotencyKey::as_str))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_owner_idempotency_key")
                && let Some(key) = &order.idempotency_key
            {
                return LedgerError::DuplicateIdempotencyKey {
                    owner_id: order.owner_id.clone(),
                    key: key.clone(),
                };
            }
            LedgerError::Database(e)
        })?;

        Self::insert_lines(&mut tx, order_id, &order.lines).await?;

        tx.commit().await?;
        tracing::debug!(%order_id, "order written");

        Ok(order.into_order(order_id, created_at))
    }

    #[tracing::instrument(skip(self))]
    async fn update_status(&self, order_id: OrderId, new_status: OrderStatus) -> Result<Order> {
        for _ in 0..STATUS_UPDATE_ATTEMPTS {
            let current = self
                .get_by_id(order_id)
                .await?
                .ok_or(LedgerError::OrderNotFound(order_id))?;

            if !current.status.can_transition_to(new_status) {
                return Err(LedgerError::InvalidStatusTransition {
                    from: current.status,
                    to: new_status,
                });
            }

            let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1 AND status = $3")
                .bind(order_id.as_uuid())
                .bind(new_status.as_str())
                .bind(current.status.as_str())
                .execute(&self.pool)
                .await?;

            if result.rows_affected() == 1 {
                return Ok(Order {
                    status: new_status,
                    ..current
                });
            }
            tracing::debug!(%order_id, "status changed concurrently, re-reading");
        }

        Err(LedgerError::Unavailable(format!(
            "status of order {order_id} kept changing concurrently"
        )))
    }

    async fn get_by_id(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders o
            JOIN shipping_details s ON s.id = o.shipping_details_id
            WHERE o.id = $1
            "#
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.load_orders(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_for_user(&self, owner_id: &OwnerId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders o
            JOIN shipping_details s ON s.id = o.shipping_details_id
            WHERE o.owner_id = $1
            ORDER BY o.created_at DESC
            "#
        ))
        .bind(owner_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        self.load_orders(rows).await
    }

    async fn find_by_idempotency_key(
        &self,
        owner_id: &OwnerId,
        key: &IdempotencyKey,
    ) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders o
            JOIN shipping_details s ON s.id = o.shipping_details_id
            WHERE o.owner_id = $1 AND o.idempotency_key = $2
            "#
        ))
        .bind(owner_id.as_str())
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.load_orders(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}
