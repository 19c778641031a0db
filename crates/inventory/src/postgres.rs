use async_trait::async_trait;
use common::{ItemId, Money, StockKey};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{CatalogItem, CategoryId, Result, SizeStock, StockStore, StockVersion, StoreError};

/// PostgreSQL-backed stock store.
///
/// The compare-and-decrement is a single conditional `UPDATE`; zero rows
/// affected is reported as a conflict rather than an error.
#[derive(Debug, Clone)]
pub struct PostgresStockStore {
    pool: PgPool,
}

impl PostgresStockStore {
    /// Creates a new PostgreSQL stock store.
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

    /// Inserts or replaces a catalog item.
    pub async fn put_item(&self, item: &CatalogItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO catalog_items (id, name, price_cents, category_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                category_id = EXCLUDED.category_id
            "#,
        )
        .bind(item.id.as_i64())
        .bind(&item.name)
        .bind(item.unit_price.cents())
        .bind(item.category_id.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Creates or overwrites a stock row, bumping its version.
    pub async fn set_stock(&self, key: StockKey, quantity: u32) -> Result<()> {
        let quantity = to_i32(quantity)?;

        sqlx::query(
            r#"
            INSERT INTO size_stock (item_id, size_id, quantity, version)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (item_id, size_id) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                version = size_stock.version + 1
            "#,
        )
        .bind(key.item_id.as_i64())
        .bind(key.size_id.as_i64())
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_item(row: PgRow) -> Result<CatalogItem> {
        Ok(CatalogItem {
            id: ItemId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            unit_price: Money::from_cents(row.try_get("price_cents")?),
            category_id: CategoryId::new(row.try_get("category_id")?),
        })
    }

    fn row_to_stock(key: StockKey, row: PgRow) -> Result<SizeStock> {
        let quantity: i32 = row.try_get("quantity")?;
        let quantity = u32::try_from(quantity)
            .map_err(|_| StoreError::Corrupt(format!("negative quantity {quantity} for {key}")))?;

        Ok(SizeStock {
            key,
            quantity,
            version: StockVersion::new(row.try_get("version")?),
        })
    }
}

fn to_i32(quantity: u32) -> Result<i32> {
    i32::try_from(quantity)
        .map_err(|_| StoreError::Corrupt(format!("quantity {quantity} out of range")))
}

#[async_trait]
impl StockStore for PostgresStockStore {
    async fn get_item(&self, item_id: ItemId) -> Result<Option<CatalogItem>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, name, price_cents, category_id
            FROM catalog_items
            WHERE id = $1
            "#,
        )
        .bind(item_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_item).transpose()
    }

    async fn get_stock(&self, key: StockKey) -> Result<Option<SizeStock>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT quantity, version
            FROM size_stock
            WHERE item_id = $1 AND size_id = $2
            "#,
        )
        .bind(key.item_id.as_i64())
        .bind(key.size_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::row_to_stock(key, row)).transpose()
    }

    async fn compare_and_decrement(
        &self,
        key: StockKey,
        expected: StockVersion,
        quantity: u32,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE size_stock
            SET quantity = quantity - $4, version = version + 1
            WHERE item_id = $1 AND size_id = $2 AND version = $3 AND quantity >= $4
            "#,
        )
        .bind(key.item_id.as_i64())
        .bind(key.size_id.as_i64())
        .bind(expected.as_i64())
        .bind(to_i32(quantity)?)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn increment(&self, key: StockKey, quantity: u32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE size_stock
            SET quantity = quantity + $3, version = version + 1
            WHERE item_id = $1 AND size_id = $2
            "#,
        )
        .bind(key.item_id.as_i64())
        .bind(key.size_id.as_i64())
        .bind(to_i32(quantity)?)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
