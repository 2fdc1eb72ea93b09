//! Postgres-backed store.
//!
//! Schema lives in `migrations/0001_init.sql` and is applied by
//! [`PostgresStore::migrate`].
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | Database (serialization failure) | `40001` | `Concurrency` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / RowNotFound / other | N/A | `Backend` |
//!
//! ## Sync bridge
//!
//! The store traits are synchronous. Trait methods run the async inherent
//! methods through `tokio::runtime::Handle::block_on`, so they must be called
//! from a thread that has a runtime context but is not itself driving async
//! tasks (e.g. inside `tokio::task::spawn_blocking`).

use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use freshcart_core::{
    AssignmentId, CustomerPricingId, ExpectedVersion, InventoryId, PricingTierId, ProductId,
    StockTransactionId, UserId,
};
use freshcart_inventory::{Inventory, InventoryRecord, StockTransaction, TransactionType};
use freshcart_pricing::{CustomerPricing, PricingTier, TierPricing, UserPricingTierAssignment};
use freshcart_products::Product;

use super::{
    InventoryCommit, InventoryStore, PricingSnapshot, PricingStore, ProductStore, StoreError,
};

const INIT_SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Postgres store for products, pricing and inventory.
///
/// `PgPool` is internally reference counted, so clones share one pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(3))
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the schema. Idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(INIT_SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    fn block_on<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            StoreError::Backend(
                "PostgresStore requires a tokio runtime context (call from spawn_blocking)"
                    .to_string(),
            )
        })?;
        handle.block_on(fut)
    }

    // ---- products ----

    pub async fn fetch_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, price, discount_price, in_stock, created_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    pub async fn insert_product_row(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, discount_price, in_stock, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(product.id().as_uuid())
        .bind(product.name())
        .bind(product.price())
        .bind(product.discount_price())
        .bind(product.in_stock())
        .bind(product.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    pub async fn fetch_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, price, discount_price, in_stock, created_at
            FROM products
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    // ---- pricing ----

    pub async fn insert_tier_row(&self, tier: &PricingTier) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO pricing_tiers (id, name, description, discount_percentage, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(tier.id.as_uuid())
        .bind(&tier.name)
        .bind(tier.description.as_deref())
        .bind(tier.discount_percentage)
        .bind(tier.is_active)
        .bind(tier.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_tier", e))?;
        Ok(())
    }

    pub async fn update_tier_row(&self, tier: &PricingTier) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE pricing_tiers
            SET name = $2, description = $3, discount_percentage = $4, is_active = $5
            WHERE id = $1
            "#,
        )
        .bind(tier.id.as_uuid())
        .bind(&tier.name)
        .bind(tier.description.as_deref())
        .bind(tier.discount_percentage)
        .bind(tier.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_tier", e))?;
        Ok(())
    }

    pub async fn fetch_tier(&self, id: PricingTierId) -> Result<Option<PricingTier>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, discount_percentage, is_active, created_at
            FROM pricing_tiers
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_tier", e))?;

        row.as_ref().map(|r| tier_from_row(r, "")).transpose()
    }

    pub async fn fetch_tiers(&self) -> Result<Vec<PricingTier>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, discount_percentage, is_active, created_at
            FROM pricing_tiers
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_tiers", e))?;

        rows.iter().map(|r| tier_from_row(r, "")).collect()
    }

    pub async fn insert_assignment_row(
        &self,
        a: &UserPricingTierAssignment,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_pricing_tier_assignments
                (id, user_id, pricing_tier_id, start_date, end_date, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(a.id.as_uuid())
        .bind(a.user_id.as_uuid())
        .bind(a.pricing_tier_id.as_uuid())
        .bind(a.start_date)
        .bind(a.end_date)
        .bind(a.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_assignment", e))?;
        Ok(())
    }

    pub async fn update_assignment_row(
        &self,
        a: &UserPricingTierAssignment,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE user_pricing_tier_assignments
            SET end_date = $2, is_active = $3
            WHERE id = $1
            "#,
        )
        .bind(a.id.as_uuid())
        .bind(a.end_date)
        .bind(a.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_assignment", e))?;
        Ok(())
    }

    pub async fn fetch_assignment(
        &self,
        id: AssignmentId,
    ) -> Result<Option<UserPricingTierAssignment>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, pricing_tier_id, start_date, end_date, is_active
            FROM user_pricing_tier_assignments
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_assignment", e))?;

        row.as_ref().map(|r| assignment_from_row(r, "")).transpose()
    }

    pub async fn fetch_assignments_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserPricingTierAssignment>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, pricing_tier_id, start_date, end_date, is_active
            FROM user_pricing_tier_assignments
            WHERE user_id = $1
            ORDER BY start_date ASC, id ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_assignments_for_user", e))?;

        rows.iter().map(|r| assignment_from_row(r, "")).collect()
    }

    pub async fn insert_customer_pricing_row(&self, cp: &CustomerPricing) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO customer_pricing (id, product_id, pricing_tier_id, price, is_active)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(cp.id.as_uuid())
        .bind(cp.product_id.as_uuid())
        .bind(cp.pricing_tier_id.as_uuid())
        .bind(cp.price)
        .bind(cp.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_customer_pricing", e))?;
        Ok(())
    }

    pub async fn update_customer_pricing_row(&self, cp: &CustomerPricing) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE customer_pricing
            SET price = $2, is_active = $3
            WHERE id = $1
            "#,
        )
        .bind(cp.id.as_uuid())
        .bind(cp.price)
        .bind(cp.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_customer_pricing", e))?;
        Ok(())
    }

    pub async fn fetch_customer_pricing(
        &self,
        id: CustomerPricingId,
    ) -> Result<Option<CustomerPricing>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, pricing_tier_id, price, is_active
            FROM customer_pricing
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_customer_pricing", e))?;

        row.as_ref().map(|r| customer_pricing_from_row(r, "")).transpose()
    }

    pub async fn fetch_customer_pricing_for(
        &self,
        product_id: ProductId,
        tier_id: PricingTierId,
    ) -> Result<Option<CustomerPricing>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, pricing_tier_id, price, is_active
            FROM customer_pricing
            WHERE product_id = $1 AND pricing_tier_id = $2
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(tier_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_customer_pricing_for", e))?;

        row.as_ref().map(|r| customer_pricing_from_row(r, "")).transpose()
    }

    /// Product plus effective tiers, read inside one REPEATABLE READ
    /// transaction so concurrent admin edits cannot tear the view.
    #[instrument(
        skip(self),
        fields(user_id = %user_id, product_id = %product_id),
        err
    )]
    pub async fn load_pricing_snapshot(
        &self,
        user_id: UserId,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<Option<PricingSnapshot>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;

        let product = sqlx::query(
            r#"
            SELECT id, name, price, discount_price, in_stock, created_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("snapshot_product", e))?;

        let Some(product) = product.as_ref().map(product_from_row).transpose()? else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Ok(None);
        };

        let rows = sqlx::query(
            r#"
            SELECT
                a.id AS a_id, a.user_id AS a_user_id, a.pricing_tier_id AS a_pricing_tier_id,
                a.start_date AS a_start_date, a.end_date AS a_end_date, a.is_active AS a_is_active,
                t.id AS t_id, t.name AS t_name, t.description AS t_description,
                t.discount_percentage AS t_discount_percentage, t.is_active AS t_is_active,
                t.created_at AS t_created_at,
                cp.id AS cp_id, cp.product_id AS cp_product_id,
                cp.pricing_tier_id AS cp_pricing_tier_id, cp.price AS cp_price,
                cp.is_active AS cp_is_active
            FROM user_pricing_tier_assignments a
            JOIN pricing_tiers t ON t.id = a.pricing_tier_id
            LEFT JOIN customer_pricing cp
                ON cp.pricing_tier_id = a.pricing_tier_id AND cp.product_id = $2
            WHERE a.user_id = $1
              AND a.is_active
              AND (a.end_date IS NULL OR a.end_date >= $3)
            ORDER BY a.start_date ASC, a.id ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(now)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("snapshot_tiers", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        let mut tiers = Vec::with_capacity(rows.len());
        for row in &rows {
            let cp_id: Option<uuid::Uuid> = row.try_get("cp_id").map_err(decode_error)?;
            let customer_price = match cp_id {
                Some(_) => Some(customer_pricing_from_row(row, "cp_")?),
                None => None,
            };
            tiers.push(TierPricing {
                assignment: assignment_from_row(row, "a_")?,
                tier: tier_from_row(row, "t_")?,
                customer_price,
            });
        }

        Ok(Some(PricingSnapshot { product, tiers }))
    }

    // ---- inventory ----

    pub async fn fetch_inventory(&self, product_id: ProductId) -> Result<Option<Inventory>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, stock_quantity, min_stock_level, max_stock_level,
                   reorder_point, last_stock_update, location_code, version
            FROM inventories
            WHERE product_id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_inventory", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let version: i64 = row.try_get("version").map_err(decode_error)?;
        Ok(Some(Inventory::restore(inventory_from_row(&row)?, version as u64)))
    }

    /// Insert inventory, its initial transactions and the product flag in one
    /// transaction.
    #[instrument(
        skip(self, commit),
        fields(product_id = %commit.record.product_id, version = commit.version),
        err
    )]
    pub async fn insert_inventory(&self, commit: InventoryCommit<'_>) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let r = commit.record;
        sqlx::query(
            r#"
            INSERT INTO inventories (
                id, product_id, stock_quantity, min_stock_level, max_stock_level,
                reorder_point, last_stock_update, location_code, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(r.id.as_uuid())
        .bind(r.product_id.as_uuid())
        .bind(r.stock_quantity)
        .bind(r.min_stock_level)
        .bind(r.max_stock_level)
        .bind(r.reorder_point)
        .bind(r.last_stock_update)
        .bind(r.location_code.as_deref())
        .bind(commit.version as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_inventory", e))?;

        write_ledger_rows(&mut tx, commit).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    /// Version-checked update of inventory, ledger and product flag.
    #[instrument(
        skip(self, commit),
        fields(
            product_id = %commit.record.product_id,
            version = commit.version,
            expected_version = ?expected
        ),
        err
    )]
    pub async fn update_inventory(
        &self,
        commit: InventoryCommit<'_>,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let r = commit.record;
        let updated = sqlx::query(
            r#"
            UPDATE inventories
            SET stock_quantity = $2,
                min_stock_level = $3,
                max_stock_level = $4,
                reorder_point = $5,
                last_stock_update = $6,
                location_code = $7,
                version = $8
            WHERE product_id = $1
              AND version = $9
            "#,
        )
        .bind(r.product_id.as_uuid())
        .bind(r.stock_quantity)
        .bind(r.min_stock_level)
        .bind(r.max_stock_level)
        .bind(r.reorder_point)
        .bind(r.last_stock_update)
        .bind(r.location_code.as_deref())
        .bind(commit.version as i64)
        .bind(expected.0 as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_inventory", e))?;

        if updated.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::Concurrency(format!(
                "inventory for product {} is no longer at {:?}",
                r.product_id, expected
            )));
        }

        write_ledger_rows(&mut tx, commit).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    pub async fn fetch_transactions(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, transaction_type, quantity, transaction_date,
                   notes, reference, user_id
            FROM stock_transactions
            WHERE product_id = $1
            ORDER BY transaction_date DESC, seq DESC
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_transactions", e))?;

        rows.iter().map(transaction_from_row).collect()
    }

    pub async fn fetch_inventories(&self) -> Result<Vec<InventoryRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, stock_quantity, min_stock_level, max_stock_level,
                   reorder_point, last_stock_update, location_code
            FROM inventories
            ORDER BY stock_quantity ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_inventories", e))?;

        rows.iter().map(inventory_from_row).collect()
    }
}

/// Append transaction rows and sync the product's in-stock flag.
async fn write_ledger_rows(
    tx: &mut Transaction<'_, Postgres>,
    commit: InventoryCommit<'_>,
) -> Result<(), StoreError> {
    for t in commit.transactions {
        sqlx::query(
            r#"
            INSERT INTO stock_transactions (
                id, product_id, transaction_type, quantity, transaction_date,
                notes, reference, user_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(t.id.as_uuid())
        .bind(t.product_id.as_uuid())
        .bind(t.transaction_type.as_str())
        .bind(t.quantity)
        .bind(t.transaction_date)
        .bind(t.notes.as_deref())
        .bind(t.reference.as_deref())
        .bind(t.user_id.map(uuid::Uuid::from))
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_transaction", e))?;
    }

    sqlx::query(
        r#"
        UPDATE products
        SET in_stock = $2
        WHERE id = $1 AND in_stock IS DISTINCT FROM $2
        "#,
    )
    .bind(commit.record.product_id.as_uuid())
    .bind(commit.record.in_stock())
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update_product_in_stock", e))?;

    Ok(())
}

fn decode_error(err: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("failed to decode row: {err}"))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let id: uuid::Uuid = row.try_get("id").map_err(decode_error)?;
    Ok(Product::restore(
        ProductId::from_uuid(id),
        row.try_get("name").map_err(decode_error)?,
        row.try_get("price").map_err(decode_error)?,
        row.try_get("discount_price").map_err(decode_error)?,
        row.try_get("in_stock").map_err(decode_error)?,
        row.try_get("created_at").map_err(decode_error)?,
    ))
}

// Column readers take a prefix so the snapshot join can alias columns.

fn tier_from_row(row: &PgRow, prefix: &str) -> Result<PricingTier, StoreError> {
    let col = |name: &str| format!("{prefix}{name}");
    let id: uuid::Uuid = row.try_get(col("id").as_str()).map_err(decode_error)?;
    Ok(PricingTier {
        id: PricingTierId::from_uuid(id),
        name: row.try_get(col("name").as_str()).map_err(decode_error)?,
        description: row.try_get(col("description").as_str()).map_err(decode_error)?,
        discount_percentage: row
            .try_get(col("discount_percentage").as_str())
            .map_err(decode_error)?,
        is_active: row.try_get(col("is_active").as_str()).map_err(decode_error)?,
        created_at: row.try_get(col("created_at").as_str()).map_err(decode_error)?,
    })
}

fn assignment_from_row(row: &PgRow, prefix: &str) -> Result<UserPricingTierAssignment, StoreError> {
    let col = |name: &str| format!("{prefix}{name}");
    let id: uuid::Uuid = row.try_get(col("id").as_str()).map_err(decode_error)?;
    let user_id: uuid::Uuid = row.try_get(col("user_id").as_str()).map_err(decode_error)?;
    let tier_id: uuid::Uuid = row
        .try_get(col("pricing_tier_id").as_str())
        .map_err(decode_error)?;
    Ok(UserPricingTierAssignment {
        id: AssignmentId::from_uuid(id),
        user_id: UserId::from_uuid(user_id),
        pricing_tier_id: PricingTierId::from_uuid(tier_id),
        start_date: row.try_get(col("start_date").as_str()).map_err(decode_error)?,
        end_date: row.try_get(col("end_date").as_str()).map_err(decode_error)?,
        is_active: row.try_get(col("is_active").as_str()).map_err(decode_error)?,
    })
}

fn customer_pricing_from_row(row: &PgRow, prefix: &str) -> Result<CustomerPricing, StoreError> {
    let col = |name: &str| format!("{prefix}{name}");
    let id: uuid::Uuid = row.try_get(col("id").as_str()).map_err(decode_error)?;
    let product_id: uuid::Uuid = row.try_get(col("product_id").as_str()).map_err(decode_error)?;
    let tier_id: uuid::Uuid = row
        .try_get(col("pricing_tier_id").as_str())
        .map_err(decode_error)?;
    Ok(CustomerPricing {
        id: CustomerPricingId::from_uuid(id),
        product_id: ProductId::from_uuid(product_id),
        pricing_tier_id: PricingTierId::from_uuid(tier_id),
        price: row.try_get(col("price").as_str()).map_err(decode_error)?,
        is_active: row.try_get(col("is_active").as_str()).map_err(decode_error)?,
    })
}

fn inventory_from_row(row: &PgRow) -> Result<InventoryRecord, StoreError> {
    let id: uuid::Uuid = row.try_get("id").map_err(decode_error)?;
    let product_id: uuid::Uuid = row.try_get("product_id").map_err(decode_error)?;
    Ok(InventoryRecord {
        id: InventoryId::from_uuid(id),
        product_id: ProductId::from_uuid(product_id),
        stock_quantity: row.try_get("stock_quantity").map_err(decode_error)?,
        min_stock_level: row.try_get("min_stock_level").map_err(decode_error)?,
        max_stock_level: row.try_get("max_stock_level").map_err(decode_error)?,
        reorder_point: row.try_get("reorder_point").map_err(decode_error)?,
        last_stock_update: row.try_get("last_stock_update").map_err(decode_error)?,
        location_code: row.try_get("location_code").map_err(decode_error)?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<StockTransaction, StoreError> {
    let id: uuid::Uuid = row.try_get("id").map_err(decode_error)?;
    let product_id: uuid::Uuid = row.try_get("product_id").map_err(decode_error)?;
    let transaction_type: String = row.try_get("transaction_type").map_err(decode_error)?;
    let user_id: Option<uuid::Uuid> = row.try_get("user_id").map_err(decode_error)?;
    Ok(StockTransaction {
        id: StockTransactionId::from_uuid(id),
        product_id: ProductId::from_uuid(product_id),
        transaction_type: transaction_type
            .parse::<TransactionType>()
            .map_err(|e| StoreError::Backend(format!("bad transaction_type column: {e}")))?,
        quantity: row.try_get("quantity").map_err(decode_error)?,
        transaction_date: row.try_get("transaction_date").map_err(decode_error)?,
        notes: row.try_get("notes").map_err(decode_error)?,
        reference: row.try_get("reference").map_err(decode_error)?,
        user_id: user_id.map(UserId::from_uuid),
    })
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Duplicate(msg),
                Some("40001") => StoreError::Concurrency(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

impl ProductStore for PostgresStore {
    fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.block_on(self.fetch_product(id))
    }

    fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        self.block_on(self.insert_product_row(product))
    }

    fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        self.block_on(self.fetch_products())
    }
}

impl PricingStore for PostgresStore {
    fn insert_tier(&self, tier: &PricingTier) -> Result<(), StoreError> {
        self.block_on(self.insert_tier_row(tier))
    }

    fn update_tier(&self, tier: &PricingTier) -> Result<(), StoreError> {
        self.block_on(self.update_tier_row(tier))
    }

    fn get_tier(&self, id: PricingTierId) -> Result<Option<PricingTier>, StoreError> {
        self.block_on(self.fetch_tier(id))
    }

    fn list_tiers(&self) -> Result<Vec<PricingTier>, StoreError> {
        self.block_on(self.fetch_tiers())
    }

    fn insert_assignment(&self, assignment: &UserPricingTierAssignment) -> Result<(), StoreError> {
        self.block_on(self.insert_assignment_row(assignment))
    }

    fn update_assignment(&self, assignment: &UserPricingTierAssignment) -> Result<(), StoreError> {
        self.block_on(self.update_assignment_row(assignment))
    }

    fn get_assignment(
        &self,
        id: AssignmentId,
    ) -> Result<Option<UserPricingTierAssignment>, StoreError> {
        self.block_on(self.fetch_assignment(id))
    }

    fn assignments_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserPricingTierAssignment>, StoreError> {
        self.block_on(self.fetch_assignments_for_user(user_id))
    }

    fn insert_customer_pricing(&self, pricing: &CustomerPricing) -> Result<(), StoreError> {
        self.block_on(self.insert_customer_pricing_row(pricing))
    }

    fn update_customer_pricing(&self, pricing: &CustomerPricing) -> Result<(), StoreError> {
        self.block_on(self.update_customer_pricing_row(pricing))
    }

    fn get_customer_pricing(
        &self,
        id: CustomerPricingId,
    ) -> Result<Option<CustomerPricing>, StoreError> {
        self.block_on(self.fetch_customer_pricing(id))
    }

    fn customer_pricing_for(
        &self,
        product_id: ProductId,
        tier_id: PricingTierId,
    ) -> Result<Option<CustomerPricing>, StoreError> {
        self.block_on(self.fetch_customer_pricing_for(product_id, tier_id))
    }

    fn pricing_snapshot(
        &self,
        user_id: UserId,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<Option<PricingSnapshot>, StoreError> {
        self.block_on(self.load_pricing_snapshot(user_id, product_id, now))
    }
}

impl InventoryStore for PostgresStore {
    fn get_inventory(&self, product_id: ProductId) -> Result<Option<Inventory>, StoreError> {
        self.block_on(self.fetch_inventory(product_id))
    }

    fn create_inventory(&self, commit: InventoryCommit<'_>) -> Result<(), StoreError> {
        self.block_on(self.insert_inventory(commit))
    }

    fn commit_stock_change(
        &self,
        commit: InventoryCommit<'_>,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        self.block_on(self.update_inventory(commit, expected))
    }

    fn list_transactions(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        self.block_on(self.fetch_transactions(product_id))
    }

    fn list_inventories(&self) -> Result<Vec<InventoryRecord>, StoreError> {
        self.block_on(self.fetch_inventories())
    }
}
