use std::collections::HashMap;

use async_trait::async_trait;
use common::{CartId, OrderId, ProductId, UserId};
use domain::{
    Address, CartLine, CartSnapshot, Money, Order, OrderItem, OrderNumber, OrderStatus,
    PaymentStatus, Product,
};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{CheckoutStore, OrderPlacement, OrderQuery, Page},
};

const ORDER_COLUMNS: &str = r#"
    id, user_id, order_number, status,
    shipping_first_name, shipping_last_name, shipping_email, shipping_phone,
    shipping_street, shipping_city, shipping_state, shipping_country, shipping_zip_code,
    billing_first_name, billing_last_name, billing_email, billing_phone,
    billing_street, billing_city, billing_state, billing_country, billing_zip_code,
    payment_method, payment_status, payment_intent_id,
    subtotal_cents, tax_cents, shipping_cents, total_cents,
    created_at, updated_at
"#;

const CANCELLABLE_STATUSES: &str = "('pending', 'confirmed', 'processing')";

/// PostgreSQL-backed checkout store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL checkout store.
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

    fn quantity(row: &PgRow, column: &str) -> Result<u32> {
        let value: i64 = row.try_get(column)?;
        u32::try_from(value)
            .map_err(|_| StoreError::DataCorruption(format!("{column} out of range: {value}")))
    }

    fn money(row: &PgRow, column: &str) -> Result<Money> {
        Ok(Money::from_cents(row.try_get(column)?))
    }

    fn row_to_product(row: &PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            price: Self::money(row, "price_cents")?,
            in_stock: row.try_get("in_stock")?,
            stock_quantity: Self::quantity(row, "stock_quantity")?,
        })
    }

    fn row_to_address(row: &PgRow, prefix: &str) -> Result<Address> {
        let field = |name: &str| -> Result<String> {
            Ok(row.try_get(format!("{prefix}_{name}").as_str())?)
        };

        Ok(Address {
            first_name: field("first_name")?,
            last_name: field("last_name")?,
            email: field("email")?,
            phone: field("phone")?,
            street: field("street")?,
            city: field("city")?,
            state: field("state")?,
            country: field("country")?,
            zip_code: field("zip_code")?,
        })
    }

    fn row_to_item(row: &PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            quantity: Self::quantity(row, "quantity")?,
            unit_price: Self::money(row, "unit_price_cents")?,
            line_total: Self::money(row, "line_total_cents")?,
        })
    }

    /// Maps an order row. Items are filled in by the caller.
    fn row_to_order(row: &PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        let payment_status: String = row.try_get("payment_status")?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            order_number: OrderNumber::from_stored(row.try_get::<String, _>("order_number")?),
            status: status
                .parse::<OrderStatus>()
                .map_err(|e| StoreError::DataCorruption(e.to_string()))?,
            shipping_address: Self::row_to_address(row, "shipping")?,
            billing_address: Self::row_to_address(row, "billing")?,
            payment_method: row.try_get("payment_method")?,
            payment_status: payment_status
                .parse::<PaymentStatus>()
                .map_err(|e| StoreError::DataCorruption(e.to_string()))?,
            payment_intent_id: row.try_get("payment_intent_id")?,
            subtotal: Self::money(row, "subtotal_cents")?,
            tax: Self::money(row, "tax_cents")?,
            shipping: Self::money(row, "shipping_cents")?,
            total: Self::money(row, "total_cents")?,
            items: Vec::new(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn fetch_order(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&mut *conn)
                .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut order = Self::row_to_order(&row)?;
        order.items = sqlx::query(
            r#"
            SELECT product_id, quantity, unit_price_cents, line_total_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(Self::row_to_item)
        .collect::<Result<_>>()?;

        Ok(Some(order))
    }

    async fn require_order(conn: &mut PgConnection, id: OrderId) -> Result<Order> {
        Self::fetch_order(conn, id)
            .await?
            .ok_or_else(|| StoreError::not_found("order", id))
    }

    async fn order_exists(conn: &mut PgConnection, id: OrderId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&mut *conn)
            .await?;
        Ok(exists)
    }

    async fn product_exists(conn: &mut PgConnection, id: &ProductId) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
                .bind(id.as_str())
                .fetch_one(&mut *conn)
                .await?;
        Ok(exists)
    }

    /// Conditional decrement: succeeds only if the product is in stock and
    /// has at least `quantity` units. The row lock serialises writers.
    async fn reserve_stock(conn: &mut PgConnection, id: &ProductId, quantity: u32) -> Result<u32> {
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity - $2, updated_at = NOW()
            WHERE id = $1 AND in_stock AND stock_quantity >= $2
            RETURNING stock_quantity
            "#,
        )
        .bind(id.as_str())
        .bind(i64::from(quantity))
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(remaining) = remaining {
            return u32::try_from(remaining).map_err(|_| {
                StoreError::DataCorruption(format!("stock for {id} out of range: {remaining}"))
            });
        }

        if Self::product_exists(conn, id).await? {
            Err(StoreError::InsufficientStock {
                product_id: id.to_string(),
            })
        } else {
            Err(StoreError::not_found("product", id))
        }
    }

    async fn fetch_cart(conn: &mut PgConnection, user_id: UserId) -> Result<Option<CartSnapshot>> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT id, user_id, total_cents, total_items FROM carts WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let cart_id = CartId::from_uuid(row.try_get::<Uuid, _>("id")?);
        let lines = sqlx::query(
            r#"
            SELECT product_id, quantity, unit_price_cents
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(cart_id.as_uuid())
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(|line| {
            Ok(CartLine {
                product_id: ProductId::new(line.try_get::<String, _>("product_id")?),
                quantity: Self::quantity(line, "quantity")?,
                unit_price: Self::money(line, "unit_price_cents")?,
            })
        })
        .collect::<Result<_>>()?;

        Ok(Some(CartSnapshot {
            cart_id,
            user_id,
            lines,
            cached_total: Self::money(&row, "total_cents")?,
            cached_items: Self::quantity(&row, "total_items")?,
        }))
    }

    async fn refresh_cart_totals(conn: &mut PgConnection, cart_id: CartId) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE carts SET
                total_cents = COALESCE(
                    (SELECT SUM(quantity * unit_price_cents) FROM cart_items WHERE cart_id = $1), 0),
                total_items = COALESCE(
                    (SELECT SUM(quantity) FROM cart_items WHERE cart_id = $1), 0),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(cart_id.as_uuid())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn empty_cart(conn: &mut PgConnection, cart_id: CartId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id.as_uuid())
            .execute(&mut *conn)
            .await?;

        let updated = sqlx::query(
            "UPDATE carts SET total_cents = 0, total_items = 0, updated_at = NOW() WHERE id = $1",
        )
        .bind(cart_id.as_uuid())
        .execute(&mut *conn)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::not_found("cart", cart_id));
        }
        Ok(())
    }

    async fn insert_order(conn: &mut PgConnection, order: &Order) -> Result<()> {
        let ship = &order.shipping_address;
        let bill = &order.billing_address;

        sqlx::query(&format!(
            r#"
            INSERT INTO orders ({ORDER_COLUMNS})
            VALUES ($1, $2, $3, $4,
                    $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20, $21, $22,
                    $23, $24, $25,
                    $26, $27, $28, $29,
                    $30, $31)
            "#
        ))
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.order_number.as_str())
        .bind(order.status.as_str())
        .bind(&ship.first_name)
        .bind(&ship.last_name)
        .bind(&ship.email)
        .bind(&ship.phone)
        .bind(&ship.street)
        .bind(&ship.city)
        .bind(&ship.state)
        .bind(&ship.country)
        .bind(&ship.zip_code)
        .bind(&bill.first_name)
        .bind(&bill.last_name)
        .bind(&bill.email)
        .bind(&bill.phone)
        .bind(&bill.street)
        .bind(&bill.city)
        .bind(&bill.state)
        .bind(&bill.country)
        .bind(&bill.zip_code)
        .bind(&order.payment_method)
        .bind(order.payment_status.as_str())
        .bind(order.payment_intent_id.as_deref())
        .bind(order.subtotal.cents())
        .bind(order.tax.cents())
        .bind(order.shipping.cents())
        .bind(order.total.cents())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_order_number")
            {
                return StoreError::Conflict(format!(
                    "order number {} already exists",
                    order.order_number
                ));
            }
            StoreError::Database(e)
        })?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items
                    (order_id, position, product_id, quantity, unit_price_cents, line_total_cents)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(position as i64)
            .bind(item.product_id.as_str())
            .bind(i64::from(item.quantity))
            .bind(item.unit_price.cents())
            .bind(item.line_total.cents())
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl CheckoutStore for PostgresStore {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, name, price_cents, in_stock, stock_quantity
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn upsert_product(&self, product: Product) -> Result<Product> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, in_stock, stock_quantity)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                in_stock = EXCLUDED.in_stock,
                stock_quantity = EXCLUDED.stock_quantity,
                updated_at = NOW()
            RETURNING id, name, price_cents, in_stock, stock_quantity
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(product.in_stock)
        .bind(i64::from(product.stock_quantity))
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_product(&row)
    }

    async fn adjust_stock(&self, id: &ProductId, delta: i64) -> Result<u32> {
        let mut conn = self.pool.acquire().await?;

        if delta < 0 {
            let quantity = u32::try_from(-delta).map_err(|_| StoreError::InsufficientStock {
                product_id: id.to_string(),
            })?;
            return Self::reserve_stock(&mut conn, id, quantity).await;
        }

        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING stock_quantity
            "#,
        )
        .bind(id.as_str())
        .bind(delta)
        .fetch_optional(&mut *conn)
        .await?;

        let updated = updated.ok_or_else(|| StoreError::not_found("product", id))?;
        u32::try_from(updated)
            .map_err(|_| StoreError::DataCorruption(format!("stock for {id} out of range")))
    }

    async fn cart_snapshot(&self, user_id: UserId) -> Result<Option<CartSnapshot>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_cart(&mut conn, user_id).await
    }

    async fn add_cart_item(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<CartSnapshot> {
        if quantity == 0 {
            return Err(StoreError::InvalidQuantity(quantity));
        }

        let mut tx = self.pool.begin().await?;

        let cart_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO carts (id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (cart_id, product_id, quantity, unit_price_cents, position)
            VALUES ($1, $2, $3, $4,
                    (SELECT COALESCE(MAX(position), 0) + 1 FROM cart_items WHERE cart_id = $1))
            ON CONFLICT (cart_id, product_id) DO UPDATE SET
                quantity = cart_items.quantity + EXCLUDED.quantity
            "#,
        )
        .bind(cart_id)
        .bind(product_id.as_str())
        .bind(i64::from(quantity))
        .bind(unit_price.cents())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return StoreError::not_found("product", product_id);
            }
            StoreError::Database(e)
        })?;

        Self::refresh_cart_totals(&mut tx, CartId::from_uuid(cart_id)).await?;
        let cart = Self::fetch_cart(&mut tx, user_id)
            .await?
            .ok_or_else(|| StoreError::not_found("cart", user_id))?;

        tx.commit().await?;
        Ok(cart)
    }

    async fn set_cart_item_quantity(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot> {
        let mut tx = self.pool.begin().await?;

        let cart_id: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM carts WHERE user_id = $1 FOR UPDATE")
                .bind(user_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        let cart_id = cart_id.ok_or_else(|| StoreError::not_found("cart", user_id))?;

        let affected = if quantity == 0 {
            sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
                .bind(cart_id)
                .bind(product_id.as_str())
                .execute(&mut *tx)
                .await?
        } else {
            sqlx::query(
                "UPDATE cart_items SET quantity = $3 WHERE cart_id = $1 AND product_id = $2",
            )
            .bind(cart_id)
            .bind(product_id.as_str())
            .bind(i64::from(quantity))
            .execute(&mut *tx)
            .await?
        };

        if affected.rows_affected() == 0 {
            return Err(StoreError::not_found("cart item", product_id));
        }

        Self::refresh_cart_totals(&mut tx, CartId::from_uuid(cart_id)).await?;
        let cart = Self::fetch_cart(&mut tx, user_id)
            .await?
            .ok_or_else(|| StoreError::not_found("cart", user_id))?;

        tx.commit().await?;
        Ok(cart)
    }

    async fn clear_cart(&self, cart_id: CartId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::empty_cart(&mut tx, cart_id).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn place_order(&self, placement: OrderPlacement) -> Result<Order> {
        let OrderPlacement { order, cart_id } = placement;
        let mut tx = self.pool.begin().await?;

        // Stable lock order across concurrent placements
        let mut lines: Vec<&OrderItem> = order.items.iter().collect();
        lines.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        for item in lines {
            Self::reserve_stock(&mut tx, &item.product_id, item.quantity).await?;
        }

        Self::insert_order(&mut tx, &order).await?;
        Self::empty_cart(&mut tx, cart_id).await?;

        tx.commit().await?;
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_order(&mut conn, id).await
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<Page<Order>> {
        let mut filter = String::from(" WHERE 1=1");
        let mut param_count = 0;

        if query.user_id.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND user_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND status = ${param_count}"));
        }

        let count_sql = format!("SELECT COUNT(*) FROM orders{filter}");
        let list_sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders{filter} ORDER BY created_at DESC, id DESC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        let mut list_query = sqlx::query(&list_sql);
        if let Some(user_id) = query.user_id {
            count_query = count_query.bind(user_id.as_uuid());
            list_query = list_query.bind(user_id.as_uuid());
        }
        if let Some(status) = query.status {
            count_query = count_query.bind(status.as_str());
            list_query = list_query.bind(status.as_str());
        }
        let list_query = list_query
            .bind(i64::from(query.limit))
            .bind(query.offset() as i64);

        let total = count_query.fetch_one(&self.pool).await?;
        let rows = list_query.fetch_all(&self.pool).await?;

        let mut orders = rows
            .iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
        let item_rows = sqlx::query(
            r#"
            SELECT order_id, product_id, quantity, unit_price_cents, line_total_cents
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in &item_rows {
            let order_id: Uuid = row.try_get("order_id")?;
            items
                .entry(order_id)
                .or_default()
                .push(Self::row_to_item(row)?);
        }
        for order in &mut orders {
            order.items = items.remove(&order.id.as_uuid()).unwrap_or_default();
        }

        Ok(Page {
            items: orders,
            page: query.page,
            limit: query.limit,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    async fn cancel_order(&self, id: OrderId) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let cancelled: Option<Uuid> = sqlx::query_scalar(&format!(
            r#"
            UPDATE orders SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND status IN {CANCELLABLE_STATUSES}
            RETURNING id
            "#
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;

        if cancelled.is_none() {
            return if Self::order_exists(&mut tx, id).await? {
                Err(StoreError::StaleState { order_id: id })
            } else {
                Err(StoreError::not_found("order", id))
            };
        }

        let order = Self::require_order(&mut tx, id).await?;
        let mut lines: Vec<&OrderItem> = order.items.iter().collect();
        lines.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        for item in lines {
            let restored = sqlx::query(
                r#"
                UPDATE products
                SET stock_quantity = stock_quantity + $2, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(item.product_id.as_str())
            .bind(i64::from(item.quantity))
            .execute(&mut *tx)
            .await?;

            if restored.rows_affected() == 0 {
                tracing::warn!(
                    order_id = %id,
                    product_id = %item.product_id,
                    "Product missing while restoring stock, skipping"
                );
            }
        }

        tx.commit().await?;
        Ok(order)
    }

    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut conn = self.pool.acquire().await?;

        // Cancelled orders have released their stock and stay cancelled
        let updated = sqlx::query(
            r#"
            UPDATE orders SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status <> 'cancelled'
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .execute(&mut *conn)
        .await?;

        if updated.rows_affected() == 0 {
            return if Self::order_exists(&mut conn, id).await? {
                Err(StoreError::StaleState { order_id: id })
            } else {
                Err(StoreError::not_found("order", id))
            };
        }
        Self::require_order(&mut conn, id).await
    }

    async fn attach_payment_intent(&self, id: OrderId, intent_id: &str) -> Result<Order> {
        let mut conn = self.pool.acquire().await?;

        let updated = sqlx::query(
            "UPDATE orders SET payment_intent_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(intent_id)
        .execute(&mut *conn)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::not_found("order", id));
        }
        Self::require_order(&mut conn, id).await
    }

    async fn mark_order_paid(&self, id: OrderId) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(&format!(
            r#"
            UPDATE orders
            SET payment_status = 'paid', status = 'confirmed', updated_at = NOW()
            WHERE id = $1 AND payment_status <> 'paid' AND status IN {CANCELLABLE_STATUSES}
            "#
        ))
        .bind(id.as_uuid())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return if Self::order_exists(&mut tx, id).await? {
                Err(StoreError::StaleState { order_id: id })
            } else {
                Err(StoreError::not_found("order", id))
            };
        }

        let order = Self::require_order(&mut tx, id).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn close_account(&self, user_id: UserId) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        // Row locks hold the statuses steady until commit
        let statuses: Vec<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE user_id = $1 FOR UPDATE")
                .bind(user_id.as_uuid())
                .fetch_all(&mut *tx)
                .await?;

        let active = statuses
            .iter()
            .filter_map(|s| s.parse::<OrderStatus>().ok())
            .filter(OrderStatus::is_active)
            .count() as u64;
        if active > 0 {
            return Err(StoreError::ActiveOrders { count: active });
        }

        sqlx::query("DELETE FROM carts WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        let anonymized = sqlx::query(
            r#"
            UPDATE orders SET
                shipping_first_name = $2, shipping_last_name = $3,
                shipping_email = $4, shipping_phone = $5,
                billing_first_name = $2, billing_last_name = $3,
                billing_email = $4, billing_phone = $5,
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(Address::ANONYMIZED_FIRST_NAME)
        .bind(Address::ANONYMIZED_LAST_NAME)
        .bind(Address::ANONYMIZED_EMAIL)
        .bind(Address::ANONYMIZED_PHONE)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(anonymized.rows_affected())
    }
}
