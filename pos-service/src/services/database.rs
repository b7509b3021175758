//! Database service for pos-service.
//!
//! Owns the connection pool and every SQL statement in the service, including
//! the submission log store and the report grouping queries.

use crate::models::{
    CreateInvoice, CreateOrder, CreateProduct, Invoice, Order, OrderItem, OrderLine, Product,
    SalesPeriodTotals, SubmissionRecord, SubmissionStatus, TopProduct,
};
use crate::services::metrics::DB_QUERY_DURATION;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "pos-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Product Operations
    // -------------------------------------------------------------------------

    /// Create a new product.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: &CreateProduct) -> Result<Product, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (name, description, price, stock, tax_code)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, description, price, stock, tax_code, created_utc
            "#,
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.stock)
        .bind(&input.tax_code)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create product: {}", e)))?;

        timer.observe_duration();

        info!(product_id = product.id, "Product created");

        Ok(product)
    }

    /// Get a product by ID.
    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: i64) -> Result<Option<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price, stock, tax_code, created_utc
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get product: {}", e)))?;

        timer.observe_duration();

        Ok(product)
    }

    /// List all products.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_products"])
            .start_timer();

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price, stock, tax_code, created_utc
            FROM products
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list products: {}", e)))?;

        timer.observe_duration();

        Ok(products)
    }

    // -------------------------------------------------------------------------
    // Order Operations
    // -------------------------------------------------------------------------

    /// Capture an order with its line items in one transaction.
    #[instrument(skip(self, input), fields(item_count = input.items.len()))]
    pub async fn create_order(&self, input: &CreateOrder) -> Result<Order, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_order"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (total, tax, discount, created_utc)
            VALUES ($1, $2, $3, COALESCE($4, NOW()))
            RETURNING id, total, tax, discount, created_utc
            "#,
        )
        .bind(input.total)
        .bind(input.tax)
        .bind(input.discount)
        .bind(input.created_utc)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create order: {}", e)))?;

        for item in &input.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity, price)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(order.id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.price)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to add order item: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit order: {}", e))
        })?;

        timer.observe_duration();

        info!(order_id = order.id, "Order captured");

        Ok(order)
    }

    /// Get an order by ID.
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: i64) -> Result<Option<Order>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_order"])
            .start_timer();

        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, total, tax, discount, created_utc
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get order: {}", e)))?;

        timer.observe_duration();

        Ok(order)
    }

    /// Get the items of an order.
    #[instrument(skip(self))]
    pub async fn get_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_order_items"])
            .start_timer();

        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_id, quantity, price
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get order items: {}", e)))?;

        timer.observe_duration();

        Ok(items)
    }

    /// Get order lines joined with product identity, as the fiscal
    /// transformer needs them.
    #[instrument(skip(self))]
    pub async fn get_order_lines(&self, order_id: i64) -> Result<Vec<OrderLine>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_order_lines"])
            .start_timer();

        let lines = sqlx::query_as::<_, OrderLine>(
            r#"
            SELECT oi.product_id, p.name AS product_name, p.tax_code, oi.quantity, oi.price
            FROM order_items oi
            JOIN products p ON p.id = oi.product_id
            WHERE oi.order_id = $1
            ORDER BY oi.id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get order lines: {}", e)))?;

        timer.observe_duration();

        Ok(lines)
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Raise an invoice from an order (1:1).
    ///
    /// Totals are taken from the order: `total − discount` as the invoice
    /// amount, `tax` as the tax amount. The default number is
    /// `INV-{order_id}`.
    #[instrument(skip(self, input), fields(order_id = input.order_id))]
    pub async fn create_invoice(&self, input: &CreateInvoice) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let order = self
            .get_order(input.order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;

        let invoice_number = input
            .invoice_number
            .clone()
            .unwrap_or_else(|| format!("INV-{}", order.id));
        let issue_date = input
            .issue_date
            .unwrap_or_else(|| Utc::now().date_naive());

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (order_id, invoice_number, total_amount, tax_amount, issue_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, order_id, invoice_number, total_amount, tax_amount, issue_date, created_utc
            "#,
        )
        .bind(order.id)
        .bind(&invoice_number)
        .bind(order.total - order.discount)
        .bind(order.tax)
        .bind(issue_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "An invoice already exists for order {} or number '{}'",
                    order.id,
                    invoice_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)),
        })?;

        timer.observe_duration();

        info!(
            invoice_id = invoice.id,
            invoice_number = %invoice.invoice_number,
            "Invoice raised"
        );

        Ok(invoice)
    }

    /// Get an invoice by ID.
    #[instrument(skip(self))]
    pub async fn get_invoice(&self, invoice_id: i64) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, order_id, invoice_number, total_amount, tax_amount, issue_date, created_utc
            FROM invoices
            WHERE id = $1
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    // -------------------------------------------------------------------------
    // Submission Log Store
    // -------------------------------------------------------------------------

    /// Record the terminal outcome of a submission sequence.
    ///
    /// Single-row upsert keyed by invoice number, last-write-wins by
    /// `submitted_utc`: a stale writer (e.g. an abandoned call completing
    /// late) can never clobber a newer terminal outcome. The returned record
    /// is always the authoritative row.
    #[instrument(skip(self, response), fields(invoice_number = %invoice_number))]
    pub async fn record_submission(
        &self,
        invoice_number: &str,
        status: SubmissionStatus,
        response: &Value,
        submitted_utc: DateTime<Utc>,
    ) -> Result<SubmissionRecord, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_submission"])
            .start_timer();

        let written = sqlx::query_as::<_, SubmissionRecord>(
            r#"
            INSERT INTO submission_log (invoice_number, status, response_payload, submitted_utc)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (invoice_number) DO UPDATE
            SET status = EXCLUDED.status,
                response_payload = EXCLUDED.response_payload,
                submitted_utc = EXCLUDED.submitted_utc
            WHERE submission_log.submitted_utc <= EXCLUDED.submitted_utc
            RETURNING invoice_number, status, response_payload, submitted_utc
            "#,
        )
        .bind(invoice_number)
        .bind(status.as_str())
        .bind(response)
        .bind(submitted_utc)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to record submission: {}", e))
        })?;

        timer.observe_duration();

        match written {
            Some(record) => {
                info!(status = %record.status, "Submission outcome recorded");
                Ok(record)
            }
            // The guarded update skipped a stale write; the stored row wins.
            None => self
                .get_submission(invoice_number)
                .await?
                .ok_or_else(|| {
                    AppError::DatabaseError(anyhow::anyhow!(
                        "Submission log row vanished during upsert"
                    ))
                }),
        }
    }

    /// Look up the recorded outcome for an invoice number.
    #[instrument(skip(self))]
    pub async fn get_submission(
        &self,
        invoice_number: &str,
    ) -> Result<Option<SubmissionRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_submission"])
            .start_timer();

        let record = sqlx::query_as::<_, SubmissionRecord>(
            r#"
            SELECT invoice_number, status, response_payload, submitted_utc
            FROM submission_log
            WHERE invoice_number = $1
            "#,
        )
        .bind(invoice_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get submission: {}", e)))?;

        timer.observe_duration();

        Ok(record)
    }

    // -------------------------------------------------------------------------
    // Report Queries
    // -------------------------------------------------------------------------

    /// Per-day order totals, ascending by date. Sums coalesce to zero rather
    /// than propagating NULL.
    #[instrument(skip(self))]
    pub async fn daily_totals(
        &self,
        date: Option<NaiveDate>,
    ) -> Result<Vec<SalesPeriodTotals>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["daily_totals"])
            .start_timer();

        let period_filter = date.map(|d| d.format("%Y-%m-%d").to_string());

        let totals = sqlx::query_as::<_, SalesPeriodTotals>(
            r#"
            SELECT to_char(created_utc AT TIME ZONE 'UTC', 'YYYY-MM-DD') AS period,
                   COUNT(*) AS total_orders,
                   COALESCE(SUM(total - discount), 0) AS total_revenue,
                   COALESCE(SUM(tax), 0) AS total_tax
            FROM orders
            WHERE ($1::text IS NULL OR to_char(created_utc AT TIME ZONE 'UTC', 'YYYY-MM-DD') = $1)
            GROUP BY period
            ORDER BY period
            "#,
        )
        .bind(&period_filter)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get daily totals: {}", e)))?;

        timer.observe_duration();

        Ok(totals)
    }

    /// Per-month order totals, ascending by `YYYY-MM` key.
    #[instrument(skip(self))]
    pub async fn monthly_totals(
        &self,
        month: Option<&str>,
    ) -> Result<Vec<SalesPeriodTotals>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["monthly_totals"])
            .start_timer();

        let totals = sqlx::query_as::<_, SalesPeriodTotals>(
            r#"
            SELECT to_char(created_utc AT TIME ZONE 'UTC', 'YYYY-MM') AS period,
                   COUNT(*) AS total_orders,
                   COALESCE(SUM(total - discount), 0) AS total_revenue,
                   COALESCE(SUM(tax), 0) AS total_tax
            FROM orders
            WHERE ($1::text IS NULL OR to_char(created_utc AT TIME ZONE 'UTC', 'YYYY-MM') = $1)
            GROUP BY period
            ORDER BY period
            "#,
        )
        .bind(month)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get monthly totals: {}", e))
        })?;

        timer.observe_duration();

        Ok(totals)
    }

    /// Top products by quantity sold on one day, ties broken by ascending
    /// product id for determinism.
    #[instrument(skip(self))]
    pub async fn top_products_for_day(&self, period: &str) -> Result<Vec<TopProduct>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["top_products_for_day"])
            .start_timer();

        let top = sqlx::query_as::<_, TopProduct>(
            r#"
            SELECT p.id AS product_id, p.name, SUM(oi.quantity)::BIGINT AS quantity_sold
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            JOIN products p ON p.id = oi.product_id
            WHERE to_char(o.created_utc AT TIME ZONE 'UTC', 'YYYY-MM-DD') = $1
            GROUP BY p.id, p.name
            ORDER BY SUM(oi.quantity) DESC, p.id ASC
            LIMIT 5
            "#,
        )
        .bind(period)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to rank products: {}", e)))?;

        timer.observe_duration();

        Ok(top)
    }

    /// Top products by quantity sold in one month.
    #[instrument(skip(self))]
    pub async fn top_products_for_month(&self, period: &str) -> Result<Vec<TopProduct>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["top_products_for_month"])
            .start_timer();

        let top = sqlx::query_as::<_, TopProduct>(
            r#"
            SELECT p.id AS product_id, p.name, SUM(oi.quantity)::BIGINT AS quantity_sold
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            JOIN products p ON p.id = oi.product_id
            WHERE to_char(o.created_utc AT TIME ZONE 'UTC', 'YYYY-MM') = $1
            GROUP BY p.id, p.name
            ORDER BY SUM(oi.quantity) DESC, p.id ASC
            LIMIT 5
            "#,
        )
        .bind(period)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to rank products: {}", e)))?;

        timer.observe_duration();

        Ok(top)
    }
}
