//! # Customer Repository
//!
//! The customer registry: who may buy on credit. Transactions reference
//! customers by id and keep their own name snapshot, so edits here never
//! rewrite history.

use chrono::{DateTime, Utc};
use daftar_core::validation::{validate_customer_name, validate_phone};
use daftar_core::Customer;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: String,
    name: String,
    phone: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            name: row.name,
            phone: row.phone,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

/// Repository for customer registry operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Validates and registers a new customer.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let ahmed = db.customers().create("Ahmed", "0100 123 4567", None).await?;
    /// ```
    pub async fn create(&self, name: &str, phone: &str, notes: Option<&str>) -> DbResult<Customer> {
        validate_customer_name(name)?;
        validate_phone(phone)?;

        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            phone: phone.trim().to_string(),
            notes: notes.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
            created_at: Utc::now(),
        };
        self.insert(&customer).await?;

        info!(id = %customer.id, name = %customer.name, "Customer registered");
        Ok(customer)
    }

    /// Inserts a customer as-is.
    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, phone, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.notes)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let row: Option<CustomerRow> = sqlx::query_as(
            "SELECT id, name, phone, notes, created_at FROM customers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Customer::from))
    }

    /// All customers, ordered by name.
    pub async fn list_all(&self) -> DbResult<Vec<Customer>> {
        let rows: Vec<CustomerRow> = sqlx::query_as(
            "SELECT id, name, phone, notes, created_at FROM customers ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Customer::from).collect())
    }

    /// Case-insensitive substring search on name or phone.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Customer>> {
        let query = query.trim();
        debug!(query = %query, limit, "Searching customers");

        let pattern = format!("%{}%", query);
        let rows: Vec<CustomerRow> = sqlx::query_as(
            r#"
            SELECT id, name, phone, notes, created_at
            FROM customers
            WHERE name LIKE ?1 OR phone LIKE ?1
            ORDER BY name, id
            LIMIT ?2
            "#,
        )
        .bind(pattern)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Customer::from).collect())
    }

    /// Updates name, phone and notes. `NotFound` if the id is unknown.
    pub async fn update(&self, customer: &Customer) -> DbResult<()> {
        validate_customer_name(&customer.name)?;
        validate_phone(&customer.phone)?;

        let result = sqlx::query("UPDATE customers SET name = ?1, phone = ?2, notes = ?3 WHERE id = ?4")
            .bind(customer.name.trim())
            .bind(customer.phone.trim())
            .bind(&customer.notes)
            .bind(&customer.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("customer", customer.id.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn repo() -> CustomerRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().customers()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = repo().await;
        let ahmed = repo
            .create("  Ahmed ", "0100 123 4567", Some("pays Thursdays"))
            .await
            .unwrap();
        assert_eq!(ahmed.name, "Ahmed");

        let stored = repo.get_by_id(&ahmed.id).await.unwrap().unwrap();
        assert_eq!(stored, ahmed);
        assert_eq!(stored.notes.as_deref(), Some("pays Thursdays"));
    }

    #[tokio::test]
    async fn test_create_validates() {
        let repo = repo().await;
        assert!(matches!(
            repo.create("", "01001234567", None).await,
            Err(DbError::InvalidInput(_))
        ));
        assert!(matches!(
            repo.create("Ahmed", "call me", None).await,
            Err(DbError::InvalidInput(_))
        ));
        assert!(repo.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_and_list() {
        let repo = repo().await;
        repo.create("Mona", "01112223333", None).await.unwrap();
        repo.create("Ahmed", "01001234567", None).await.unwrap();

        let names: Vec<String> = repo
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Ahmed", "Mona"]);

        assert_eq!(repo.search("mon", 10).await.unwrap().len(), 1);
        assert_eq!(repo.search("0100", 10).await.unwrap()[0].name, "Ahmed");
    }

    #[tokio::test]
    async fn test_update_unknown_is_not_found() {
        let repo = repo().await;
        let mut ghost = repo.create("Mona", "01112223333", None).await.unwrap();
        ghost.id = "missing".into();
        assert!(matches!(
            repo.update(&ghost).await,
            Err(DbError::NotFound { entity: "customer", .. })
        ));
    }
}
