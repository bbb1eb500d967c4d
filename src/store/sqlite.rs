use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use super::schema;
use super::{CategoryRow, ReceiptRow, ReceiptStore};
use crate::models::{LineItem, UserId};

const RECEIPT_COLUMNS: &str = "id, merchant, date, category, amount, score, items, subtotal, tax,
     discount, tip, payment_method, image_url, folder_id, created_at, updated_at";

/// Local SQLite mirror. One file holds every user's partition.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// A receipts row exactly as SQLite returns it, before decimals, JSON and
/// timestamps are decoded.
struct StoredReceipt {
    id: String,
    merchant: String,
    date: String,
    category: String,
    amount: String,
    score: i64,
    items: String,
    subtotal: String,
    tax: String,
    discount: Option<String>,
    tip: Option<String>,
    payment_method: Option<String>,
    image_url: Option<String>,
    folder_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let mut conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .context("Failed to set database pragmas")?;
        migrate(&mut conn).context("Database migration failed")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection lock poisoned"))
    }

    // ── Receipts ──────────────────────────────────────────────

    fn load_receipts_sync(&self, user: &UserId) -> Result<Vec<ReceiptRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECEIPT_COLUMNS} FROM receipts WHERE user_id = ?1 ORDER BY created_at, rowid"
        ))?;
        let rows = stmt.query_map(params![user.as_str()], |row| {
            Ok(StoredReceipt {
                id: row.get(0)?,
                merchant: row.get(1)?,
                date: row.get(2)?,
                category: row.get(3)?,
                amount: row.get(4)?,
                score: row.get(5)?,
                items: row.get(6)?,
                subtotal: row.get(7)?,
                tax: row.get(8)?,
                discount: row.get(9)?,
                tip: row.get(10)?,
                payment_method: row.get(11)?,
                image_url: row.get(12)?,
                folder_id: row.get(13)?,
                created_at: row.get(14)?,
                updated_at: row.get(15)?,
            })
        })?;
        let stored = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        stored.into_iter().map(decode_receipt).collect()
    }

    fn insert_receipt_sync(&self, user: &UserId, row: &ReceiptRow) -> Result<()> {
        let conn = self.conn()?;
        let items = serde_json::to_string(&row.items).context("Failed to encode line items")?;
        conn.execute(
            &format!(
                "INSERT INTO receipts (user_id, {RECEIPT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
            ),
            params![
                user.as_str(),
                row.id,
                row.merchant,
                row.date,
                row.category,
                row.amount.to_string(),
                row.score,
                items,
                row.subtotal.to_string(),
                row.tax.to_string(),
                row.discount.map(|d| d.to_string()),
                row.tip.map(|d| d.to_string()),
                row.payment_method,
                row.image_url,
                row.folder_id,
                row.created_at.to_rfc3339(),
                row.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn update_receipt_sync(&self, user: &UserId, row: &ReceiptRow) -> Result<()> {
        let conn = self.conn()?;
        let items = serde_json::to_string(&row.items).context("Failed to encode line items")?;
        let changed = conn.execute(
            "UPDATE receipts SET merchant = ?1, date = ?2, category = ?3, amount = ?4, score = ?5,
                    items = ?6, subtotal = ?7, tax = ?8, discount = ?9, tip = ?10,
                    payment_method = ?11, image_url = ?12, folder_id = ?13, updated_at = ?14
             WHERE id = ?15 AND user_id = ?16",
            params![
                row.merchant,
                row.date,
                row.category,
                row.amount.to_string(),
                row.score,
                items,
                row.subtotal.to_string(),
                row.tax.to_string(),
                row.discount.map(|d| d.to_string()),
                row.tip.map(|d| d.to_string()),
                row.payment_method,
                row.image_url,
                row.folder_id,
                row.updated_at.to_rfc3339(),
                row.id,
                user.as_str(),
            ],
        )?;
        if changed == 0 {
            bail!("No receipt {} for user {user}", row.id);
        }
        Ok(())
    }

    fn delete_receipt_sync(&self, user: &UserId, id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM receipts WHERE id = ?1 AND user_id = ?2",
            params![id, user.as_str()],
        )?;
        Ok(())
    }

    // ── Categories ────────────────────────────────────────────

    fn load_categories_sync(&self, user: &UserId) -> Result<Vec<CategoryRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, label, color, created_at, updated_at FROM categories
             WHERE user_id = ?1 ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map(params![user.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        let stored = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        stored
            .into_iter()
            .map(|(id, label, color, created_at, updated_at)| {
                Ok(CategoryRow {
                    id,
                    label,
                    color,
                    created_at: parse_timestamp(&created_at)?,
                    updated_at: parse_timestamp(&updated_at)?,
                })
            })
            .collect()
    }

    fn insert_category_sync(&self, user: &UserId, row: &CategoryRow) -> Result<()> {
        self.insert_categories_sync(user, std::slice::from_ref(row))
    }

    fn insert_categories_sync(&self, user: &UserId, rows: &[CategoryRow]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO categories (id, user_id, label, color, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.id,
                    user.as_str(),
                    row.label,
                    row.color,
                    row.created_at.to_rfc3339(),
                    row.updated_at.to_rfc3339(),
                ])
                .with_context(|| format!("Failed to insert category {}", row.id))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn update_category_sync(&self, user: &UserId, row: &CategoryRow) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE categories SET label = ?1, color = ?2, updated_at = ?3
             WHERE id = ?4 AND user_id = ?5",
            params![
                row.label,
                row.color,
                row.updated_at.to_rfc3339(),
                row.id,
                user.as_str(),
            ],
        )?;
        if changed == 0 {
            bail!("No category {} for user {user}", row.id);
        }
        Ok(())
    }

    fn delete_category_cascade_sync(
        &self,
        user: &UserId,
        id: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let exists: Option<String> = tx
            .query_row(
                "SELECT id FROM categories WHERE id = ?1 AND user_id = ?2",
                params![id, user.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            bail!("No category {id} for user {user}");
        }
        let unsorted = tx.execute(
            "UPDATE receipts SET folder_id = NULL, updated_at = ?1
             WHERE folder_id = ?2 AND user_id = ?3",
            params![updated_at.to_rfc3339(), id, user.as_str()],
        )?;
        tx.execute(
            "DELETE FROM categories WHERE id = ?1 AND user_id = ?2",
            params![id, user.as_str()],
        )?;
        tx.commit()?;
        debug!("Deleted category {id}; {unsorted} receipts returned to unsorted");
        Ok(())
    }
}

#[async_trait]
impl ReceiptStore for SqliteStore {
    async fn load_receipts(&self, user: &UserId) -> Result<Vec<ReceiptRow>> {
        self.load_receipts_sync(user)
    }

    async fn load_categories(&self, user: &UserId) -> Result<Vec<CategoryRow>> {
        self.load_categories_sync(user)
    }

    async fn insert_receipt(&self, user: &UserId, row: &ReceiptRow) -> Result<()> {
        self.insert_receipt_sync(user, row)
    }

    async fn update_receipt(&self, user: &UserId, row: &ReceiptRow) -> Result<()> {
        self.update_receipt_sync(user, row)
    }

    async fn delete_receipt(&self, user: &UserId, id: &str) -> Result<()> {
        self.delete_receipt_sync(user, id)
    }

    async fn insert_category(&self, user: &UserId, row: &CategoryRow) -> Result<()> {
        self.insert_category_sync(user, row)
    }

    async fn insert_categories(&self, user: &UserId, rows: &[CategoryRow]) -> Result<()> {
        self.insert_categories_sync(user, rows)
    }

    async fn update_category(&self, user: &UserId, row: &CategoryRow) -> Result<()> {
        self.update_category_sync(user, row)
    }

    async fn delete_category_cascade(
        &self,
        user: &UserId,
        id: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        self.delete_category_cascade_sync(user, id, updated_at)
    }
}

/// Creates the schema on a fresh file (`user_version` 0) and refuses files
/// written by a newer schema version.
fn migrate(conn: &mut Connection) -> Result<()> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version > schema::CURRENT_VERSION {
        bail!(
            "Database schema v{version} is newer than supported v{}",
            schema::CURRENT_VERSION
        );
    }
    if version == 0 {
        let tx = conn.transaction()?;
        tx.execute_batch(schema::SCHEMA_V1)?;
        tx.pragma_update(None, "user_version", schema::CURRENT_VERSION)?;
        tx.commit()?;
        debug!("Created schema v{}", schema::CURRENT_VERSION);
    }
    Ok(())
}

fn decode_receipt(s: StoredReceipt) -> Result<ReceiptRow> {
    let items: Vec<LineItem> = serde_json::from_str(&s.items)
        .with_context(|| format!("Receipt {}: invalid items JSON", s.id))?;
    Ok(ReceiptRow {
        amount: decimal_column(&s.amount, "amount")?,
        subtotal: decimal_column(&s.subtotal, "subtotal")?,
        tax: decimal_column(&s.tax, "tax")?,
        discount: s.discount.as_deref().map(|d| decimal_column(d, "discount")).transpose()?,
        tip: s.tip.as_deref().map(|t| decimal_column(t, "tip")).transpose()?,
        created_at: parse_timestamp(&s.created_at)?,
        updated_at: parse_timestamp(&s.updated_at)?,
        id: s.id,
        merchant: s.merchant,
        date: s.date,
        category: s.category,
        score: s.score,
        items,
        payment_method: s.payment_method,
        image_url: s.image_url,
        folder_id: s.folder_id,
    })
}

fn decimal_column(s: &str, field: &str) -> Result<Decimal> {
    Decimal::from_str(s).with_context(|| format!("Invalid {field} '{s}'"))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp '{s}'"))
}
