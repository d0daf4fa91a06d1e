//! Store catalogue rows.

use super::{ts, Database};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::warn;
use wenwen_shared::{Approval, Store, StoreFeatures};

const STORE_COLUMNS: &str = "id, name, category, subcategory, address, phone, business_hours, \
     features, is_trusted, has_discount, is_partner, rating, approval";

/// Build a store from a row. `features` and `approval` are validated here,
/// once; bad values are logged and replaced by empty features / pending.
fn store_from_row(row: &Row) -> rusqlite::Result<Store> {
    let id: i64 = row.get(0)?;
    let raw_features: Option<String> = row.get(7)?;
    let features = match StoreFeatures::parse(raw_features.as_deref().unwrap_or("")) {
        Ok(features) => features,
        Err(e) => {
            warn!("Store {} has malformed features, treating as empty: {}", id, e);
            StoreFeatures::default()
        }
    };
    let raw_approval: String = row.get(12)?;
    let approval = raw_approval.parse::<Approval>().unwrap_or_else(|e| {
        warn!("Store {} has unknown approval state: {}", id, e);
        Approval::Pending
    });

    Ok(Store {
        id,
        name: row.get(1)?,
        category: row.get(2)?,
        subcategory: row.get(3)?,
        address: row.get(4)?,
        phone: row.get(5)?,
        business_hours: row.get(6)?,
        features,
        is_trusted: row.get(8)?,
        has_discount: row.get(9)?,
        is_partner: row.get(10)?,
        rating: row.get(11)?,
        approval,
    })
}

impl Database {
    /// Every store, any approval state, by id
    pub fn list_stores(&self) -> Result<Vec<Store>> {
        self.query_stores(&format!("SELECT {} FROM stores ORDER BY id", STORE_COLUMNS))
    }

    /// Stores the bot is allowed to recommend
    pub fn approved_stores(&self) -> Result<Vec<Store>> {
        self.query_stores(&format!(
            "SELECT {} FROM stores WHERE approval = 'approved' ORDER BY id",
            STORE_COLUMNS
        ))
    }

    fn query_stores(&self, sql: &str) -> Result<Vec<Store>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(sql)?;
        let stores = stmt
            .query_map([], store_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read stores")?;
        Ok(stores)
    }

    pub fn get_store(&self, id: i64) -> Result<Option<Store>> {
        let conn = self.lock();
        let store = conn
            .query_row(
                &format!("SELECT {} FROM stores WHERE id = ?1", STORE_COLUMNS),
                params![id],
                store_from_row,
            )
            .optional()?;
        Ok(store)
    }

    /// Insert a new store; `store.id` is ignored. Returns the new id.
    pub fn insert_store(&self, store: &Store) -> Result<i64> {
        let features = store.features.to_json()?;
        let now = ts(Utc::now());
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO stores (name, category, subcategory, address, phone, business_hours,
                features, is_trusted, has_discount, is_partner, rating, approval,
                created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
            "#,
            params![
                &store.name,
                &store.category,
                &store.subcategory,
                &store.address,
                &store.phone,
                &store.business_hours,
                features,
                store.is_trusted,
                store.has_discount,
                store.is_partner,
                store.rating,
                store.approval.as_str(),
                now,
            ],
        )
        .with_context(|| format!("Failed to insert store {}", store.name))?;
        Ok(conn.last_insert_rowid())
    }

    /// Update every column of an existing store. False when the id is unknown.
    pub fn update_store(&self, store: &Store) -> Result<bool> {
        let features = store.features.to_json()?;
        let conn = self.lock();
        let changed = conn.execute(
            r#"
            UPDATE stores SET
                name = ?2, category = ?3, subcategory = ?4, address = ?5, phone = ?6,
                business_hours = ?7, features = ?8, is_trusted = ?9, has_discount = ?10,
                is_partner = ?11, rating = ?12, approval = ?13, updated_at = ?14
            WHERE id = ?1
            "#,
            params![
                store.id,
                &store.name,
                &store.category,
                &store.subcategory,
                &store.address,
                &store.phone,
                &store.business_hours,
                features,
                store.is_trusted,
                store.has_discount,
                store.is_partner,
                store.rating,
                store.approval.as_str(),
                ts(Utc::now()),
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn set_store_approval(&self, id: i64, approval: Approval) -> Result<bool> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE stores SET approval = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, approval.as_str(), ts(Utc::now())],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_store(&self, id: i64) -> Result<bool> {
        let conn = self.lock();
        let changed = conn.execute("DELETE FROM stores WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}
