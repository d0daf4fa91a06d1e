//! Cached read side of the catalogue.
//!
//! Approved stores, coverage stats, active FAQs and quick questions are
//! read on every chat turn but change only through the admin API, so they
//! sit in a [`TtlCache`] owned by the application state. Admin writes call
//! the matching `invalidate_*`.

use crate::db::Database;
use anyhow::{Context, Result};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use wenwen_shared::cache::TtlCache;
use wenwen_shared::content::{Faq, QuickQuestion};
use wenwen_shared::{CoverageStats, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CatalogKey {
    ApprovedStores,
    Coverage,
    ActiveFaqs,
    QuickQuestions,
}

#[derive(Clone)]
enum CatalogEntry {
    Stores(Arc<Vec<Store>>),
    Coverage(CoverageStats),
    Faqs(Arc<Vec<Faq>>),
    QuickQuestions(Arc<Vec<QuickQuestion>>),
}

pub struct Catalog {
    db: Database,
    cache: TtlCache<CatalogKey, CatalogEntry>,
}

impl Catalog {
    pub fn new(db: Database, capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            db,
            cache: TtlCache::new(capacity, ttl),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Cached entry for `key`, loading it on a miss. Load errors are not cached.
    fn cached<T>(
        &self,
        key: CatalogKey,
        load: impl FnOnce() -> Result<CatalogEntry>,
        pick: fn(CatalogEntry) -> Option<T>,
    ) -> Result<T> {
        let entry = self.cache.get_or_try_insert_with(key, load)?;
        pick(entry).with_context(|| format!("Catalogue entry {:?} holds the wrong kind of value", key))
    }

    /// Approved store snapshot used for retrieval
    pub fn stores(&self) -> Result<Arc<Vec<Store>>> {
        self.cached(
            CatalogKey::ApprovedStores,
            || {
                let stores = self.db.approved_stores()?;
                debug!("Loaded {} approved stores", stores.len());
                Ok(CatalogEntry::Stores(Arc::new(stores)))
            },
            |entry| match entry {
                CatalogEntry::Stores(stores) => Some(stores),
                _ => None,
            },
        )
    }

    pub fn coverage(&self) -> Result<CoverageStats> {
        self.cached(
            CatalogKey::Coverage,
            || Ok(CatalogEntry::Coverage(CoverageStats::from_stores(&self.stores()?))),
            |entry| match entry {
                CatalogEntry::Coverage(stats) => Some(stats),
                _ => None,
            },
        )
    }

    pub fn faqs(&self) -> Result<Arc<Vec<Faq>>> {
        self.cached(
            CatalogKey::ActiveFaqs,
            || Ok(CatalogEntry::Faqs(Arc::new(self.db.list_faqs(true)?))),
            |entry| match entry {
                CatalogEntry::Faqs(faqs) => Some(faqs),
                _ => None,
            },
        )
    }

    pub fn quick_questions(&self) -> Result<Arc<Vec<QuickQuestion>>> {
        self.cached(
            CatalogKey::QuickQuestions,
            || {
                Ok(CatalogEntry::QuickQuestions(Arc::new(
                    self.db.list_quick_questions(true)?,
                )))
            },
            |entry| match entry {
                CatalogEntry::QuickQuestions(questions) => Some(questions),
                _ => None,
            },
        )
    }

    /// Stores changed: drop the snapshot and the stats derived from it
    pub fn invalidate_stores(&self) {
        self.cache.invalidate(&CatalogKey::ApprovedStores);
        self.cache.invalidate(&CatalogKey::Coverage);
    }

    pub fn invalidate_faqs(&self) {
        self.cache.invalidate(&CatalogKey::ActiveFaqs);
    }

    pub fn invalidate_quick_questions(&self) {
        self.cache.invalidate(&CatalogKey::QuickQuestions);
    }
}
