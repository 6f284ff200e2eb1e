//! Purpose: Recently-viewed product ids kept in plain preference storage.
//! Exports: `RecentlyViewed`, `RECENT_VIEW_KEY`, `RECENT_VIEW_MAX`.
//! Role: Personalization input for the home listing request.
//! Invariants: At most `RECENT_VIEW_MAX` ids are stored; once full, new views are ignored.
#![allow(clippy::result_large_err)]

use crate::core::error::{Error, ErrorKind};
use crate::core::storage::KeyValueStorage;
use std::sync::Arc;

pub const RECENT_VIEW_KEY: &str = "recent_view";
pub const RECENT_VIEW_MAX: usize = 3;

#[derive(Clone)]
pub struct RecentlyViewed {
    storage: Arc<dyn KeyValueStorage>,
}

impl RecentlyViewed {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    pub fn list(&self) -> Result<Vec<String>, Error> {
        let Some(raw) = self.storage.load(RECENT_VIEW_KEY)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message("recently viewed list is not a json array of ids")
                .with_source(err)
        })
    }

    /// Returns whether the id was stored.
    pub fn record(&self, product_id: &str) -> Result<bool, Error> {
        let mut ids = match self.list() {
            Ok(ids) => ids,
            Err(err) if err.kind() == ErrorKind::Corrupt => {
                tracing::warn!(error = %err, "resetting unreadable recently viewed list");
                Vec::new()
            }
            Err(err) => return Err(err),
        };
        if ids.len() >= RECENT_VIEW_MAX {
            return Ok(false);
        }
        ids.push(product_id.to_string());
        let json = serde_json::to_string(&ids).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode recently viewed list")
                .with_source(err)
        })?;
        self.storage.store(RECENT_VIEW_KEY, &json)?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<(), Error> {
        self.storage.remove(RECENT_VIEW_KEY)
    }

    /// Comma-joined ids for the `recent_view` query parameter; empty when none.
    pub fn as_query(&self) -> Result<String, Error> {
        Ok(self.list()?.join(","))
    }
}
