//! Authenticated cart in the key-value cache
//!
//! Quantities live in `cart_{user_id}` and the selection in
//! `selected_{user_id}`. The two keys are written independently; each write
//! is atomic on its own.

use shared::models::CartEntry;

use super::MAX_ENTRY_COUNT;
use crate::BoxError;
use crate::cache::{KvStore, cart_key, selected_key};

pub struct UserCart<'a> {
    kv: &'a dyn KvStore,
    cart_key: String,
    selected_key: String,
}

impl<'a> UserCart<'a> {
    pub fn new(kv: &'a dyn KvStore, user_id: i64) -> Self {
        Self {
            kv,
            cart_key: cart_key(user_id),
            selected_key: selected_key(user_id),
        }
    }

    /// Increment the count; a `selected` add marks the sku, an unselected
    /// add leaves an existing selection untouched.
    ///
    /// An increment that takes the entry past [`MAX_ENTRY_COUNT`] is undone
    /// and reported as `false`.
    pub async fn add(&self, sku_id: i64, count: i64, selected: bool) -> Result<bool, BoxError> {
        let total = self.kv.hincrby(&self.cart_key, sku_id, count).await?;
        if total > MAX_ENTRY_COUNT {
            let restored = self.kv.hincrby(&self.cart_key, sku_id, -count).await?;
            if restored <= 0 {
                self.kv.hdel(&self.cart_key, &[sku_id]).await?;
            }
            return Ok(false);
        }
        if selected {
            self.kv.sadd(&self.selected_key, &[sku_id]).await?;
        }
        Ok(true)
    }

    /// Overwrite count and selection
    pub async fn update(&self, sku_id: i64, count: i64, selected: bool) -> Result<(), BoxError> {
        self.kv.hset(&self.cart_key, sku_id, count).await?;
        self.set_selected(&[sku_id], selected).await
    }

    pub async fn remove(&self, sku_ids: &[i64]) -> Result<(), BoxError> {
        self.kv.hdel(&self.cart_key, sku_ids).await?;
        self.kv.srem(&self.selected_key, sku_ids).await
    }

    pub async fn set_all_selected(&self, selected: bool) -> Result<(), BoxError> {
        let sku_ids: Vec<i64> = self.kv.hgetall(&self.cart_key).await?.into_keys().collect();
        self.set_selected(&sku_ids, selected).await
    }

    async fn set_selected(&self, sku_ids: &[i64], selected: bool) -> Result<(), BoxError> {
        if selected {
            self.kv.sadd(&self.selected_key, sku_ids).await
        } else {
            self.kv.srem(&self.selected_key, sku_ids).await
        }
    }

    /// All entries, ordered by sku id
    pub async fn entries(&self) -> Result<Vec<CartEntry>, BoxError> {
        let counts = self.kv.hgetall(&self.cart_key).await?;
        let selected = self.kv.smembers(&self.selected_key).await?;
        let mut entries: Vec<CartEntry> = counts
            .into_iter()
            .map(|(sku_id, count)| CartEntry {
                sku_id,
                count,
                selected: selected.contains(&sku_id),
            })
            .collect();
        entries.sort_by_key(|e| e.sku_id);
        Ok(entries)
    }

    /// Entries that are both counted and selected
    pub async fn selected_entries(&self) -> Result<Vec<CartEntry>, BoxError> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .filter(|e| e.selected)
            .collect())
    }

    /// Write one merged entry: count replaced, selection only ever switched on
    pub async fn absorb(&self, entry: &CartEntry) -> Result<(), BoxError> {
        self.kv.hset(&self.cart_key, entry.sku_id, entry.count).await?;
        if entry.selected {
            self.kv.sadd(&self.selected_key, &[entry.sku_id]).await?;
        }
        Ok(())
    }
}
