//! Cart Store
//!
//! One contract over two representations: the anonymous cart lives in a
//! client-held cookie token, the authenticated cart in the key-value cache.
//! [`CartService`] validates input against the catalog before any write and
//! enriches reads with current SKU data without touching cart state.

pub mod cookie;
pub mod merge;
pub mod server;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use shared::error::{AppError, ErrorCode};
use shared::models::{CartEntry, CartItemView, Sku};

use crate::cache::KvStore;
use crate::db::Store;
use crate::error::ServiceResult;

pub use cookie::{AnonymousCart, CartCookie};
pub use server::UserCart;

/// Largest count a single cart entry may hold
pub const MAX_ENTRY_COUNT: i64 = 999;

fn count_error(sku_id: i64, count: i64) -> AppError {
    AppError::new(ErrorCode::CartCountInvalid)
        .with_detail("sku_id", sku_id)
        .with_detail("value", count)
        .with_detail("max", MAX_ENTRY_COUNT)
}

/// Which cart an operation applies to
pub enum CartRef<'a> {
    User(i64),
    Anonymous(&'a mut AnonymousCart),
}

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
    kv: Arc<dyn KvStore>,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>, kv: Arc<dyn KvStore>) -> Self {
        Self { store, kv }
    }

    pub fn user_cart(&self, user_id: i64) -> UserCart<'_> {
        UserCart::new(self.kv.as_ref(), user_id)
    }

    /// Reject counts outside `1..=MAX_ENTRY_COUNT` and skus that are missing
    /// or off sale
    async fn ensure_purchasable(&self, sku_id: i64, count: i64) -> ServiceResult<Sku> {
        if !(1..=MAX_ENTRY_COUNT).contains(&count) {
            return Err(count_error(sku_id, count).into());
        }
        let sku = self
            .store
            .find_sku(sku_id)
            .await?
            .ok_or_else(|| AppError::sku_not_found(sku_id))?;
        if !sku.is_launched {
            return Err(AppError::new(ErrorCode::SkuUnavailable)
                .with_detail("sku_id", sku_id)
                .into());
        }
        Ok(sku)
    }

    /// Add to the cart; an existing entry's count is incremented.
    ///
    /// Fails with `CartCountInvalid` when the entry would exceed
    /// [`MAX_ENTRY_COUNT`]; the cart is left as it was.
    pub async fn add(
        &self,
        cart: CartRef<'_>,
        sku_id: i64,
        count: i64,
        selected: bool,
    ) -> ServiceResult<()> {
        self.ensure_purchasable(sku_id, count).await?;
        let added = match cart {
            CartRef::User(user_id) => self.user_cart(user_id).add(sku_id, count, selected).await?,
            CartRef::Anonymous(anonymous) => anonymous.add(sku_id, count, selected),
        };
        if !added {
            return Err(count_error(sku_id, count).into());
        }
        Ok(())
    }

    /// Replace count and selection of an entry.
    ///
    /// An anonymous cart only rewrites an entry it already holds.
    pub async fn update(
        &self,
        cart: CartRef<'_>,
        sku_id: i64,
        count: i64,
        selected: bool,
    ) -> ServiceResult<()> {
        self.ensure_purchasable(sku_id, count).await?;
        match cart {
            CartRef::User(user_id) => {
                self.user_cart(user_id)
                    .update(sku_id, count, selected)
                    .await?
            }
            CartRef::Anonymous(anonymous) => {
                if !anonymous.update(sku_id, count, selected) {
                    tracing::debug!(sku_id, "Update skipped, sku not in anonymous cart");
                }
            }
        }
        Ok(())
    }

    pub async fn remove(&self, cart: CartRef<'_>, sku_id: i64) -> ServiceResult<()> {
        match cart {
            CartRef::User(user_id) => self.user_cart(user_id).remove(&[sku_id]).await?,
            CartRef::Anonymous(anonymous) => {
                anonymous.remove(sku_id);
            }
        }
        Ok(())
    }

    pub async fn set_all_selected(&self, cart: CartRef<'_>, selected: bool) -> ServiceResult<()> {
        match cart {
            CartRef::User(user_id) => self.user_cart(user_id).set_all_selected(selected).await?,
            CartRef::Anonymous(anonymous) => anonymous.set_all_selected(selected),
        }
        Ok(())
    }

    /// Entries enriched with current SKU display data, ordered by sku id.
    ///
    /// Entries whose SKU no longer exists are left out of the view but stay
    /// in the cart.
    pub async fn read(&self, cart: CartRef<'_>) -> ServiceResult<Vec<CartItemView>> {
        let entries = match cart {
            CartRef::User(user_id) => self.user_cart(user_id).entries().await?,
            CartRef::Anonymous(anonymous) => anonymous.entries(),
        };
        self.enrich(&entries).await
    }

    pub async fn enrich(&self, entries: &[CartEntry]) -> ServiceResult<Vec<CartItemView>> {
        let sku_ids: Vec<i64> = entries.iter().map(|e| e.sku_id).collect();
        let skus: HashMap<i64, Sku> = self
            .store
            .find_skus(&sku_ids)
            .await?
            .into_iter()
            .map(|sku| (sku.id, sku))
            .collect();

        Ok(entries
            .iter()
            .filter_map(|e| {
                skus.get(&e.sku_id)
                    .map(|sku| CartItemView::new(sku, e.count, e.selected))
            })
            .collect())
    }

    /// Fold the anonymous cart into the user's cart.
    ///
    /// The cookie is client-held, so entries whose sku is missing or off sale
    /// are dropped instead of being written. Returns `false` when there was
    /// nothing to merge because the request carried no cart cookie.
    pub async fn merge(&self, anonymous: Option<&AnonymousCart>, user_id: i64) -> ServiceResult<bool> {
        let Some(anonymous) = anonymous else {
            return Ok(false);
        };

        let entries = anonymous.entries();
        let sku_ids: Vec<i64> = entries.iter().map(|e| e.sku_id).collect();
        let on_sale: HashSet<i64> = self
            .store
            .find_skus(&sku_ids)
            .await?
            .into_iter()
            .filter(|sku| sku.is_launched)
            .map(|sku| sku.id)
            .collect();
        let (kept, dropped): (Vec<CartEntry>, Vec<CartEntry>) = entries
            .into_iter()
            .partition(|e| on_sale.contains(&e.sku_id));
        for entry in &dropped {
            tracing::warn!(user_id, sku_id = entry.sku_id, "Skipping unavailable sku in anonymous cart");
        }

        let merged = merge::merge_into_user_cart(self.kv.as_ref(), &kept, user_id).await?;
        tracing::info!(user_id, merged, skipped = dropped.len(), "Anonymous cart merged");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryKv;
    use crate::db::MemoryStore;
    use rust_decimal::Decimal;

    fn service() -> (CartService, MemoryStore, Sku) {
        let store = MemoryStore::new();
        let goods = store.insert_goods("Tea");
        let sku = store.insert_sku(goods, "Green tea", Decimal::new(1250, 2), 10);
        let service = CartService::new(Arc::new(store.clone()), Arc::new(MemoryKv::new()));
        (service, store, sku)
    }

    #[tokio::test]
    async fn test_update_then_read_user_cart() {
        let (service, _, sku) = service();
        service
            .update(CartRef::User(1), sku.id, 2, true)
            .await
            .unwrap();

        let items = service.read(CartRef::User(1)).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, sku.id);
        assert_eq!(items[0].count, 2);
        assert!(items[0].selected);
        assert_eq!(items[0].price, Decimal::new(1250, 2));
    }

    #[tokio::test]
    async fn test_update_then_read_anonymous_cart() {
        let (service, _, sku) = service();
        let mut cart = AnonymousCart::new();
        service
            .add(CartRef::Anonymous(&mut cart), sku.id, 1, false)
            .await
            .unwrap();
        service
            .update(CartRef::Anonymous(&mut cart), sku.id, 2, true)
            .await
            .unwrap();

        // The token must survive the cookie round trip
        let mut cart = AnonymousCart::decode(&cart.encode()).unwrap();
        let items = service.read(CartRef::Anonymous(&mut cart)).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, sku.id);
        assert_eq!(items[0].count, 2);
        assert!(items[0].selected);
    }

    #[tokio::test]
    async fn test_validation_happens_before_write() {
        let (service, store, sku) = service();

        let err = service
            .add(CartRef::User(1), sku.id, 0, true)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::ServiceError::App(ref e) if e.code == ErrorCode::CartCountInvalid));

        let err = service
            .add(CartRef::User(1), 4242, 1, true)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::ServiceError::App(ref e) if e.code == ErrorCode::SkuNotFound));

        store.set_launched(sku.id, false);
        let err = service
            .add(CartRef::User(1), sku.id, 1, true)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::ServiceError::App(ref e) if e.code == ErrorCode::SkuUnavailable));

        assert!(service.read(CartRef::User(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_does_not_mutate() {
        let (service, _, sku) = service();
        service.add(CartRef::User(1), sku.id, 3, true).await.unwrap();
        service.add(CartRef::User(1), 777, 1, true).await.ok();

        let first = service.read(CartRef::User(1)).await.unwrap();
        let second = service.read(CartRef::User(1)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(service.user_cart(1).entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_select_all_and_remove() {
        let (service, store, sku) = service();
        let other = store.insert_sku(sku.goods_id, "Black tea", Decimal::new(900, 2), 5);
        service.add(CartRef::User(1), sku.id, 1, false).await.unwrap();
        service.add(CartRef::User(1), other.id, 1, false).await.unwrap();

        service.set_all_selected(CartRef::User(1), true).await.unwrap();
        let items = service.read(CartRef::User(1)).await.unwrap();
        assert!(items.iter().all(|i| i.selected));

        service.remove(CartRef::User(1), sku.id).await.unwrap();
        let items = service.read(CartRef::User(1)).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, other.id);
    }

    #[tokio::test]
    async fn test_merge_without_cookie_is_noop() {
        let (service, _, sku) = service();
        service.add(CartRef::User(1), sku.id, 5, false).await.unwrap();

        assert!(!service.merge(None, 1).await.unwrap());
        let entries = service.user_cart(1).entries().await.unwrap();
        assert_eq!(entries, vec![CartEntry { sku_id: sku.id, count: 5, selected: false }]);
    }

    #[tokio::test]
    async fn test_count_limit_applies_to_both_carts() {
        let (service, _, sku) = service();
        let is_count_error = |err: crate::error::ServiceError| {
            matches!(err, crate::error::ServiceError::App(ref e) if e.code == ErrorCode::CartCountInvalid)
        };

        service
            .add(CartRef::User(1), sku.id, MAX_ENTRY_COUNT, true)
            .await
            .unwrap();
        let err = service.add(CartRef::User(1), sku.id, 1, true).await.unwrap_err();
        assert!(is_count_error(err));
        let err = service
            .add(CartRef::User(1), sku.id, i64::MAX, true)
            .await
            .unwrap_err();
        assert!(is_count_error(err));
        assert_eq!(
            service.user_cart(1).entries().await.unwrap(),
            vec![CartEntry { sku_id: sku.id, count: MAX_ENTRY_COUNT, selected: true }]
        );

        let mut cart = AnonymousCart::new();
        service
            .add(CartRef::Anonymous(&mut cart), sku.id, MAX_ENTRY_COUNT, true)
            .await
            .unwrap();
        let err = service
            .add(CartRef::Anonymous(&mut cart), sku.id, 1, true)
            .await
            .unwrap_err();
        assert!(is_count_error(err));
        assert_eq!(cart.entries()[0].count, MAX_ENTRY_COUNT);

        let err = service
            .update(CartRef::User(1), sku.id, MAX_ENTRY_COUNT + 1, true)
            .await
            .unwrap_err();
        assert!(is_count_error(err));
    }

    #[tokio::test]
    async fn test_merge_skips_unknown_and_off_sale_skus() {
        let (service, store, sku) = service();
        let retired = store.insert_sku(sku.goods_id, "Old tea", Decimal::new(500, 2), 5);
        store.set_launched(retired.id, false);

        let mut anonymous = AnonymousCart::new();
        anonymous.add(sku.id, 2, true);
        anonymous.add(retired.id, 1, true);
        anonymous.add(999_999, 1, true);
        assert!(service.merge(Some(&anonymous), 1).await.unwrap());

        let entries = service.user_cart(1).entries().await.unwrap();
        assert_eq!(entries, vec![CartEntry { sku_id: sku.id, count: 2, selected: true }]);
    }

    #[tokio::test]
    async fn test_merge_overwrites_count_and_selects() {
        let (service, _, sku) = service();
        service.update(CartRef::User(1), sku.id, 5, false).await.unwrap();

        let mut anonymous = AnonymousCart::new();
        anonymous.add(sku.id, 3, true);
        assert!(service.merge(Some(&anonymous), 1).await.unwrap());

        let entries = service.user_cart(1).entries().await.unwrap();
        assert_eq!(entries, vec![CartEntry { sku_id: sku.id, count: 3, selected: true }]);
    }
}
