//! Folding anonymous cart entries into a user's cart at login

use shared::models::CartEntry;

use crate::BoxError;
use crate::cache::KvStore;

use super::server::UserCart;

/// Merge anonymous `entries` into the cart of `user_id`.
///
/// For every entry the anonymous count replaces the stored one, and a
/// selected entry is added to the selection. Nothing is ever deselected.
/// Each sku is written independently; an error stops the merge part-way and
/// leaves the entries already written in place.
pub async fn merge_into_user_cart(
    kv: &dyn KvStore,
    entries: &[CartEntry],
    user_id: i64,
) -> Result<usize, BoxError> {
    let cart = UserCart::new(kv, user_id);
    for entry in entries {
        cart.absorb(entry).await?;
    }
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryKv;
    use crate::cart::AnonymousCart;

    #[tokio::test]
    async fn test_anonymous_count_wins_selection_only_turns_on() {
        let kv = MemoryKv::new();
        let user_cart = UserCart::new(&kv, 5);
        user_cart.update(1, 5, false).await.unwrap();
        user_cart.update(2, 4, true).await.unwrap();

        let mut anonymous = AnonymousCart::new();
        anonymous.add(1, 3, true);
        anonymous.add(2, 1, false);
        anonymous.add(3, 2, false);

        let merged = merge_into_user_cart(&kv, &anonymous.entries(), 5).await.unwrap();
        assert_eq!(merged, 3);

        assert_eq!(
            user_cart.entries().await.unwrap(),
            vec![
                CartEntry { sku_id: 1, count: 3, selected: true },
                CartEntry { sku_id: 2, count: 1, selected: true },
                CartEntry { sku_id: 3, count: 2, selected: false },
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_anonymous_cart_changes_nothing() {
        let kv = MemoryKv::new();
        let user_cart = UserCart::new(&kv, 5);
        user_cart.add(1, 2, true).await.unwrap();

        let merged = merge_into_user_cart(&kv, &[], 5)
            .await
            .unwrap();
        assert_eq!(merged, 0);
        assert_eq!(
            user_cart.entries().await.unwrap(),
            vec![CartEntry { sku_id: 1, count: 2, selected: true }]
        );
    }
}
