//! Anonymous cart carried in the `cart` cookie
//!
//! Token format: URL-safe base64 (no padding) of a JSON object mapping sku id
//! to `{"count": n, "selected": bool}`. Every mutation rewrites the whole token.

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::extract::FromRequestParts;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use http::header::{COOKIE, InvalidHeaderValue};
use http::request::Parts;
use http::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use shared::models::CartEntry;
use thiserror::Error;

use super::MAX_ENTRY_COUNT;

pub const CART_COOKIE: &str = "cart";

#[derive(Debug, Error)]
pub enum CookieError {
    #[error("cart token is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("cart token payload is malformed: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("cart entry for sku {0} has a count out of range")]
    Count(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Stored {
    count: i64,
    selected: bool,
}

/// Cart of a visitor who has not logged in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnonymousCart {
    entries: BTreeMap<i64, Stored>,
}

impl AnonymousCart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(token: &str) -> Result<Self, CookieError> {
        let bytes = URL_SAFE_NO_PAD.decode(token.trim())?;
        let entries: BTreeMap<i64, Stored> = serde_json::from_slice(&bytes)?;
        if let Some((sku_id, _)) = entries
            .iter()
            .find(|(_, e)| !(1..=MAX_ENTRY_COUNT).contains(&e.count))
        {
            return Err(CookieError::Count(*sku_id));
        }
        Ok(Self { entries })
    }

    /// Decode, treating a malformed token as an empty cart
    pub fn decode_lossy(token: &str) -> Self {
        Self::decode(token).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Discarding malformed cart cookie");
            Self::default()
        })
    }

    pub fn encode(&self) -> String {
        // A map of integers and booleans always serializes
        let json = serde_json::to_vec(&self.entries).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Add `count` to the entry (creating it) and overwrite its selection.
    ///
    /// Returns `false` and leaves the cart untouched when the new count would
    /// exceed [`MAX_ENTRY_COUNT`].
    pub fn add(&mut self, sku_id: i64, count: i64, selected: bool) -> bool {
        let current = self.entries.get(&sku_id).map_or(0, |e| e.count);
        match current.checked_add(count) {
            Some(total) if total <= MAX_ENTRY_COUNT => {
                self.entries.insert(sku_id, Stored { count: total, selected });
                true
            }
            _ => false,
        }
    }

    /// Overwrite count and selection of an existing entry; `false` when absent
    pub fn update(&mut self, sku_id: i64, count: i64, selected: bool) -> bool {
        match self.entries.get_mut(&sku_id) {
            Some(entry) => {
                *entry = Stored { count, selected };
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, sku_id: i64) -> bool {
        self.entries.remove(&sku_id).is_some()
    }

    pub fn set_all_selected(&mut self, selected: bool) {
        for entry in self.entries.values_mut() {
            entry.selected = selected;
        }
    }

    pub fn entries(&self) -> Vec<CartEntry> {
        self.entries
            .iter()
            .map(|(&sku_id, e)| CartEntry {
                sku_id,
                count: e.count,
                selected: e.selected,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Raw value of the `cart` cookie, if the request carries one
pub fn read_cart_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == CART_COOKIE)
        .map(|(_, value)| value.trim_matches('"').to_string())
}

/// `Set-Cookie` value persisting `cart`
pub fn cart_cookie(cart: &AnonymousCart, max_age_secs: i64) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{CART_COOKIE}={}; Max-Age={max_age_secs}; Path=/; HttpOnly; SameSite=Lax",
        cart.encode()
    ))
}

/// `Set-Cookie` value deleting the cart cookie
pub fn clear_cart_cookie() -> HeaderValue {
    HeaderValue::from_static("cart=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax")
}

/// Anonymous cart sent with the request
///
/// `None` when no cookie is present; a malformed cookie yields an empty cart.
#[derive(Debug, Clone, Default)]
pub struct CartCookie(pub Option<AnonymousCart>);

impl CartCookie {
    /// The carried cart, or a fresh one
    pub fn into_cart(self) -> AnonymousCart {
        self.0.unwrap_or_default()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CartCookie {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CartCookie(
            read_cart_cookie(&parts.headers).map(|token| AnonymousCart::decode_lossy(&token)),
        ))
    }
}
