//! Application state for mall-server

use std::sync::Arc;

use crate::BoxError;
use crate::auth::{JwtConfig, JwtService};
use crate::cache::{KvStore, MemoryKv, RedisKv};
use crate::cart::CartService;
use crate::config::Config;
use crate::db::{MemoryStore, PgStore, Store};
use crate::inventory::InventoryLedger;
use crate::oauth::QqClient;
use crate::orders::OrderAssembler;
use crate::tasks::TaskQueue;
use crate::verification::SmsCodeService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Relational store (PostgreSQL, or in-memory in development)
    pub store: Arc<dyn Store>,
    pub jwt: JwtService,
    pub carts: CartService,
    pub orders: OrderAssembler,
    pub sms: SmsCodeService,
    pub qq: QqClient,
}

impl AppState {
    /// Wire every component from its backing stores
    pub fn build(
        config: Config,
        store: Arc<dyn Store>,
        kv: Arc<dyn KvStore>,
        queue: TaskQueue,
    ) -> Self {
        let jwt = JwtService::with_config(JwtConfig::new(
            config.jwt_secret.clone(),
            config.jwt_expiration_minutes,
            config.oauth_token_ttl_secs,
        ));
        let carts = CartService::new(store.clone(), kv.clone());
        let ledger = InventoryLedger::new(store.clone(), config.stock_deduct_max_attempts);
        let orders = OrderAssembler::new(store.clone(), carts.clone(), ledger, config.order_freight);
        let sms = SmsCodeService::new(
            kv,
            queue,
            config.sms_code_ttl_secs,
            config.sms_send_interval_secs,
        );
        let qq = QqClient::new(
            config.qq_client_id.clone(),
            config.qq_client_secret.clone(),
            config.qq_redirect_uri.clone(),
        );

        Self {
            config: Arc::new(config),
            store,
            jwt,
            carts,
            orders,
            sms,
            qq,
        }
    }

    /// Connect to PostgreSQL and Redis, falling back to in-memory stores in
    /// development when a URL is not configured
    pub async fn connect(config: Config, queue: TaskQueue) -> Result<Self, BoxError> {
        let store: Arc<dyn Store> = match &config.database_url {
            Some(url) => {
                let store = PgStore::connect(url).await?;
                tracing::info!("Connected to PostgreSQL");
                Arc::new(store)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory store with demo catalog");
                Arc::new(MemoryStore::with_demo_catalog())
            }
        };

        let kv: Arc<dyn KvStore> = match &config.redis_url {
            Some(url) => {
                let kv = RedisKv::connect(url).await?;
                tracing::info!("Connected to Redis");
                Arc::new(kv)
            }
            None => {
                tracing::warn!("REDIS_URL not set, using in-memory cache");
                Arc::new(MemoryKv::new())
            }
        };

        Ok(Self::build(config, store, kv, queue))
    }
}
