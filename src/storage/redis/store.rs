//! Sorted-set window store shared between instances

use super::pool::RedisPool;
use super::script::{ACQUIRE_SCRIPT, KeyLayout};
use crate::config::RedisConfig;
use crate::core::window::{WindowDecision, WindowKind, WindowSpec, WindowUsage};
use crate::storage::backend::{StorageBackend, WindowKey, WindowStore};
use crate::utils::error::{Result, ServiceError};
use async_trait::async_trait;
use redis::{AsyncCommands, Script};
use tracing::debug;

/// Windows kept as Redis sorted sets scored by millisecond timestamp
#[derive(Debug)]
pub struct RedisWindowStore {
    pool: RedisPool,
    layout: KeyLayout,
    script: Script,
}

impl RedisWindowStore {
    pub fn new(pool: RedisPool, key_prefix: impl Into<String>) -> Self {
        Self {
            pool,
            layout: KeyLayout::new(key_prefix),
            script: Script::new(ACQUIRE_SCRIPT),
        }
    }

    pub async fn connect(config: &RedisConfig, key_prefix: &str) -> Result<Self> {
        let pool = RedisPool::connect(config).await?;
        Ok(Self::new(pool, key_prefix))
    }

    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }
}

/// Turn the script reply into a decision for the windows that were sent
fn parse_reply(windows: &[WindowSpec], reply: &[i64]) -> Result<WindowDecision> {
    let malformed =
        || ServiceError::internal(format!("Malformed window script reply: {:?}", reply));

    let (status, pairs) = reply.split_first().ok_or_else(malformed)?;
    if pairs.len() % 2 != 0 || pairs.len() / 2 > windows.len() {
        return Err(malformed());
    }

    let usage: Vec<WindowUsage> = windows
        .iter()
        .zip(pairs.chunks_exact(2))
        .map(|(spec, pair)| WindowUsage {
            kind: spec.kind,
            limit: spec.limit,
            count: pair[0].max(0) as u64,
            oldest_millis: (pair[1] >= 0).then_some(pair[1] as u64),
        })
        .collect();

    let decision = WindowDecision::from_usage(usage);
    let admitted = *status == 1;
    if admitted != decision.is_admitted() {
        return Err(malformed());
    }
    if admitted && pairs.len() / 2 != windows.len() {
        return Err(malformed());
    }
    Ok(decision)
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    async fn acquire(
        &self,
        key: &WindowKey,
        windows: &[WindowSpec],
        now_millis: u64,
        record: bool,
    ) -> Result<WindowDecision> {
        if windows.is_empty() {
            return Ok(WindowDecision::Admitted { usage: Vec::new() });
        }

        let member = format!("{}-{}", now_millis, uuid::Uuid::new_v4());
        let mut invocation = self.script.prepare_invoke();
        for spec in windows {
            invocation.key(self.layout.window_key(key, spec.kind));
        }
        invocation.key(self.layout.endpoint_index(&key.identity));
        invocation
            .arg(now_millis)
            .arg(if record { 1 } else { 0 })
            .arg(&member)
            .arg(&key.endpoint);
        for spec in windows {
            invocation.arg(spec.kind.duration_millis()).arg(spec.limit);
        }

        let mut conn = self.pool.connection();
        let reply: Vec<i64> = invocation.invoke_async(&mut conn).await?;
        let decision = parse_reply(windows, &reply)?;

        debug!("Redis window decision for {}: admitted={}", key, decision.is_admitted());
        Ok(decision)
    }

    async fn clear(&self, identity: &str) -> Result<usize> {
        let index = self.layout.endpoint_index(identity);
        let mut conn = self.pool.connection();

        let endpoints: Vec<String> = conn.smembers(&index).await?;
        let mut keys: Vec<String> = endpoints
            .iter()
            .flat_map(|endpoint| {
                let key = WindowKey::new(identity, endpoint.as_str());
                WindowKind::ALL
                    .into_iter()
                    .map(move |kind| self.layout.window_key(&key, kind))
            })
            .collect();
        keys.push(index);

        let _: () = conn.del(keys).await?;
        Ok(endpoints.len())
    }

    async fn tracked_keys(&self) -> Result<usize> {
        let pattern = self.layout.index_pattern();
        let mut conn = self.pool.connection();

        let mut indexes = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await?;
            indexes.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        let mut total = 0;
        for index in indexes {
            let members: usize = conn.scard(&index).await?;
            total += members;
        }
        Ok(total)
    }

    async fn ping(&self) -> Result<()> {
        self.pool.health_check().await
    }

    async fn cleanup(&self, _now_millis: u64) -> Result<usize> {
        // keys carry their own TTL
        Ok(0)
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Redis
    }

    fn distributed_available(&self) -> bool {
        true
    }
}
