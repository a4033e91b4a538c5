use rideshare_core::{StoreError, StoreResult};
use tracing::debug;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter per client; `true` while the client is under `limit`.
    pub async fn check_rate_limit(&self, client_key: &str, limit: i64, window_seconds: i64) -> StoreResult<bool> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(StoreError::backend)?;
        let key = rate_limit_key(client_key);

        let (count,): (i64,) = window_counter(&key, window_seconds)
            .query_async(&mut conn)
            .await
            .map_err(StoreError::backend)?;

        debug!(key = %key, count, limit, "Rate limit check");
        Ok(count <= limit)
    }
}

fn rate_limit_key(client_key: &str) -> String {
    format!("ratelimit:{}", client_key)
}

/// Opens the window only when the key does not exist yet, then counts the request.
/// Later requests in the same window leave the expiry alone, so the counter resets
/// `window_seconds` after the first request no matter how steady the traffic is.
fn window_counter(key: &str, window_seconds: i64) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("SET")
        .arg(key)
        .arg(0)
        .arg("EX")
        .arg(window_seconds)
        .arg("NX")
        .ignore()
        .incr(key, 1);
    pipe
}
