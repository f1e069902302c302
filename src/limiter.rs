//! Cancellable token-bucket rate limiting, shared by the scrapers and the
//! AI client.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::AppError;

/// Token bucket granting `rpm` permits per minute. Waiting is cancellable.
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn per_minute(rpm: u32) -> Self {
        let capacity = rpm.max(1) as f64;
        Self {
            capacity,
            refill_per_sec: capacity / 60.0,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Takes one permit, sleeping until one is available or `ctx` fires.
    pub async fn acquire(&self, ctx: &CancellationToken) -> Result<(), AppError> {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let elapsed = state.last_refill.elapsed().as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
                state.last_refill = Instant::now();

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_sec)
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = ctx.cancelled() => return Err(AppError::Cancelled),
            }
        }
    }
}
