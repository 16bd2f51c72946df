//! Rate limiting middleware

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::endpoint::{BoxEndpoint, Endpoint, RequestScope};
use crate::error::AppError;

/// Token bucket holding up to `burst` tokens and regaining one every
/// `interval`. Callers that find it empty are rejected, never queued.
pub struct RateLimiter {
    state: Mutex<Bucket>,
    burst: u32,
    interval: Duration,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            state: Mutex::new(Bucket {
                tokens: config.burst as f64,
                last_refill: Instant::now(),
            }),
            burst: config.burst,
            interval: config.interval(),
        }
    }

    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut bucket = self.state.lock();
        self.refill(&mut bucket, now);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn available(&self) -> u32 {
        let mut bucket = self.state.lock();
        self.refill(&mut bucket, Instant::now());
        bucket.tokens as u32
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.duration_since(bucket.last_refill);
        bucket.last_refill = now;

        if self.interval.is_zero() {
            bucket.tokens = self.burst as f64;
            return;
        }

        let regained = elapsed.as_secs_f64() / self.interval.as_secs_f64();
        bucket.tokens = (bucket.tokens + regained).min(self.burst as f64);
    }
}

pub struct RateLimitEndpoint<Req, Resp> {
    limiter: Arc<RateLimiter>,
    inner: BoxEndpoint<Req, Resp>,
}

impl<Req, Resp> RateLimitEndpoint<Req, Resp> {
    pub fn new(limiter: Arc<RateLimiter>, inner: BoxEndpoint<Req, Resp>) -> Self {
        Self { limiter, inner }
    }
}

#[async_trait]
impl<Req, Resp> Endpoint<Req, Resp> for RateLimitEndpoint<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn call(&self, scope: RequestScope, request: Req) -> Result<Resp, AppError> {
        if !self.limiter.try_acquire() {
            tracing::warn!(subject = %scope.identity.subject, "rate limit exceeded");
            return Err(AppError::RateLimited);
        }
        self.inner.call(scope, request).await
    }
}
