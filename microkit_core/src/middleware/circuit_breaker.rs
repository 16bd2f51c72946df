//! Circuit breaker middleware

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::CircuitBreakerConfig;
use crate::endpoint::{BoxEndpoint, Endpoint, RequestScope};
use crate::error::AppError;

const HALF_OPEN_TRIALS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    HalfOpen,
    Open,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::HalfOpen => write!(f, "half-open"),
            CircuitState::Open => write!(f, "open"),
        }
    }
}

/// Request counts for the current generation. A generation ends on every
/// state change and, while closed, at the end of each counting interval.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counts {
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests += 1;
    }

    fn on_success(&mut self) {
        self.total_successes += 1;
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
    }
}

struct BreakerState {
    state: CircuitState,
    generation: u64,
    counts: Counts,
    expiry: Option<Instant>,
}

pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let state = BreakerState {
            state: CircuitState::Closed,
            generation: 0,
            counts: Counts::default(),
            expiry: closed_expiry(&config, Instant::now()),
        };

        Self {
            name: name.into(),
            config,
            inner: Mutex::new(state),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.current_state(&mut inner, Instant::now());
        inner.state
    }

    pub fn counts(&self) -> Counts {
        self.inner.lock().counts.clone()
    }

    /// Admits or rejects a call. On admission returns the generation the
    /// outcome has to be reported against.
    fn before_request(&self) -> Result<u64, AppError> {
        let mut inner = self.inner.lock();
        self.current_state(&mut inner, Instant::now());

        match inner.state {
            CircuitState::Open => return Err(AppError::CircuitOpen),
            CircuitState::HalfOpen if inner.counts.requests >= HALF_OPEN_TRIALS => {
                return Err(AppError::CircuitOpen)
            }
            _ => {}
        }

        inner.counts.on_request();
        Ok(inner.generation)
    }

    fn after_request(&self, generation: u64, success: bool) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        self.current_state(&mut inner, now);

        // outcome of a call admitted before the last state change
        if inner.generation != generation {
            return;
        }

        if success {
            self.on_success(&mut inner, now);
        } else {
            self.on_failure(&mut inner, now);
        }
    }

    fn on_success(&self, inner: &mut BreakerState, now: Instant) {
        match inner.state {
            CircuitState::Closed => inner.counts.on_success(),
            CircuitState::HalfOpen => {
                inner.counts.on_success();
                if inner.counts.consecutive_successes >= HALF_OPEN_TRIALS {
                    self.set_state(inner, CircuitState::Closed, now);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self, inner: &mut BreakerState, now: Instant) {
        match inner.state {
            CircuitState::Closed => {
                inner.counts.on_failure();
                if self.ready_to_trip(&inner.counts) {
                    self.set_state(inner, CircuitState::Open, now);
                }
            }
            CircuitState::HalfOpen => self.set_state(inner, CircuitState::Open, now),
            CircuitState::Open => {}
        }
    }

    fn ready_to_trip(&self, counts: &Counts) -> bool {
        if counts.consecutive_failures >= self.config.consecutive_failures {
            return true;
        }

        match self.config.failure_ratio {
            Some(ratio) if counts.requests >= self.config.min_requests => {
                counts.total_failures as f64 / counts.requests as f64 >= ratio
            }
            _ => false,
        }
    }

    fn current_state(&self, inner: &mut BreakerState, now: Instant) {
        match inner.state {
            CircuitState::Closed => {
                if inner.expiry.is_some_and(|expiry| expiry <= now) {
                    self.new_generation(inner, now);
                }
            }
            CircuitState::Open => {
                if inner.expiry.is_some_and(|expiry| expiry <= now) {
                    self.set_state(inner, CircuitState::HalfOpen, now);
                }
            }
            CircuitState::HalfOpen => {}
        }
    }

    fn set_state(&self, inner: &mut BreakerState, state: CircuitState, now: Instant) {
        if inner.state == state {
            return;
        }

        let previous = inner.state;
        inner.state = state;
        self.new_generation(inner, now);

        match state {
            CircuitState::Open => {
                warn!(breaker = %self.name, from = %previous, "circuit breaker opened")
            }
            _ => info!(breaker = %self.name, from = %previous, to = %state, "circuit breaker state change"),
        }
    }

    fn new_generation(&self, inner: &mut BreakerState, now: Instant) {
        inner.generation += 1;
        inner.counts = Counts::default();
        inner.expiry = match inner.state {
            CircuitState::Closed => closed_expiry(&self.config, now),
            CircuitState::Open => Some(now + self.config.cooldown()),
            CircuitState::HalfOpen => None,
        };
    }
}

fn closed_expiry(config: &CircuitBreakerConfig, now: Instant) -> Option<Instant> {
    let interval: Duration = config.interval();
    if interval.is_zero() {
        None
    } else {
        Some(now + interval)
    }
}

pub struct CircuitBreakerEndpoint<Req, Resp> {
    breaker: Arc<CircuitBreaker>,
    inner: BoxEndpoint<Req, Resp>,
}

impl<Req, Resp> CircuitBreakerEndpoint<Req, Resp> {
    pub fn new(breaker: Arc<CircuitBreaker>, inner: BoxEndpoint<Req, Resp>) -> Self {
        Self { breaker, inner }
    }
}

#[async_trait]
impl<Req, Resp> Endpoint<Req, Resp> for CircuitBreakerEndpoint<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn call(&self, scope: RequestScope, request: Req) -> Result<Resp, AppError> {
        let generation = self.breaker.before_request()?;
        let result = self.inner.call(scope, request).await;

        let success = match &result {
            Ok(_) => true,
            Err(err) => !err.counts_as_failure(),
        };
        self.breaker.after_request(generation, success);

        result
    }
}
