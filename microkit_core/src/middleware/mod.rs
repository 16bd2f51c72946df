//! Endpoint middlewares and the HTTP boundary layers

pub mod auth;
pub mod authorization;
pub mod cache;
pub mod circuit_breaker;
pub mod instrument;
pub mod logging;
pub mod rate_limit;
pub mod trace;

pub use auth::{route_authorization_middleware, token_auth_middleware};
pub use authorization::AuthorizationEndpoint;
pub use cache::CacheEndpoint;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerEndpoint, CircuitState, Counts};
pub use instrument::InstrumentEndpoint;
pub use logging::with_request_logging;
pub use rate_limit::{RateLimitEndpoint, RateLimiter};
pub use trace::TraceEndpoint;
