pub mod auth;
pub mod rate_limit;

pub use auth::{issue_token, rider_auth_middleware, RiderClaims};
pub use rate_limit::rate_limit_middleware;
