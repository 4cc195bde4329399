mod cors;
mod rate_limit;

pub use cors::{CorsPolicy, cors};
pub use rate_limit::{RateLimiter, client_id, rate_limit};
