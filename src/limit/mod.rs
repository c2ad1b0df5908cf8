//! Rate limiting algorithms and the limiter façade.

mod algorithm;
mod decision;
mod fixed_window;
mod key;
mod leaky_bucket;
mod limiter;
mod sliding_counter;
mod sliding_log;
mod token_bucket;

pub use decision::Decision;
pub use key::LimitKey;
pub use limiter::RateLimiter;
