//! Queue module: the bounded dispatch queue and the fetch retry policy.

mod dispatch;
mod retry;

pub use dispatch::DispatchQueue;
pub use retry::RetryPolicy;
