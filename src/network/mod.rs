pub mod gossip;
pub mod message;
pub mod peer;
pub mod rate_limiter;
pub mod sync;
pub mod wire;
