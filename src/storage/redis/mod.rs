//! Redis-backed window storage
//!
//! ## Module Structure
//!
//! - `pool` - Connection management and health checks
//! - `script` - Key layout and the server-side window script
//! - `store` - [`WindowStore`](super::WindowStore) implementation
//! - `tests` - Module tests

mod pool;
mod script;
mod store;

pub use pool::RedisPool;
pub use script::KeyLayout;
pub use store::RedisWindowStore;
