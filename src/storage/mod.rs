// storage/mod.rs
// Database operations module

pub mod migrations;
pub mod pool;
mod store;
mod updater;

#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used items
pub use migrations::run_migrations;
pub use pool::{init_db_pool_with_path, DbPool};
pub use store::GeoIpStore;
pub use updater::Updater;
