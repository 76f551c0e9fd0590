pub mod database;
#[cfg(test)]
pub mod memory;
pub mod model;
pub mod store;
