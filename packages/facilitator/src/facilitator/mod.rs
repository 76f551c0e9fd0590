pub mod facilitator;
pub mod setup;
