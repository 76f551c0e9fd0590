pub mod contracts;
pub mod event_source;
pub mod proof;
pub mod relayer;
