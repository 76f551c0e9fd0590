pub mod accept_service;
pub mod confirm_service;
pub mod context;
pub mod progress_service;
pub mod prove_service;
pub mod retry;
