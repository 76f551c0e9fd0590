pub mod hash_utils;
pub mod secret;
