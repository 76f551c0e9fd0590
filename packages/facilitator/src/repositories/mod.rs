pub mod entity;
pub mod observers;
pub mod repositories;
pub mod repository;
pub mod subject;
