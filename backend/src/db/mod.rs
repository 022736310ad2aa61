pub mod models;
pub mod report_repository;
