pub mod filter;
pub mod postgres_repository;
pub mod scope;
pub mod unit_of_work;
pub mod user;
