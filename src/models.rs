pub mod auth;
pub mod health;
pub mod pagination;
pub mod session;
pub mod user;
