pub mod account;
pub mod entry;
pub mod health;
pub mod transfer;
pub mod user;
