//! Application services: catalog reads, inventory writes, error mapping.

pub mod catalog;
pub mod error;
pub mod inventory;
pub mod pagination;
pub mod repos;
