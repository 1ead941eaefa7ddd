//! Database initialization shared by Dining Philosophers services

pub mod init;

pub use init::*;
