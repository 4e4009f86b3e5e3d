pub mod cache;
pub mod error;
pub mod message;
pub mod provider;
pub mod service;
