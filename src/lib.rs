//! Library crate for god-persistence, exposing modules for the maintenance binary and integration tests.

pub mod config;
pub mod dao;
mod error;
pub mod services;

pub use error::{ServiceError, ServiceResult};
