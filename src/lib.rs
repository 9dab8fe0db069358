//! Wholesale Portal
//!
//! Ordering service for approved wholesale partners.
//!
//! ## Features
//! - Partner applications and admin approval
//! - Product catalog with variant-level wholesale and retail pricing
//! - Per-session cart persisted to durable storage
//! - Order submission against the remote data service
//! - Admin back-office: customers, products, order status

pub mod api;
pub mod cart_store;
pub mod config;
pub mod data;
pub mod domain;
pub mod publisher;
pub mod services;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

use thiserror::Error;

use crate::data::DataError;
use crate::domain::aggregates::{CartError, OrderStatus};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} is not available")]
    Unavailable(String),

    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Data(#[from] DataError),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
