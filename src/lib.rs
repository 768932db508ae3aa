//! Bookshop Payments Library
//!
//! This crate provides the VNPay gateway integration for the bookshop
//! platform: signed redirect URLs for outbound payments and verification of
//! inbound payment callbacks.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod errors;
pub mod handlers;
pub mod services;

use axum::{Json, Router};
use serde::Serialize;

use crate::services::vnpay::VnPayGateway;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub vnpay: VnPayGateway,
}

impl AppState {
    /// Builds the shared state from loaded configuration.
    pub fn from_config(config: config::AppConfig) -> Self {
        let vnpay = VnPayGateway::new(config.vnpay.clone());
        Self { config, vnpay }
    }
}

// Common response wrappers
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
            errors: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

// API routes function
pub fn api_v1_routes() -> Router<AppState> {
    Router::new().nest("/payments", handlers::payment_routes())
}
