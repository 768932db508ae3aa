use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::info;
use validator::{Validate, ValidationError};

use super::common::client_ip;
use crate::handlers::AppState;
use crate::services::vnpay::PaymentRequest;
use crate::{ApiResponse, ApiResult};

fn validate_positive_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("range");
        err.message = Some("Amount must be greater than 0".into());
        Err(err)
    }
}

/// Checkout submission that pays through the gateway redirect flow.
#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutPaymentRequest {
    /// Order being paid for
    pub order_id: i64,

    /// Order total in major currency units
    #[validate(custom = "validate_positive_decimal")]
    pub amount: Decimal,

    /// Customer name shown on the gateway page
    #[validate(length(min = 1))]
    pub full_name: String,

    /// Contact number included in the order description
    pub mobile_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutRedirect {
    pub order_id: i64,
    /// Signed gateway URL the customer must be redirected to
    pub payment_url: String,
}

/// Starts a gateway payment for an order and returns the redirect URL.
pub async fn create_checkout_payment(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(request): Json<CheckoutPaymentRequest>,
) -> ApiResult<CheckoutRedirect> {
    request.validate()?;

    let description = match &request.mobile_number {
        Some(mobile) => format!("{} {}", request.full_name, mobile),
        None => request.full_name.clone(),
    };

    let payment = PaymentRequest {
        order_id: request.order_id,
        amount: request.amount,
        full_name: request.full_name,
        description,
        created_at: Utc::now(),
    };

    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    let payment_url = state.vnpay.create_payment_url(&payment, &ip);

    info!(
        order_id = payment.order_id,
        "checkout handed off to payment gateway"
    );

    Ok(Json(ApiResponse::success(CheckoutRedirect {
        order_id: payment.order_id,
        payment_url,
    })))
}
