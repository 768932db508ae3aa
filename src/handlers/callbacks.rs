use axum::{
    extract::{Query, State},
    Json,
};
use std::collections::HashMap;

use crate::handlers::AppState;
use crate::services::vnpay::PaymentCallbackResult;
use crate::{ApiResponse, ApiResult};

/// Inbound return callback from the payment gateway.
///
/// The signature check runs before any field of the query is treated as
/// authoritative; a tampered or unsigned callback is rejected with 401 and
/// none of its payment-status claims are surfaced. A declined payment with
/// a valid signature is a normal 200 outcome.
pub async fn vnpay_callback(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<PaymentCallbackResult> {
    let result = state.vnpay.verify_callback(&params)?;

    if result.success {
        Ok(Json(ApiResponse::success(result)))
    } else {
        let message = format!("Payment error: {}", result.response_description);
        Ok(Json(ApiResponse::success_with_message(result, message)))
    }
}
