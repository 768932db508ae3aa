pub mod callbacks;
pub mod checkout;
pub mod common;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Payment routes
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout::create_checkout_payment))
        .route("/vnpay/callback", get(callbacks::vnpay_callback))
}
