use axum::{
    Json,
    extract::State,
    response::Response,
};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use crate::auth::Identity;
use crate::handler::{AppState, bad_request, internal_error, not_found, success};
use crate::razorpay::{make_receipt, order_amount_paise};
use crate::supabase::TableQuery;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub book_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    #[serde(default)]
    price: f64,
}

pub async fn create_order(
    State(state): State<AppState>,
    user: Identity,
    Json(payload): Json<CreateOrderRequest>,
) -> Response {
    let Some(book_id) = payload.book_id.as_deref() else {
        return bad_request("Book ID is required");
    };

    let query = TableQuery::new().select("price").eq("id", book_id);
    let price = match state.supabase.select_optional::<PriceRow>("books", query).await {
        Ok(Some(row)) => row.price,
        Ok(None) => return not_found("Book not found"),
        Err(e) => {
            tracing::error!("failed to look up book {} price: {:#}", book_id, e);
            return internal_error("Failed to create payment order");
        }
    };

    if price <= 0.0 {
        return bad_request("This book is not for sale.");
    }

    let receipt = make_receipt(book_id);
    let notes = json!({ "user_id": user.id(), "book_id": book_id });

    match state
        .payments
        .create_order(order_amount_paise(price), &receipt, notes)
        .await
    {
        Ok(order) => success(order),
        Err(e) => {
            tracing::error!("order creation failed for book {}: {:#}", book_id, e);
            internal_error("Failed to create payment order")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
    pub book_id: Option<String>,
}

pub async fn verify_payment(
    State(state): State<AppState>,
    user: Identity,
    Json(payload): Json<VerifyPaymentRequest>,
) -> Response {
    let (Some(order_id), Some(payment_id), Some(signature), Some(book_id)) = (
        payload.razorpay_order_id.as_deref(),
        payload.razorpay_payment_id.as_deref(),
        payload.razorpay_signature.as_deref(),
        payload.book_id.as_deref(),
    ) else {
        return bad_request("Missing payment verification data");
    };

    // The purchase row must never land unless the signature holds.
    if !state.payments.verify_signature(order_id, payment_id, signature) {
        tracing::warn!("payment verification failed: invalid signature");
        return bad_request("Payment verification failed.");
    }

    let row = json!({
        "user_id": user.id(),
        "book_id": book_id,
        "razorpay_payment_id": payment_id,
    });

    match state.supabase.insert::<JsonValue>("purchases", &row).await {
        Ok(_) => success(json!({
            "message": "Payment successful! You now have access to this book."
        })),
        Err(e) => {
            tracing::error!("failed to record purchase for {}: {:#}", book_id, e);
            internal_error("Failed to record purchase")
        }
    }
}
