//! Order capture handlers. Thin wrappers over the database service.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{money, CreateOrderRequest, OrderResponse};
use crate::models::{CreateOrder, CreateOrderItem};
use crate::startup::AppState;

/// Capture an order with its line items.
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    payload.validate()?;

    let items = payload
        .items
        .iter()
        .map(|item| {
            Ok(CreateOrderItem {
                product_id: item.product_id,
                quantity: item.quantity,
                price: money(item.price)?,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let input = CreateOrder {
        total: money(payload.total)?,
        tax: money(payload.tax)?,
        discount: money(payload.discount)?,
        created_utc: None,
        items,
    };

    let order = state.db.create_order(&input).await?;
    let items = state.db.get_order_items(order.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderResponse::from_parts(order, items)),
    ))
}

/// Get an order with its items.
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state
        .db
        .get_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;
    let items = state.db.get_order_items(order.id).await?;

    Ok(Json(OrderResponse::from_parts(order, items)))
}
