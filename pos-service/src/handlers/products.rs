//! Product catalog handlers. Thin wrappers over the database service.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{money, CreateProductRequest, ProductResponse};
use crate::fiscal::payload::STANDARD_TAX_CODE;
use crate::models::CreateProduct;
use crate::startup::AppState;

/// Create a new product.
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), AppError> {
    payload.validate()?;

    let input = CreateProduct {
        price: money(payload.price)?,
        name: payload.name,
        description: payload.description,
        stock: payload.stock,
        tax_code: payload
            .tax_code
            .unwrap_or_else(|| STANDARD_TAX_CODE.to_string()),
    };

    let product = state.db.create_product(&input).await?;

    Ok((StatusCode::CREATED, Json(product.into())))
}

/// List all products.
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductResponse>>, AppError> {
    let products = state.db.list_products().await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}

/// Get a product by ID.
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = state
        .db
        .get_product(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

    Ok(Json(product.into()))
}
