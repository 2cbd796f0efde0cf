use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Product, StockMovement};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: String,
    pub price: i64,
    pub stock: i32,
    pub low_stock_threshold: Option<i32>,
}

/// Stock is deliberately absent. Stock only moves through the ledger
/// (restock and adjust endpoints), never through a plain update.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub status: Option<String>,
    pub low_stock_threshold: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RestockRequest {
    pub quantity: i32,
    pub note: Option<String>,
}

/// Correct the cached stock to `stock` after a physical count. The gap is
/// recorded as an `adjustment` movement.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjustStockRequest {
    pub stock: i32,
    pub note: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RestockResponse {
    pub product: Product,
    pub movement: StockMovement,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockMovementList {
    pub items: Vec<StockMovement>,
}
