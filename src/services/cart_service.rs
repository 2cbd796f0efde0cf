use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::cart::{AddToCartRequest, CartItemDto, CartList},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, Product, ProductStatus},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
};

#[derive(FromRow)]
struct CartWithProductRow {
    cart_id: Uuid,
    quantity: i32,
    unit_price: i64,
    product_id: Uuid,
    name: String,
    description: Option<String>,
    price: i64,
    stock: i32,
    low_stock_threshold: i32,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    price: i64,
    stock: i32,
    status: String,
}

pub async fn list_cart(
    pool: &DbPool,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CartList>> {
    let (page, limit, offset) = pagination.normalize();
    let rows = sqlx::query_as::<_, CartWithProductRow>(
        r#"
        SELECT ci.id AS cart_id, ci.quantity, ci.unit_price,
               p.id AS product_id, p.name, p.description, p.price, p.stock,
               p.low_stock_threshold, p.status, p.created_at
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.user_id = $1
        ORDER BY ci.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let totals: (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(quantity::bigint * unit_price), 0)::bigint \
         FROM cart_items WHERE user_id = $1",
    )
    .bind(user.user_id)
    .fetch_one(pool)
    .await?;

    let items = rows
        .into_iter()
        .map(|row| CartItemDto {
            id: row.cart_id,
            product: Product {
                id: row.product_id,
                name: row.name,
                description: row.description,
                price: row.price,
                stock: row.stock,
                low_stock_threshold: row.low_stock_threshold,
                status: row.status,
                created_at: row.created_at,
            },
            quantity: row.quantity,
            unit_price: row.unit_price,
        })
        .collect();

    let meta = Meta::new(page, limit, totals.0);
    Ok(ApiResponse::success(
        "OK",
        CartList {
            items,
            total: totals.1,
        },
        Some(meta),
    ))
}

/// Add a product to the cart, or raise the quantity of an existing line.
/// The unit price snapshot is taken on first add and kept on increments, so
/// a later catalog price change does not move lines already in the cart.
pub async fn add_to_cart(
    pool: &DbPool,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product = sqlx::query_as::<_, ProductRow>(
        "SELECT id, name, price, stock, status FROM products WHERE id = $1",
    )
    .bind(payload.product_id)
    .fetch_optional(pool)
    .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::BadRequest("product not found".to_string())),
    };

    if product.status != ProductStatus::Active.as_str() {
        return Err(AppError::BadRequest(format!(
            "\"{}\" is not available right now",
            product.name
        )));
    }

    let existing: Option<CartItem> =
        sqlx::query_as("SELECT * FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user.user_id)
            .bind(payload.product_id)
            .fetch_optional(pool)
            .await?;

    let new_quantity = existing.as_ref().map_or(0, |item| item.quantity) + payload.quantity;
    if new_quantity > product.stock {
        return Err(AppError::InsufficientStock {
            product: product.name,
            available: product.stock,
            requested: new_quantity,
        });
    }

    let cart_item = if let Some(item) = existing {
        sqlx::query_as::<_, CartItem>(
            r#"
            UPDATE cart_items
            SET quantity = $3
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(item.id)
        .bind(user.user_id)
        .bind(new_quantity)
        .fetch_one(pool)
        .await?
    } else {
        sqlx::query_as(
            r#"
            INSERT INTO cart_items (id, user_id, product_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.user_id)
        .bind(product.id)
        .bind(new_quantity)
        .bind(product.price)
        .fetch_one(pool)
        .await?
    };

    Ok(ApiResponse::success("OK", cart_item, None))
}

pub async fn remove_from_cart(
    pool: &DbPool,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM cart_items WHERE product_id = $1 AND user_id = $2")
        .bind(product_id)
        .bind(user.user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
