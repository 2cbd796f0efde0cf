use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{OrderDetail, OrderList},
    dto::products::{
        AdjustStockRequest, ProductList, RestockRequest, RestockResponse, StockMovementList,
    },
    error::{AppError, AppResult},
    lifecycle::Transition,
    middleware::auth::AuthUser,
    models::Order,
    response::ApiResponse,
    routes::params::{AdminOrderListQuery, LowStockQuery, Pagination},
    services::{admin_service, order_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_all_orders))
        .route("/orders/{id}", get(get_order_admin))
        .route("/orders/{id}/{transition}", post(transition_order))
        .route("/inventory/low-stock", get(list_low_stock))
        .route("/inventory/{id}/restock", post(restock))
        .route("/inventory/{id}/adjust", post(adjust_stock))
        .route("/inventory/{id}/movements", get(list_movements))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("user_id" = Option<Uuid>, Query, description = "Filter by customer"),
        ("sort_order" = Option<String>, Query, description = "asc or desc")
    ),
    responses(
        (status = 200, description = "Get all orders (admin only)", body = ApiResponse<OrderList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AdminOrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = admin_service::list_all_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Get any order with lines (admin only)", body = ApiResponse<OrderDetail>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_order_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let resp = admin_service::get_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/{transition}",
    params(
        ("id" = Uuid, Path, description = "Order ID"),
        ("transition" = String, Path, description = "confirm, prepare, ship or deliver")
    ),
    responses(
        (status = 200, description = "Advance the order lifecycle", body = ApiResponse<Order>),
        (status = 400, description = "Transition not allowed from current status"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn transition_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, transition)): Path<(Uuid, String)>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let event = Transition::parse(&transition)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown transition \"{transition}\"")))?;
    let resp = order_service::apply_transition(&state, &user, id, event).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/inventory/low-stock",
    params(
        ("threshold" = Option<i32>, Query, description = "Override per-product thresholds"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "List low stock products", body = ApiResponse<ProductList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_low_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<LowStockQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = admin_service::list_low_stock(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/inventory/{id}/restock",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = RestockRequest,
    responses(
        (status = 200, description = "Receive stock", body = ApiResponse<RestockResponse>),
        (status = 400, description = "Invalid quantity"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn restock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RestockRequest>,
) -> AppResult<Json<ApiResponse<RestockResponse>>> {
    let resp = admin_service::restock(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/inventory/{id}/adjust",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = AdjustStockRequest,
    responses(
        (status = 200, description = "Correct stock after a count", body = ApiResponse<RestockResponse>),
        (status = 400, description = "Invalid stock level"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdjustStockRequest>,
) -> AppResult<Json<ApiResponse<RestockResponse>>> {
    let resp = admin_service::adjust_stock(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/inventory/{id}/movements",
    params(
        ("id" = Uuid, Path, description = "Product ID"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Movement history, newest first", body = ApiResponse<StockMovementList>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<StockMovementList>>> {
    let resp = admin_service::list_movements(&state, &user, id, pagination).await?;
    Ok(Json(resp))
}
