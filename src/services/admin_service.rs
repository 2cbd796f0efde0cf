use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::orders::{OrderDetail, OrderList},
    dto::products::{
        AdjustStockRequest, ProductList, RestockRequest, RestockResponse, StockMovementList,
    },
    entity::{
        order_lines::{Column as OrderLineCol, Entity as OrderLines},
        orders::{Column as OrderCol, Entity as Orders},
        payments::{Column as PaymentCol, Entity as Payments},
        products::{Column as ProductCol, Entity as Products},
        stock_movements::{
            Column as MovementCol, Entity as StockMovements, Model as MovementModel,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{MovementKind, ProductStatus, StockMovement},
    response::{ApiResponse, Meta},
    routes::params::{AdminOrderListQuery, LowStockQuery, Pagination, SortOrder},
    services::{
        order_service::{line_from_entity, order_from_entity, payment_from_entity},
        product_service::product_from_entity,
        stock_service,
    },
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: AdminOrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }
    if let Some(user_id) = query.user_id {
        condition = condition.add(OrderCol::UserId.eq(user_id));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderDetail>> {
    ensure_admin(user)?;
    let order = Orders::find_by_id(id).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let lines = OrderLines::find()
        .filter(OrderLineCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(line_from_entity)
        .collect();

    let payment = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .one(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "Order",
        OrderDetail {
            order: order_from_entity(order),
            lines,
            payment: payment.map(payment_from_entity),
        },
        Some(Meta::empty()),
    ))
}

/// Products at or below their alert threshold. Archived products are kept
/// out of the report; they are not for sale anyway.
pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition =
        Condition::all().add(ProductCol::Status.ne(ProductStatus::Archived.as_str()));
    condition = match query.threshold {
        Some(threshold) => condition.add(ProductCol::Stock.lte(threshold)),
        None => condition
            .add(Expr::col(ProductCol::Stock).lte(Expr::col(ProductCol::LowStockThreshold))),
    };

    let finder = Products::find()
        .filter(condition)
        .order_by_asc(ProductCol::Stock);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Low stock",
        ProductList { items },
        Some(meta),
    ))
}

/// Receive stock from a supplier: an `in` movement under the row lock.
pub async fn restock(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: RestockRequest,
) -> AppResult<ApiResponse<RestockResponse>> {
    ensure_admin(user)?;
    let txn = state.orm.begin().await?;

    let product = match stock_service::lock_product(&txn, id).await? {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let entry = stock_service::apply_locked(
        &txn,
        product,
        MovementKind::In,
        payload.quantity,
        Some(user.user_id),
        payload.note,
    )
    .await?;

    txn.commit().await?;

    tracing::info!(product_id = %id, quantity = payload.quantity, "stock received");

    Ok(ApiResponse::success(
        "Restocked",
        RestockResponse {
            product: product_from_entity(entry.product),
            movement: movement_from_entity(entry.movement),
        },
        Some(Meta::empty()),
    ))
}

/// Correct the cached stock after a physical count.
pub async fn adjust_stock(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: AdjustStockRequest,
) -> AppResult<ApiResponse<RestockResponse>> {
    ensure_admin(user)?;
    let txn = state.orm.begin().await?;

    let product = match stock_service::lock_product(&txn, id).await? {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let entry =
        stock_service::adjust_locked(&txn, product, payload.stock, Some(user.user_id), payload.note)
            .await?;

    txn.commit().await?;

    tracing::info!(product_id = %id, stock = payload.stock, "stock adjusted");

    Ok(ApiResponse::success(
        "Adjusted",
        RestockResponse {
            product: product_from_entity(entry.product),
            movement: movement_from_entity(entry.movement),
        },
        Some(Meta::empty()),
    ))
}

/// The movement history for one product, newest first.
pub async fn list_movements(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<StockMovementList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    if Products::find_by_id(product_id).one(&state.orm).await?.is_none() {
        return Err(AppError::NotFound);
    }

    let finder = StockMovements::find()
        .filter(MovementCol::ProductId.eq(product_id))
        .order_by_desc(MovementCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(movement_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Movements",
        StockMovementList { items },
        Some(meta),
    ))
}

fn movement_from_entity(model: MovementModel) -> StockMovement {
    StockMovement {
        id: model.id,
        product_id: model.product_id,
        kind: model.kind,
        quantity: model.quantity,
        stock_before: model.stock_before,
        stock_after: model.stock_after,
        note: model.note,
        actor_id: model.actor_id,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
