//! Order orchestration. The two multi-aggregate operations (checkout and
//! cancellation) each run as a single database transaction; the lifecycle
//! guard is evaluated inside that transaction, and the event fan-out is
//! handed to the dispatcher only after the commit.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::orders::{CheckoutRequest, OrderDetail, OrderList},
    entity::{
        addresses::{Column as AddrCol, Entity as Addresses},
        cart_items::{Column as CartCol, Entity as CartItems},
        order_lines::{
            ActiveModel as OrderLineActive, Column as OrderLineCol, Entity as OrderLines,
            Model as OrderLineModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
        payments::{
            ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments,
            Model as PaymentModel,
        },
    },
    error::{AppError, AppResult},
    events::{self, DomainEvent},
    lifecycle::{self, OrderStatus, Transition},
    middleware::auth::{AuthUser, ensure_admin},
    models::{self, MovementKind, Order, OrderLine, Payment, PaymentMode, PaymentStatus},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::stock_service,
    state::AppState,
};

/// Convert the caller's cart into a confirmed order.
///
/// Every mutation happens in one transaction: order + lines + payment
/// creation, the `out` ledger entries, the cart purge and the
/// pending -> confirmed transition commit together or not at all. Stock is
/// validated for every line before the first write, so a failing line leaves
/// nothing behind.
pub async fn create_from_cart(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderDetail>> {
    let mode = payload.payment_mode.as_deref().unwrap_or("delivery");
    let mode = PaymentMode::parse(mode)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown payment mode \"{mode}\"")))?;

    let txn = state.orm.begin().await?;

    let cart = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .all(&txn)
        .await?;
    if cart.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let address = Addresses::find_by_id(payload.address_id)
        .filter(AddrCol::UserId.eq(user.user_id))
        .one(&txn)
        .await?;
    let address = match address {
        Some(a) => a,
        None => return Err(AppError::NotFound),
    };

    // Lock product rows in a stable order so two concurrent checkouts never
    // deadlock on each other.
    let mut product_ids: Vec<Uuid> = cart.iter().map(|item| item.product_id).collect();
    product_ids.sort();
    product_ids.dedup();

    let mut products = HashMap::with_capacity(product_ids.len());
    for id in product_ids {
        match stock_service::lock_product(&txn, id).await? {
            Some(product) => {
                products.insert(id, product);
            }
            None => {
                return Err(AppError::BadRequest(
                    "A product in your cart is no longer available. Please remove it and retry."
                        .into(),
                ));
            }
        }
    }

    // Validate every line before mutating anything.
    for item in &cart {
        let product = &products[&item.product_id];
        if item.quantity <= 0 {
            return Err(AppError::BadRequest("Cart has an invalid quantity".into()));
        }
        if product.stock < item.quantity {
            return Err(AppError::InsufficientStock {
                product: product.name.clone(),
                available: product.stock,
                requested: item.quantity,
            });
        }
    }

    let total_amount: i64 = cart
        .iter()
        .map(|item| item.unit_price * item.quantity as i64)
        .sum();

    let order_id = Uuid::new_v4();
    let short_ref = models::short_reference(order_id);

    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(Some(user.user_id)),
        total_amount: Set(total_amount),
        status: Set(OrderStatus::Pending.as_str().to_owned()),
        customer_note: Set(payload.customer_note.unwrap_or_default()),
        ship_to_name: Set(address.full_name.clone()),
        ship_to_phone: Set(address.phone.clone()),
        ship_to_line: Set(address.line.clone()),
        ship_to_city: Set(address.city.clone()),
        ship_to_region: Set(address.region.clone()),
        ship_to_country: Set(address.country.clone()),
        delivered_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut lines: Vec<OrderLine> = Vec::with_capacity(cart.len());
    for item in &cart {
        let product = &products[&item.product_id];
        let line = OrderLineActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(Some(product.id)),
            product_name: Set(product.name.clone()),
            quantity: Set(item.quantity),
            unit_price: Set(item.unit_price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        lines.push(line_from_entity(line));
    }

    let mut emitted: Vec<DomainEvent> = Vec::new();
    for item in &cart {
        let product = products.remove(&item.product_id).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("product row vanished after lock"))
        })?;
        let entry = stock_service::apply_locked(
            &txn,
            product,
            MovementKind::Out,
            item.quantity,
            Some(user.user_id),
            Some(format!("order #{short_ref}")),
        )
        .await?;
        if let Some(event) = stock_service::low_stock_event(&entry.product) {
            emitted.push(event);
        }
        products.insert(item.product_id, entry.product);
    }

    let payment = PaymentActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        mode: Set(mode.as_str().to_owned()),
        status: Set(PaymentStatus::Pending.as_str().to_owned()),
        amount: Set(total_amount),
        external_ref: Set(None),
        paid_at: Set(None),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    // Clear the cart lines; the cart itself is just the user id.
    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    // pending -> confirmed, guarded and persisted in the same transaction.
    let confirmed = lifecycle::advance(OrderStatus::Pending, Transition::Confirm)?;
    let mut active: OrderActive = order.into();
    active.status = Set(confirmed.as_str().to_owned());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    emitted.insert(
        0,
        DomainEvent::OrderConfirmed {
            order_id: order.id,
            short_reference: short_ref,
            user_id: order.user_id,
            total_amount: order.total_amount,
        },
    );
    events::dispatch(state, emitted);

    Ok(ApiResponse::success(
        "Order placed",
        OrderDetail {
            order: order_from_entity(order),
            lines,
            payment: Some(payment_from_entity(payment)),
        },
        Some(Meta::empty()),
    ))
}

/// Cancel an order on behalf of its owner or an admin, restoring stock for
/// every line whose product still exists.
pub async fn cancel(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<OrderDetail>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if order.user_id != Some(user.user_id) && !user.is_admin() {
        return Err(AppError::Forbidden);
    }

    let current = parse_status(&order.status)?;
    let cancelled = lifecycle::advance(current, Transition::Cancel)?;

    let lines = OrderLines::find()
        .filter(OrderLineCol::OrderId.eq(order.id))
        .all(&txn)
        .await?;

    // Same lock order as checkout, so a cancel racing a checkout over
    // overlapping products queues instead of deadlocking.
    let mut product_ids: Vec<Uuid> = lines.iter().filter_map(|line| line.product_id).collect();
    product_ids.sort();
    product_ids.dedup();

    let mut products = HashMap::with_capacity(product_ids.len());
    for id in product_ids {
        // A deleted product has nothing to restore; skip it.
        if let Some(product) = stock_service::lock_product(&txn, id).await? {
            products.insert(id, product);
        }
    }

    let short_ref = models::short_reference(order.id);
    for line in &lines {
        let Some(product_id) = line.product_id else {
            continue;
        };
        let Some(product) = products.remove(&product_id) else {
            continue;
        };
        let entry = stock_service::apply_locked(
            &txn,
            product,
            MovementKind::Return,
            line.quantity,
            Some(user.user_id),
            Some(format!("order #{short_ref} cancelled")),
        )
        .await?;
        products.insert(product_id, entry.product);
    }

    let mut active: OrderActive = order.into();
    active.status = Set(cancelled.as_str().to_owned());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    let payment = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .one(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(order_id = %order.id, actor = %user.user_id, "order cancelled");

    Ok(ApiResponse::success(
        "Order cancelled",
        OrderDetail {
            order: order_from_entity(order),
            lines: lines.into_iter().map(line_from_entity).collect(),
            payment: payment.map(payment_from_entity),
        },
        Some(Meta::empty()),
    ))
}

/// Admin-driven lifecycle step (confirm, prepare, ship, deliver). Delivery
/// stamps `delivered_at` and settles a pay-on-delivery payment.
pub async fn apply_transition(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    event: Transition,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    if event == Transition::Cancel {
        // Cancellation restores stock; it has its own endpoint.
        return Err(AppError::BadRequest(
            "Use the cancel endpoint to cancel an order".into(),
        ));
    }

    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let current = parse_status(&order.status)?;
    let next = lifecycle::advance(current, event)?;
    let now = Utc::now();

    let mut active: OrderActive = order.into();
    active.status = Set(next.as_str().to_owned());
    active.updated_at = Set(now.into());
    if event == Transition::Deliver {
        active.delivered_at = Set(Some(now.into()));
    }
    let order = active.update(&txn).await?;

    let mut emitted: Vec<DomainEvent> = Vec::new();
    match event {
        Transition::Confirm => {
            emitted.push(DomainEvent::OrderConfirmed {
                order_id: order.id,
                short_reference: models::short_reference(order.id),
                user_id: order.user_id,
                total_amount: order.total_amount,
            });
        }
        Transition::Deliver => {
            settle_delivery_payment(&txn, order.id, now).await?;
            emitted.push(DomainEvent::OrderDelivered {
                order_id: order.id,
                short_reference: models::short_reference(order.id),
                user_id: order.user_id,
            });
        }
        _ => {}
    }

    txn.commit().await?;
    events::dispatch(state, emitted);

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

/// A pay-on-delivery payment is considered collected the moment the order is
/// handed over. Other modes keep whatever status their gateway left.
async fn settle_delivery_payment(
    txn: &sea_orm::DatabaseTransaction,
    order_id: Uuid,
    now: chrono::DateTime<Utc>,
) -> AppResult<()> {
    let payment = Payments::find()
        .filter(PaymentCol::OrderId.eq(order_id))
        .one(txn)
        .await?;
    if let Some(payment) = payment {
        if payment.mode == PaymentMode::Delivery.as_str()
            && payment.status == PaymentStatus::Pending.as_str()
        {
            let mut active: PaymentActive = payment.into();
            active.status = Set(PaymentStatus::Succeeded.as_str().to_owned());
            active.paid_at = Set(Some(now.into()));
            active.update(txn).await?;
        }
    }
    Ok(())
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
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
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderDetail>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?;
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
        "OK",
        OrderDetail {
            order: order_from_entity(order),
            lines,
            payment: payment.map(payment_from_entity),
        },
        Some(Meta::empty()),
    ))
}

fn parse_status(value: &str) -> AppResult<OrderStatus> {
    OrderStatus::parse(value).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("unknown order status \"{value}\" in database"))
    })
}

pub(crate) fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        short_reference: models::short_reference(model.id),
        user_id: model.user_id,
        total_amount: model.total_amount,
        status: model.status,
        customer_note: model.customer_note,
        ship_to_name: model.ship_to_name,
        ship_to_phone: model.ship_to_phone,
        ship_to_line: model.ship_to_line,
        ship_to_city: model.ship_to_city,
        ship_to_region: model.ship_to_region,
        ship_to_country: model.ship_to_country,
        delivered_at: model.delivered_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub(crate) fn line_from_entity(model: OrderLineModel) -> OrderLine {
    OrderLine {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        product_name: model.product_name,
        quantity: model.quantity,
        unit_price: model.unit_price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub(crate) fn payment_from_entity(model: PaymentModel) -> Payment {
    Payment {
        id: model.id,
        order_id: model.order_id,
        mode: model.mode,
        status: model.status,
        amount: model.amount,
        external_ref: model.external_ref,
        paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
    }
}
