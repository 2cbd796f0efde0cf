//! The stock ledger. Every stock change goes through [`apply_locked`], which
//! appends an immutable movement row and keeps the product's cached stock in
//! step with the running sum.

use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, QuerySelect, Set};
use uuid::Uuid;

use crate::{
    entity::{
        products::{self, Entity as Products},
        stock_movements,
    },
    error::{AppError, AppResult},
    events::DomainEvent,
    models::{MovementKind, ProductStatus},
};

pub struct LedgerEntry {
    pub product: products::Model,
    pub movement: stock_movements::Model,
}

/// Fetch a product row under `SELECT ... FOR UPDATE`. Callers lock before
/// they read the stock they are about to change; concurrent writers queue on
/// the row instead of losing updates.
pub async fn lock_product<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> AppResult<Option<products::Model>> {
    let product = Products::find_by_id(id)
        .lock(LockType::Update)
        .one(conn)
        .await?;
    Ok(product)
}

/// Apply one movement to a product row the caller has already locked.
///
/// Rejects non-positive quantities, and `out` movements that would take the
/// stock below zero. On success the ledger row and the updated product are
/// returned together.
pub async fn apply_locked<C: ConnectionTrait>(
    conn: &C,
    product: products::Model,
    kind: MovementKind,
    quantity: i32,
    actor_id: Option<Uuid>,
    note: Option<String>,
) -> AppResult<LedgerEntry> {
    if quantity <= 0 {
        return Err(AppError::BadRequest(
            "movement quantity must be greater than 0".into(),
        ));
    }

    let stock_before = product.stock;
    let stock_after = if kind.is_outbound() {
        if stock_before < quantity {
            return Err(AppError::InsufficientStock {
                product: product.name.clone(),
                available: stock_before,
                requested: quantity,
            });
        }
        stock_before - quantity
    } else {
        stock_before + quantity
    };

    let status = next_status(&product.status, stock_after);

    let movement = stock_movements::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        kind: Set(kind.as_str().to_owned()),
        quantity: Set(quantity),
        stock_before: Set(stock_before),
        stock_after: Set(stock_after),
        note: Set(note),
        actor_id: Set(actor_id),
        created_at: NotSet,
    }
    .insert(conn)
    .await?;

    let mut active: products::ActiveModel = product.into();
    active.stock = Set(stock_after);
    if let Some(status) = status {
        active.status = Set(status.as_str().to_owned());
    }
    let product = active.update(conn).await?;

    Ok(LedgerEntry { product, movement })
}

/// Set the stock to an exact level after a physical count, recording the gap
/// as an `adjustment` movement. The caller holds the row lock.
pub async fn adjust_locked<C: ConnectionTrait>(
    conn: &C,
    product: products::Model,
    target: i32,
    actor_id: Option<Uuid>,
    note: Option<String>,
) -> AppResult<LedgerEntry> {
    if target < 0 {
        return Err(AppError::BadRequest("stock cannot be negative".into()));
    }
    let stock_before = product.stock;
    if target == stock_before {
        return Err(AppError::BadRequest(format!(
            "stock is already at {stock_before}"
        )));
    }

    let status = next_status(&product.status, target);

    let movement = stock_movements::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        kind: Set(MovementKind::Adjustment.as_str().to_owned()),
        quantity: Set((target - stock_before).abs()),
        stock_before: Set(stock_before),
        stock_after: Set(target),
        note: Set(note),
        actor_id: Set(actor_id),
        created_at: NotSet,
    }
    .insert(conn)
    .await?;

    let mut active: products::ActiveModel = product.into();
    active.stock = Set(target);
    if let Some(status) = status {
        active.status = Set(status.as_str().to_owned());
    }
    let product = active.update(conn).await?;

    Ok(LedgerEntry { product, movement })
}

/// Stock-driven status flips. Only `active` and `out_of_stock` participate;
/// a product that was archived or deactivated by hand keeps that status no
/// matter what the ledger does.
fn next_status(current: &str, stock_after: i32) -> Option<ProductStatus> {
    match ProductStatus::parse(current) {
        Some(ProductStatus::Active) if stock_after == 0 => Some(ProductStatus::OutOfStock),
        Some(ProductStatus::OutOfStock) if stock_after > 0 => Some(ProductStatus::Active),
        _ => None,
    }
}

/// Emitted opportunistically after decrements; the dispatcher turns it into
/// an admin alert.
pub fn low_stock_event(product: &products::Model) -> Option<DomainEvent> {
    if product.stock <= product.low_stock_threshold {
        Some(DomainEvent::LowStock {
            product_id: product.id,
            name: product.name.clone(),
            stock: product.stock,
            threshold: product.low_stock_threshold,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_product_goes_out_of_stock_at_zero() {
        assert_eq!(next_status("active", 0), Some(ProductStatus::OutOfStock));
        assert_eq!(next_status("active", 3), None);
    }

    #[test]
    fn restock_reactivates_only_out_of_stock() {
        assert_eq!(next_status("out_of_stock", 5), Some(ProductStatus::Active));
        assert_eq!(next_status("out_of_stock", 0), None);
    }

    #[test]
    fn manual_statuses_are_never_overridden() {
        assert_eq!(next_status("archived", 0), None);
        assert_eq!(next_status("archived", 10), None);
        assert_eq!(next_status("inactive", 0), None);
        assert_eq!(next_status("inactive", 10), None);
    }
}
