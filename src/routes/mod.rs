use axum::Router;

use crate::state::AppState;

pub mod addresses;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod doc;
pub mod health;
pub mod notifications;
pub mod orders;
pub mod params;
pub mod products;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/products", products::router())
        .nest("/auth", auth::router())
        .nest("/cart", cart::router())
        .nest("/addresses", addresses::router())
        .nest("/orders", orders::router())
        .nest("/notifications", notifications::router())
        .nest("/admin", admin::router())
}
