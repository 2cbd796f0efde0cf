use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::lifecycle::{OrderStatus, Transition};
use crate::response::{ApiResponse, Meta};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Insufficient stock for \"{product}\": available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i32,
        requested: i32,
    },

    #[error("Cannot {event} an order in status {from}")]
    InvalidTransition { from: OrderStatus, event: Transition },

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_)
            | AppError::EmptyCart
            | AppError::InsufficientStock { .. }
            | AppError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "request failed");
        }

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(ErrorData {
                error: self.to_string(),
            }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_errors_map_to_client_statuses() {
        assert_eq!(AppError::EmptyCart.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::InsufficientStock {
                product: "Ferris Mug".into(),
                available: 1,
                requested: 5,
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InvalidTransition {
                from: OrderStatus::Delivered,
                event: Transition::Ship,
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn insufficient_stock_names_the_product() {
        let message = AppError::InsufficientStock {
            product: "Ferris Mug".into(),
            available: 1,
            requested: 5,
        }
        .to_string();
        assert!(message.contains("Ferris Mug"));
        assert!(message.contains("available 1"));
        assert!(message.contains("requested 5"));
    }
}
