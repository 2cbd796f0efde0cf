use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortBy {
    CreatedAt,
    Price,
    Name,
}

// The page/per_page fields are inlined in each query struct rather than
// flattened: serde_urlencoded buffers flattened fields as strings and then
// rejects the numeric ones, which would 400 every paginated request.

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub q: Option<String>,
    pub status: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub sort_by: Option<ProductSortBy>,
    pub sort_order: Option<SortOrder>,
}

impl ProductQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl OrderListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminOrderListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<String>,
    pub user_id: Option<Uuid>,
    pub sort_order: Option<SortOrder>,
}

impl AdminOrderListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LowStockQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Overrides each product's own threshold when set.
    pub threshold: Option<i32>,
}

impl LowStockQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::Uri;

    #[test]
    fn pagination_defaults_and_clamps() {
        let p = Pagination {
            page: None,
            per_page: None,
        };
        assert_eq!(p.normalize(), (1, 20, 0));

        let p = Pagination {
            page: Some(0),
            per_page: Some(1000),
        };
        assert_eq!(p.normalize(), (1, 100, 0));

        let p = Pagination {
            page: Some(3),
            per_page: Some(10),
        };
        assert_eq!(p.normalize(), (3, 10, 20));
    }

    #[test]
    fn order_list_query_accepts_numeric_params() {
        let uri: Uri = "/api/orders?page=2&per_page=10&status=pending"
            .parse()
            .unwrap();
        let Query(query) = Query::<OrderListQuery>::try_from_uri(&uri).unwrap();
        assert_eq!(query.pagination().normalize(), (2, 10, 10));
        assert_eq!(query.status.as_deref(), Some("pending"));
    }

    #[test]
    fn product_query_accepts_numeric_params() {
        let uri: Uri = "/api/products?page=1&min_price=100&sort_by=price&sort_order=asc"
            .parse()
            .unwrap();
        let Query(query) = Query::<ProductQuery>::try_from_uri(&uri).unwrap();
        assert_eq!(query.pagination().normalize(), (1, 20, 0));
        assert_eq!(query.min_price, Some(100));
        assert!(matches!(query.sort_by, Some(ProductSortBy::Price)));
        assert!(matches!(query.sort_order, Some(SortOrder::Asc)));
    }

    #[test]
    fn admin_queries_accept_numeric_params() {
        let user_id = Uuid::new_v4();
        let uri: Uri = format!("/api/admin/orders?page=3&user_id={user_id}")
            .parse()
            .unwrap();
        let Query(query) = Query::<AdminOrderListQuery>::try_from_uri(&uri).unwrap();
        assert_eq!(query.pagination().normalize().0, 3);
        assert_eq!(query.user_id, Some(user_id));

        let uri: Uri = "/api/admin/inventory/low-stock?threshold=3&page=2"
            .parse()
            .unwrap();
        let Query(query) = Query::<LowStockQuery>::try_from_uri(&uri).unwrap();
        assert_eq!(query.threshold, Some(3));
        assert_eq!(query.pagination().normalize().0, 2);
    }
}
