use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        addresses::{AddressList, CreateAddressRequest},
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartItemDto, CartList},
        notifications::NotificationList,
        orders::{CheckoutRequest, OrderDetail, OrderList},
        products::{
            AdjustStockRequest, CreateProductRequest, ProductList, RestockRequest,
            RestockResponse, StockMovementList, UpdateProductRequest,
        },
    },
    models::{Address, CartItem, Notification, Order, OrderLine, Payment, Product, StockMovement, User},
    response::{ApiResponse, Meta},
    routes::{
        addresses, admin, auth, cart, health, notifications, orders, params,
        products as product_routes,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        addresses::list_addresses,
        addresses::create_address,
        addresses::delete_address,
        product_routes::list_products,
        product_routes::create_product,
        product_routes::get_product,
        product_routes::update_product,
        product_routes::delete_product,
        orders::checkout,
        orders::list_orders,
        orders::get_order,
        orders::cancel_order,
        notifications::list_notifications,
        notifications::mark_read,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::transition_order,
        admin::list_low_stock,
        admin::restock,
        admin::adjust_stock,
        admin::list_movements
    ),
    components(
        schemas(
            User,
            Address,
            Product,
            CartItem,
            Order,
            OrderLine,
            Payment,
            StockMovement,
            Notification,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CreateAddressRequest,
            AddressList,
            AddToCartRequest,
            CartItemDto,
            CartList,
            CheckoutRequest,
            OrderDetail,
            OrderList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            RestockRequest,
            AdjustStockRequest,
            RestockResponse,
            StockMovementList,
            NotificationList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::AdminOrderListQuery,
            params::LowStockQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderDetail>,
            ApiResponse<OrderList>,
            ApiResponse<CartList>,
            ApiResponse<NotificationList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Product endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Addresses", description = "Shipping address endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Notifications", description = "Notification endpoints"),
        (name = "Admin", description = "Admin endpoints"),
        (name = "Auth", description = "Authentication endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
