use std::time::Duration;

use marketplace_order_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{cart::AddToCartRequest, orders::CheckoutRequest, products::RestockRequest},
    error::AppError,
    lifecycle::Transition,
    middleware::auth::AuthUser,
    services::{admin_service, cart_service, order_service},
    state::AppState,
};
use sqlx::PgPool;
use uuid::Uuid;

// Each test seeds its own users, products and addresses with unique names so
// the suite can run in parallel against one database.

async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(None);
            }
        };

    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;
    let pool = create_pool(&database_url).await?;

    let config = AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 0,
        review_reminder_delay_secs: 0,
    };

    Ok(Some(AppState { pool, orm, config }))
}

async fn create_user(pool: &PgPool, role: &str) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, password_hash, role) VALUES ($1, $2, 'dummy', $3)")
        .bind(id)
        .bind(format!("{role}-{id}@example.com"))
        .bind(role)
        .execute(pool)
        .await?;
    Ok(AuthUser {
        user_id: id,
        role: role.into(),
    })
}

async fn create_product(
    pool: &PgPool,
    price: i64,
    stock: i32,
    threshold: i32,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO products (id, name, description, price, stock, low_stock_threshold)
        VALUES ($1, $2, 'test product', $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(format!("Widget {id}"))
    .bind(price)
    .bind(stock)
    .bind(threshold)
    .execute(pool)
    .await?;
    Ok(id)
}

async fn create_address(pool: &PgPool, user: &AuthUser) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO addresses (id, user_id, full_name, phone, line, city, region)
        VALUES ($1, $2, 'Test Buyer', '+237600000000', '12 Main St', 'Douala', 'Littoral')
        "#,
    )
    .bind(id)
    .bind(user.user_id)
    .execute(pool)
    .await?;
    Ok(id)
}

async fn product_stock(pool: &PgPool, id: Uuid) -> anyhow::Result<(i32, String)> {
    let row: (i32, String) = sqlx::query_as("SELECT stock, status FROM products WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(row)
}

#[tokio::test]
async fn checkout_creates_confirmed_order_and_moves_stock() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user = create_user(&state.pool, "user").await?;
    let product_id = create_product(&state.pool, 1_000, 10, 2).await?;
    let address_id = create_address(&state.pool, &user).await?;

    cart_service::add_to_cart(
        &state.pool,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 2,
        },
    )
    .await?;

    let resp = order_service::create_from_cart(
        &state,
        &user,
        CheckoutRequest {
            address_id,
            payment_mode: None,
            customer_note: Some("ring the bell".into()),
        },
    )
    .await?;

    let detail = resp.data.unwrap();
    assert_eq!(detail.order.status, "confirmed");
    assert_eq!(detail.order.total_amount, 2_000);
    assert_eq!(detail.order.ship_to_city, "Douala");
    assert_eq!(detail.lines.len(), 1);
    assert_eq!(detail.lines[0].quantity, 2);
    assert_eq!(detail.lines[0].unit_price, 1_000);

    let payment = detail.payment.expect("payment created at checkout");
    assert_eq!(payment.mode, "delivery");
    assert_eq!(payment.status, "pending");
    assert_eq!(payment.amount, 2_000);

    let (stock, _) = product_stock(&state.pool, product_id).await?;
    assert_eq!(stock, 8);

    let cart_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(cart_count.0, 0, "cart is emptied by checkout");

    let movement: (String, i32, i32, i32) = sqlx::query_as(
        "SELECT kind, quantity, stock_before, stock_after FROM stock_movements WHERE product_id = $1",
    )
    .bind(product_id)
    .fetch_one(&state.pool)
    .await?;
    assert_eq!(movement, ("out".into(), 2, 10, 8));

    Ok(())
}

#[tokio::test]
async fn checkout_with_empty_cart_is_rejected() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user = create_user(&state.pool, "user").await?;
    let address_id = create_address(&state.pool, &user).await?;

    let err = order_service::create_from_cart(
        &state,
        &user,
        CheckoutRequest {
            address_id,
            payment_mode: None,
            customer_note: None,
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::EmptyCart));
    Ok(())
}

// One line failing validation must leave no order, no payment, no movement
// and an untouched cart behind.
#[tokio::test]
async fn insufficient_stock_rolls_back_everything() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user = create_user(&state.pool, "user").await?;
    let plenty = create_product(&state.pool, 500, 100, 2).await?;
    let scarce = create_product(&state.pool, 800, 5, 2).await?;
    let address_id = create_address(&state.pool, &user).await?;

    for (product_id, quantity) in [(plenty, 3), (scarce, 4)] {
        cart_service::add_to_cart(
            &state.pool,
            &user,
            AddToCartRequest {
                product_id,
                quantity,
            },
        )
        .await?;
    }

    // Someone else buys the scarce product before this user checks out.
    sqlx::query("UPDATE products SET stock = 1 WHERE id = $1")
        .bind(scarce)
        .execute(&state.pool)
        .await?;

    let err = order_service::create_from_cart(
        &state,
        &user,
        CheckoutRequest {
            address_id,
            payment_mode: None,
            customer_note: None,
        },
    )
    .await
    .unwrap_err();

    match err {
        AppError::InsufficientStock {
            available,
            requested,
            ..
        } => {
            assert_eq!(available, 1);
            assert_eq!(requested, 4);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let orders: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(orders.0, 0);

    let (plenty_stock, _) = product_stock(&state.pool, plenty).await?;
    assert_eq!(plenty_stock, 100, "the passing line was rolled back too");

    let cart_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(cart_count.0, 2, "cart survives a failed checkout");

    let movements: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM stock_movements WHERE product_id = $1 OR product_id = $2",
    )
    .bind(plenty)
    .bind(scarce)
    .fetch_one(&state.pool)
    .await?;
    assert_eq!(movements.0, 0, "no ledger rows from the aborted checkout");

    Ok(())
}

#[tokio::test]
async fn cancel_restores_stock_with_return_movement() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user = create_user(&state.pool, "user").await?;
    let product_id = create_product(&state.pool, 2_500, 6, 2).await?;
    let address_id = create_address(&state.pool, &user).await?;

    cart_service::add_to_cart(
        &state.pool,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 4,
        },
    )
    .await?;

    let order = order_service::create_from_cart(
        &state,
        &user,
        CheckoutRequest {
            address_id,
            payment_mode: None,
            customer_note: None,
        },
    )
    .await?
    .data
    .unwrap()
    .order;

    let (stock, _) = product_stock(&state.pool, product_id).await?;
    assert_eq!(stock, 2);

    let cancelled = order_service::cancel(&state, &user, order.id).await?;
    assert_eq!(cancelled.data.unwrap().order.status, "cancelled");

    let (stock, status) = product_stock(&state.pool, product_id).await?;
    assert_eq!(stock, 6);
    assert_eq!(status, "active");

    let kinds: Vec<(String,)> = sqlx::query_as(
        "SELECT kind FROM stock_movements WHERE product_id = $1 ORDER BY created_at",
    )
    .bind(product_id)
    .fetch_all(&state.pool)
    .await?;
    let kinds: Vec<&str> = kinds.iter().map(|(k,)| k.as_str()).collect();
    assert_eq!(kinds, ["out", "return"]);

    // A cancelled order cannot be cancelled again.
    let err = order_service::cancel(&state, &user, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    Ok(())
}

#[tokio::test]
async fn cancel_restores_every_line_of_a_multi_product_order() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user = create_user(&state.pool, "user").await?;
    let first = create_product(&state.pool, 1_200, 9, 2).await?;
    let second = create_product(&state.pool, 3_400, 7, 2).await?;
    let address_id = create_address(&state.pool, &user).await?;

    for (product_id, quantity) in [(first, 3), (second, 5)] {
        cart_service::add_to_cart(
            &state.pool,
            &user,
            AddToCartRequest {
                product_id,
                quantity,
            },
        )
        .await?;
    }

    let order = order_service::create_from_cart(
        &state,
        &user,
        CheckoutRequest {
            address_id,
            payment_mode: None,
            customer_note: None,
        },
    )
    .await?
    .data
    .unwrap()
    .order;

    order_service::cancel(&state, &user, order.id).await?;

    let (first_stock, _) = product_stock(&state.pool, first).await?;
    let (second_stock, _) = product_stock(&state.pool, second).await?;
    assert_eq!(first_stock, 9);
    assert_eq!(second_stock, 7);

    for product_id in [first, second] {
        let returns: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM stock_movements WHERE product_id = $1 AND kind = 'return'",
        )
        .bind(product_id)
        .fetch_one(&state.pool)
        .await?;
        assert_eq!(returns.0, 1, "one return movement per line");
    }

    Ok(())
}

#[tokio::test]
async fn cancelling_someone_elses_order_is_forbidden() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let owner = create_user(&state.pool, "user").await?;
    let stranger = create_user(&state.pool, "user").await?;
    let product_id = create_product(&state.pool, 1_000, 3, 1).await?;
    let address_id = create_address(&state.pool, &owner).await?;

    cart_service::add_to_cart(
        &state.pool,
        &owner,
        AddToCartRequest {
            product_id,
            quantity: 1,
        },
    )
    .await?;
    let order = order_service::create_from_cart(
        &state,
        &owner,
        CheckoutRequest {
            address_id,
            payment_mode: None,
            customer_note: None,
        },
    )
    .await?
    .data
    .unwrap()
    .order;

    let err = order_service::cancel(&state, &stranger, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    Ok(())
}

#[tokio::test]
async fn full_lifecycle_reaches_delivered_and_rejects_repeats() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user = create_user(&state.pool, "user").await?;
    let admin = create_user(&state.pool, "admin").await?;
    let product_id = create_product(&state.pool, 10_000, 20, 2).await?;
    let address_id = create_address(&state.pool, &user).await?;

    cart_service::add_to_cart(
        &state.pool,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 1,
        },
    )
    .await?;
    let order = order_service::create_from_cart(
        &state,
        &user,
        CheckoutRequest {
            address_id,
            payment_mode: None,
            customer_note: None,
        },
    )
    .await?
    .data
    .unwrap()
    .order;

    for event in [Transition::Prepare, Transition::Ship, Transition::Deliver] {
        order_service::apply_transition(&state, &admin, order.id, event).await?;
    }

    let delivered = order_service::get_order(&state, &user, order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(delivered.order.status, "delivered");
    assert!(delivered.order.delivered_at.is_some());

    // Pay-on-delivery settles when the order is handed over.
    let payment = delivered.payment.unwrap();
    assert_eq!(payment.status, "succeeded");
    assert!(payment.paid_at.is_some());

    // The review reminder lands once the dispatcher has run.
    let mut reminded = false;
    for _ in 0..20 {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND kind = 'review'",
        )
        .bind(user.user_id)
        .fetch_one(&state.pool)
        .await?;
        if count.0 > 0 {
            reminded = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(reminded, "expected a review reminder notification");

    // Terminal: shipping it again must fail.
    let err = order_service::apply_transition(&state, &admin, order.id, Transition::Ship)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    // Regular users cannot drive the lifecycle.
    let err = order_service::apply_transition(&state, &user, order.id, Transition::Confirm)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    Ok(())
}

// Two checkouts racing for the last units: exactly one wins.
#[tokio::test]
async fn concurrent_checkouts_cannot_oversell() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let alice = create_user(&state.pool, "user").await?;
    let bob = create_user(&state.pool, "user").await?;
    let product_id = create_product(&state.pool, 700, 3, 1).await?;
    let alice_address = create_address(&state.pool, &alice).await?;
    let bob_address = create_address(&state.pool, &bob).await?;

    for user in [&alice, &bob] {
        cart_service::add_to_cart(
            &state.pool,
            user,
            AddToCartRequest {
                product_id,
                quantity: 2,
            },
        )
        .await?;
    }

    let (first, second) = tokio::join!(
        order_service::create_from_cart(
            &state,
            &alice,
            CheckoutRequest {
                address_id: alice_address,
                payment_mode: None,
                customer_note: None,
            },
        ),
        order_service::create_from_cart(
            &state,
            &bob,
            CheckoutRequest {
                address_id: bob_address,
                payment_mode: None,
                customer_note: None,
            },
        ),
    );

    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one of the racing checkouts wins");

    let loser = if first.is_err() { first } else { second };
    assert!(matches!(
        loser.unwrap_err(),
        AppError::InsufficientStock { .. }
    ));

    let (stock, _) = product_stock(&state.pool, product_id).await?;
    assert_eq!(stock, 1);

    Ok(())
}

// Order lines keep the price that was current when the item was added to
// the cart and the name that was current at checkout, whatever the catalog
// says later.
#[tokio::test]
async fn catalog_edits_do_not_move_existing_lines() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user = create_user(&state.pool, "user").await?;
    let product_id = create_product(&state.pool, 1_000, 10, 2).await?;
    let address_id = create_address(&state.pool, &user).await?;

    cart_service::add_to_cart(
        &state.pool,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 3,
        },
    )
    .await?;

    sqlx::query("UPDATE products SET price = 9999 WHERE id = $1")
        .bind(product_id)
        .execute(&state.pool)
        .await?;

    let detail = order_service::create_from_cart(
        &state,
        &user,
        CheckoutRequest {
            address_id,
            payment_mode: None,
            customer_note: None,
        },
    )
    .await?
    .data
    .unwrap();

    assert_eq!(detail.lines[0].unit_price, 1_000);
    assert_eq!(detail.order.total_amount, 3_000);
    let sold_as = detail.lines[0].product_name.clone();

    // Renaming the product after the sale must not rewrite history.
    sqlx::query("UPDATE products SET name = $2 WHERE id = $1")
        .bind(product_id)
        .bind(format!("Renamed {product_id}"))
        .execute(&state.pool)
        .await?;

    let reloaded = order_service::get_order(&state, &user, detail.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(reloaded.lines[0].product_name, sold_as);

    Ok(())
}

#[tokio::test]
async fn sellout_flips_status_and_restock_flips_it_back() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user = create_user(&state.pool, "user").await?;
    let admin = create_user(&state.pool, "admin").await?;
    let product_id = create_product(&state.pool, 400, 2, 1).await?;
    let address_id = create_address(&state.pool, &user).await?;

    cart_service::add_to_cart(
        &state.pool,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 2,
        },
    )
    .await?;
    order_service::create_from_cart(
        &state,
        &user,
        CheckoutRequest {
            address_id,
            payment_mode: None,
            customer_note: None,
        },
    )
    .await?;

    let (stock, status) = product_stock(&state.pool, product_id).await?;
    assert_eq!(stock, 0);
    assert_eq!(status, "out_of_stock");

    admin_service::restock(
        &state,
        &admin,
        product_id,
        RestockRequest {
            quantity: 5,
            note: Some("supplier delivery".into()),
        },
    )
    .await?;

    let (stock, status) = product_stock(&state.pool, product_id).await?;
    assert_eq!(stock, 5);
    assert_eq!(status, "active");

    Ok(())
}
