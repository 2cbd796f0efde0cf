//! Post-commit fan-out of order lifecycle events.
//!
//! The order service emits these events explicitly after its transaction has
//! committed; nothing here runs inside a database transaction and nothing
//! here can fail the mutation that triggered it. Every sink failure is
//! logged and swallowed.

use std::future::Future;
use std::time::Duration;

use uuid::Uuid;

use crate::{db::DbPool, error::AppResult, models::NotificationKind, state::AppState};

#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// An order moved from pending to confirmed.
    OrderConfirmed {
        order_id: Uuid,
        short_reference: String,
        user_id: Option<Uuid>,
        total_amount: i64,
    },
    /// An order was delivered; the customer gets a review reminder.
    OrderDelivered {
        order_id: Uuid,
        short_reference: String,
        user_id: Option<Uuid>,
    },
    /// A stock decrement left the product at or below its alert threshold.
    LowStock {
        product_id: Uuid,
        name: String,
        stock: i32,
        threshold: i32,
    },
}

/// Where notifications end up. The concrete transport is pluggable; the
/// production sink persists in-app notification rows and hands email off to
/// the mailer.
pub trait NotificationSink {
    fn notify_user(
        &self,
        user_id: Uuid,
        title: &str,
        body: &str,
        kind: NotificationKind,
        link: Option<&str>,
    ) -> impl Future<Output = AppResult<()>> + Send;

    fn send_email(
        &self,
        user_id: Uuid,
        subject: &str,
        body: &str,
    ) -> impl Future<Output = AppResult<()>> + Send;
}

/// Sink backed by the `notifications` table. Email delivery mechanics live
/// outside this core; the send is recorded in the log and handed off.
pub struct PgSink {
    pool: DbPool,
}

impl PgSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl NotificationSink for PgSink {
    async fn notify_user(
        &self,
        user_id: Uuid,
        title: &str,
        body: &str,
        kind: NotificationKind,
        link: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, title, body, kind, link)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .bind(body)
        .bind(kind.as_str())
        .bind(link)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn send_email(&self, user_id: Uuid, subject: &str, body: &str) -> AppResult<()> {
        let email: Option<(String,)> = sqlx::query_as("SELECT email FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        match email {
            Some((address,)) => {
                tracing::info!(to = %address, subject = %subject, bytes = body.len(), "email handed to mailer");
            }
            None => {
                tracing::warn!(user_id = %user_id, "email skipped, user no longer exists");
            }
        }
        Ok(())
    }
}

/// Deliver one event to every interested recipient. Failures are logged and
/// never propagated; one failed recipient does not stop the rest.
pub async fn fan_out<S: NotificationSink>(sink: &S, admins: &[Uuid], event: &DomainEvent) {
    match event {
        DomainEvent::OrderConfirmed {
            order_id,
            short_reference,
            user_id,
            total_amount,
        } => {
            let Some(user_id) = user_id else { return };
            let title = format!("Order #{short_reference} confirmed");
            let body = format!(
                "Your order #{short_reference} has been confirmed. Total: {total_amount} FCFA. \
                 We will let you know when it ships."
            );
            let link = format!("/orders/{order_id}");
            if let Err(err) = sink
                .notify_user(*user_id, &title, &body, NotificationKind::Order, Some(&link))
                .await
            {
                tracing::warn!(error = %err, order_id = %order_id, "confirmation notification failed");
            }
            if let Err(err) = sink.send_email(*user_id, &title, &body).await {
                tracing::warn!(error = %err, order_id = %order_id, "confirmation email failed");
            }
        }
        DomainEvent::OrderDelivered {
            order_id,
            short_reference,
            user_id,
        } => {
            let Some(user_id) = user_id else { return };
            let title = format!("How was your order #{short_reference}?");
            let body = format!(
                "Your order #{short_reference} was delivered. Leave a review to help other buyers."
            );
            let link = format!("/orders/{order_id}/review");
            if let Err(err) = sink
                .notify_user(*user_id, &title, &body, NotificationKind::Review, Some(&link))
                .await
            {
                tracing::warn!(error = %err, order_id = %order_id, "review reminder failed");
            }
        }
        DomainEvent::LowStock {
            product_id,
            name,
            stock,
            threshold,
        } => {
            let title = format!("Low stock: {name}");
            let body = format!("\"{name}\" is down to {stock} (alert threshold {threshold}).");
            let link = format!("/admin/inventory/{product_id}/movements");
            for admin_id in admins {
                if let Err(err) = sink
                    .notify_user(*admin_id, &title, &body, NotificationKind::Stock, Some(&link))
                    .await
                {
                    tracing::warn!(error = %err, admin_id = %admin_id, "low stock alert failed");
                }
            }
        }
    }
}

/// Fire-and-forget dispatch, called after the triggering transaction has
/// committed. Spawns one task per event so a slow recipient cannot hold up
/// the others.
pub fn dispatch(state: &AppState, events: Vec<DomainEvent>) {
    for event in events {
        let state = state.clone();
        tokio::spawn(async move {
            if let DomainEvent::OrderDelivered { .. } = &event {
                let delay = state.config.review_reminder_delay_secs;
                if delay > 0 {
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                }
            }

            let admins = if matches!(event, DomainEvent::LowStock { .. }) {
                match admin_ids(&state.pool).await {
                    Ok(ids) => ids,
                    Err(err) => {
                        tracing::warn!(error = %err, "could not resolve admin recipients");
                        Vec::new()
                    }
                }
            } else {
                Vec::new()
            };

            let sink = PgSink::new(state.pool.clone());
            fan_out(&sink, &admins, &event).await;
        });
    }
}

async fn admin_ids(pool: &DbPool) -> AppResult<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE role = 'admin'")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        notifications: Mutex<Vec<(Uuid, String, NotificationKind, Option<String>)>>,
        emails: Mutex<Vec<(Uuid, String)>>,
        fail_emails: bool,
    }

    impl NotificationSink for RecordingSink {
        async fn notify_user(
            &self,
            user_id: Uuid,
            title: &str,
            _body: &str,
            kind: NotificationKind,
            link: Option<&str>,
        ) -> AppResult<()> {
            self.notifications.lock().unwrap().push((
                user_id,
                title.to_string(),
                kind,
                link.map(str::to_string),
            ));
            Ok(())
        }

        async fn send_email(&self, user_id: Uuid, subject: &str, _body: &str) -> AppResult<()> {
            if self.fail_emails {
                return Err(AppError::BadRequest("mailer down".into()));
            }
            self.emails
                .lock()
                .unwrap()
                .push((user_id, subject.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn confirmation_fans_out_to_notification_and_email() {
        let sink = RecordingSink::default();
        let user_id = Uuid::new_v4();
        let order_id = Uuid::new_v4();

        fan_out(
            &sink,
            &[],
            &DomainEvent::OrderConfirmed {
                order_id,
                short_reference: "1A2B3C4D".into(),
                user_id: Some(user_id),
                total_amount: 100_000,
            },
        )
        .await;

        let notifications = sink.notifications.lock().unwrap();
        assert_eq!(notifications.len(), 1);
        let (to, title, kind, link) = &notifications[0];
        assert_eq!(*to, user_id);
        assert!(title.contains("1A2B3C4D"));
        assert_eq!(*kind, NotificationKind::Order);
        assert_eq!(link.as_deref(), Some(format!("/orders/{order_id}").as_str()));

        let emails = sink.emails.lock().unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].0, user_id);
    }

    #[tokio::test]
    async fn delivery_sends_review_reminder() {
        let sink = RecordingSink::default();
        let user_id = Uuid::new_v4();

        fan_out(
            &sink,
            &[],
            &DomainEvent::OrderDelivered {
                order_id: Uuid::new_v4(),
                short_reference: "AABBCCDD".into(),
                user_id: Some(user_id),
            },
        )
        .await;

        let notifications = sink.notifications.lock().unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].2, NotificationKind::Review);
    }

    #[tokio::test]
    async fn low_stock_alerts_every_admin() {
        let sink = RecordingSink::default();
        let admins = [Uuid::new_v4(), Uuid::new_v4()];

        fan_out(
            &sink,
            &admins,
            &DomainEvent::LowStock {
                product_id: Uuid::new_v4(),
                name: "Ferris Mug".into(),
                stock: 2,
                threshold: 5,
            },
        )
        .await;

        let notifications = sink.notifications.lock().unwrap();
        assert_eq!(notifications.len(), 2);
        assert!(notifications.iter().all(|n| n.2 == NotificationKind::Stock));
    }

    #[tokio::test]
    async fn sink_failure_is_swallowed() {
        let sink = RecordingSink {
            fail_emails: true,
            ..Default::default()
        };

        // Must not panic or propagate; the in-app notification still lands.
        fan_out(
            &sink,
            &[],
            &DomainEvent::OrderConfirmed {
                order_id: Uuid::new_v4(),
                short_reference: "DEADBEEF".into(),
                user_id: Some(Uuid::new_v4()),
                total_amount: 5_000,
            },
        )
        .await;

        assert_eq!(sink.notifications.lock().unwrap().len(), 1);
        assert!(sink.emails.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn events_for_deleted_customers_are_dropped() {
        let sink = RecordingSink::default();

        fan_out(
            &sink,
            &[],
            &DomainEvent::OrderConfirmed {
                order_id: Uuid::new_v4(),
                short_reference: "00000000".into(),
                user_id: None,
                total_amount: 0,
            },
        )
        .await;

        assert!(sink.notifications.lock().unwrap().is_empty());
        assert!(sink.emails.lock().unwrap().is_empty());
    }
}
