//! Purchase-notification fan-out.
//!
//! Runs after the purchase record is durably stored. Recipients are every
//! user holding a push token; dispatch is sequential and best-effort. A
//! failed send is logged and skipped, and never fails the request.

use salespulse_core::Purchase;
use sqlx::SqlitePool;

use crate::db::UserRepository;
use crate::services::push::{PushMessage, PushSender};

/// Announce a freshly-logged purchase to every user with a token.
pub async fn announce_purchase(pool: &SqlitePool, sender: &dyn PushSender, purchase: &Purchase) {
    let users = match UserRepository::new(pool).with_tokens().await {
        Ok(users) => users,
        Err(e) => {
            tracing::warn!("Skipping purchase notifications, user lookup failed: {e}");
            return;
        }
    };

    let title = if purchase.is_trial {
        format!("New Trial - {}", purchase.app_name)
    } else {
        format!("New Purchase - {}", purchase.app_name)
    };
    let body = if purchase.is_trial {
        match &purchase.trial_period {
            Some(period) => format!("Started {period} trial for {}", purchase.kind),
            None => format!("Started trial for {}", purchase.kind),
        }
    } else {
        let amount = purchase.price_formatted.clone().unwrap_or_else(|| {
            format!("{:.2} {}", purchase.price, purchase.currency_code)
        });
        format!("Purchased {} for {amount}", purchase.kind)
    };

    let mut sent = 0_usize;
    for user in &users {
        let Some(token) = &user.user_token else {
            continue;
        };
        let message = PushMessage::purchase_event(token.clone(), title.clone(), body.clone());
        match sender.send(&message).await {
            Ok(()) => sent += 1,
            Err(e) => {
                tracing::warn!(token = %token, "Push notification failed: {e}");
            }
        }
    }

    tracing::info!(
        app = %purchase.app_name,
        recipients = users.len(),
        sent,
        "Purchase notifications dispatched"
    );
}
