use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::gateway::MessagingGateway;
use crate::holdings::HoldingsStore;
use crate::model::PriceChange;

/// Formats detected price changes and delivers them through the messaging
/// gateway, one message per change, grouped by user.
pub struct ChangeNotifier {
    holdings: Arc<dyn HoldingsStore>,
    gateway: Arc<dyn MessagingGateway>,
    /// Pause between successive sends, even across users, to respect
    /// provider-side rate limits.
    send_delay: Duration,
}

impl ChangeNotifier {
    pub fn new(
        holdings: Arc<dyn HoldingsStore>,
        gateway: Arc<dyn MessagingGateway>,
        send_delay: Duration,
    ) -> Self {
        Self {
            holdings,
            gateway,
            send_delay,
        }
    }

    /// Deliver notifications for `changes`, returning how many sends
    /// succeeded. A user without a resolvable messaging identity loses the
    /// whole group; an individual delivery failure loses only that message.
    pub async fn dispatch(&self, changes: &[PriceChange]) -> usize {
        if changes.is_empty() {
            return 0;
        }

        let mut sent = 0;

        for (user_id, group) in group_by_user(changes) {
            let chat_id = match self.holdings.resolve_messaging_identity(user_id).await {
                Ok(Some(chat_id)) => chat_id,
                Ok(None) => {
                    warn!(user_id, "no messaging identity on file, skipping notifications");
                    continue;
                }
                Err(e) => {
                    warn!(user_id, error = ?e, "identity lookup failed, skipping notifications");
                    continue;
                }
            };

            for change in group {
                match self.gateway.send(chat_id, &format_message(change)).await {
                    Ok(()) => {
                        info!(user_id, ticker = %change.ticker, "price change notification sent");
                        sent += 1;
                    }
                    Err(e) => {
                        warn!(
                            user_id,
                            ticker = %change.ticker,
                            error = ?e,
                            "failed to send notification"
                        );
                    }
                }

                sleep(self.send_delay).await;
            }
        }

        info!(sent, "notification dispatch complete");
        sent
    }
}

/// Group changes by user id, preserving first-seen user order and the
/// relative order of changes within each group.
fn group_by_user(changes: &[PriceChange]) -> Vec<(i64, Vec<&PriceChange>)> {
    let mut groups: Vec<(i64, Vec<&PriceChange>)> = Vec::new();

    for change in changes {
        match groups.iter_mut().find(|(id, _)| *id == change.user_id) {
            Some((_, group)) => group.push(change),
            None => groups.push((change.user_id, vec![change])),
        }
    }

    groups
}

fn format_message(change: &PriceChange) -> String {
    let sign = if change.change_pct >= 0.0 { "+" } else { "" };

    format!(
        "📈 <b>{kind} price change</b>\n\n\
         <b>{name}</b> ({ticker})\n\
         {sign}{pct:.2}% against the last observed price\n\n\
         💰 <b>Price:</b> {old:.2} → {new:.2}",
        kind = change.security_type.label(),
        name = change.name,
        ticker = change.ticker,
        pct = change.change_pct,
        old = change.old_price,
        new = change.new_price,
    )
}
