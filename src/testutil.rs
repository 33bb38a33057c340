//! Shared in-memory fakes for the collaborator traits.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::{DeliveryError, HoldingsError, MarketDataError};
use crate::gateway::MessagingGateway;
use crate::holdings::HoldingsStore;
use crate::market::MarketDataAggregator;
use crate::model::{Holding, PriceSnapshot, SecurityType, UserRef};

pub fn holding(ticker: Option<&str>, isin: Option<&str>, security_type: SecurityType) -> Holding {
    Holding {
        ticker: ticker.map(str::to_owned),
        isin: isin.map(str::to_owned),
        security_type,
        name: ticker.unwrap_or("unnamed").to_owned(),
    }
}

#[derive(Default)]
pub struct MemoryHoldings {
    pub users: Vec<UserRef>,
    pub holdings: HashMap<i64, Vec<Holding>>,
    pub identities: HashMap<i64, i64>,
    pub fail_user_listing: bool,
    pub fail_holdings_for: HashSet<i64>,
    pub user_listing_calls: AtomicUsize,
}

impl MemoryHoldings {
    pub fn with_user(mut self, user_id: i64, chat_id: Option<i64>, holdings: Vec<Holding>) -> Self {
        self.users.push(UserRef { id: user_id });
        self.holdings.insert(user_id, holdings);
        if let Some(chat_id) = chat_id {
            self.identities.insert(user_id, chat_id);
        }
        self
    }
}

impl HoldingsStore for MemoryHoldings {
    fn list_users_with_holdings(
        &self,
    ) -> BoxFuture<'_, Result<Vec<UserRef>, Report<HoldingsError>>> {
        Box::pin(async move {
            self.user_listing_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_user_listing {
                return Err(Report::new(HoldingsError::Query));
            }
            Ok(self.users.clone())
        })
    }

    fn list_holdings(
        &self,
        user_id: i64,
        _active_only: bool,
    ) -> BoxFuture<'_, Result<Vec<Holding>, Report<HoldingsError>>> {
        Box::pin(async move {
            if self.fail_holdings_for.contains(&user_id) {
                return Err(Report::new(HoldingsError::Query));
            }
            Ok(self.holdings.get(&user_id).cloned().unwrap_or_default())
        })
    }

    fn resolve_messaging_identity(
        &self,
        user_id: i64,
    ) -> BoxFuture<'_, Result<Option<i64>, Report<HoldingsError>>> {
        Box::pin(async move { Ok(self.identities.get(&user_id).copied()) })
    }
}

#[derive(Default)]
pub struct ScriptedAggregator {
    snapshots: Mutex<HashMap<String, Vec<PriceSnapshot>>>,
    pub fail_for: HashSet<String>,
}

impl ScriptedAggregator {
    pub fn set_price(&self, ticker: &str, price: f64) {
        self.snapshots.lock().unwrap().insert(
            ticker.to_owned(),
            vec![PriceSnapshot {
                ticker: ticker.to_owned(),
                last_price: Some(price),
                provider: "test".to_owned(),
                fetched_at: Utc::now(),
            }],
        );
    }

    pub fn set_snapshots(&self, ticker: &str, snapshots: Vec<PriceSnapshot>) {
        self.snapshots
            .lock()
            .unwrap()
            .insert(ticker.to_owned(), snapshots);
    }
}

impl MarketDataAggregator for ScriptedAggregator {
    fn get_snapshots(
        &self,
        ticker: &str,
    ) -> BoxFuture<'_, Result<Vec<PriceSnapshot>, Report<MarketDataError>>> {
        let ticker = ticker.to_owned();
        Box::pin(async move {
            if self.fail_for.contains(&ticker) {
                return Err(Report::new(MarketDataError::Request {
                    provider: "test".to_owned(),
                }));
            }
            Ok(self
                .snapshots
                .lock()
                .unwrap()
                .get(&ticker)
                .cloned()
                .unwrap_or_default())
        })
    }
}

#[derive(Default)]
pub struct RecordingGateway {
    pub sent: Mutex<Vec<(i64, String)>>,
    pub fail_chats: HashSet<i64>,
}

impl RecordingGateway {
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl MessagingGateway for RecordingGateway {
    fn send(&self, chat_id: i64, text: &str) -> BoxFuture<'_, Result<(), Report<DeliveryError>>> {
        let text = text.to_owned();
        Box::pin(async move {
            if self.fail_chats.contains(&chat_id) {
                return Err(Report::new(DeliveryError::Rejected));
            }
            self.sent.lock().unwrap().push((chat_id, text));
            Ok(())
        })
    }
}
