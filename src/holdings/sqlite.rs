use std::path::Path;
use std::str::FromStr;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
};

use crate::error::HoldingsError;
use crate::holdings::HoldingsStore;
use crate::model::{Holding, SecurityType, UserRef};

pub struct SqliteHoldings {
    pool: SqlitePool,
}

impl SqliteHoldings {
    /// Open (or create) the holdings database at `path` and run migrations.
    pub async fn open(path: &Path) -> Result<Self, Report<HoldingsError>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .change_context(HoldingsError::Migration)
                .attach_with(|| format!("cannot create data directory: {}", parent.display()))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .change_context(HoldingsError::Migration)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(opts)
            .await
            .change_context(HoldingsError::Migration)
            .attach_with(|| format!("database path: {}", path.display()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .change_context(HoldingsError::Migration)?;

        Ok(Self { pool })
    }
}

impl HoldingsStore for SqliteHoldings {
    fn list_users_with_holdings(
        &self,
    ) -> BoxFuture<'_, Result<Vec<UserRef>, Report<HoldingsError>>> {
        Box::pin(async move {
            let rows: Vec<(i64,)> = sqlx::query_as(
                "SELECT DISTINCT u.id \
                 FROM users u \
                 JOIN holdings h ON h.user_id = u.id AND h.is_active = 1 \
                 ORDER BY u.id",
            )
            .fetch_all(&self.pool)
            .await
            .change_context(HoldingsError::Query)?;

            Ok(rows.into_iter().map(|(id,)| UserRef { id }).collect())
        })
    }

    fn list_holdings(
        &self,
        user_id: i64,
        active_only: bool,
    ) -> BoxFuture<'_, Result<Vec<Holding>, Report<HoldingsError>>> {
        Box::pin(async move {
            let sql = if active_only {
                "SELECT ticker, isin, security_type, normalized_name, raw_name \
                 FROM holdings WHERE user_id = ? AND is_active = 1 ORDER BY id"
            } else {
                "SELECT ticker, isin, security_type, normalized_name, raw_name \
                 FROM holdings WHERE user_id = ? ORDER BY id"
            };

            let rows: Vec<(Option<String>, Option<String>, Option<String>, Option<String>, String)> =
                sqlx::query_as(sql)
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await
                    .change_context(HoldingsError::Query)?;

            let holdings = rows
                .into_iter()
                .map(|(ticker, isin, security_type, normalized_name, raw_name)| Holding {
                    ticker,
                    isin,
                    security_type: SecurityType::from_store(security_type.as_deref()),
                    name: normalized_name.unwrap_or(raw_name),
                })
                .collect();

            Ok(holdings)
        })
    }

    fn resolve_messaging_identity(
        &self,
        user_id: i64,
    ) -> BoxFuture<'_, Result<Option<i64>, Report<HoldingsError>>> {
        Box::pin(async move {
            let row: Option<(Option<i64>,)> =
                sqlx::query_as("SELECT telegram_id FROM users WHERE id = ?")
                    .bind(user_id)
                    .fetch_optional(&self.pool)
                    .await
                    .change_context(HoldingsError::Query)?;

            Ok(row.and_then(|(telegram_id,)| telegram_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn in_memory_store() -> SqliteHoldings {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(opts).await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteHoldings { pool }
    }

    async fn insert_user(store: &SqliteHoldings, telegram_id: Option<i64>) -> i64 {
        let result = sqlx::query("INSERT INTO users (telegram_id, username) VALUES (?, ?)")
            .bind(telegram_id)
            .bind("tester")
            .execute(&store.pool)
            .await
            .unwrap();
        result.last_insert_rowid()
    }

    async fn insert_holding(
        store: &SqliteHoldings,
        user_id: i64,
        ticker: Option<&str>,
        isin: Option<&str>,
        security_type: Option<&str>,
        active: bool,
    ) {
        sqlx::query(
            "INSERT INTO holdings \
             (user_id, raw_name, normalized_name, ticker, isin, security_type, is_active) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind("Raw Name")
        .bind("Normalized Name")
        .bind(ticker)
        .bind(isin)
        .bind(security_type)
        .bind(active)
        .execute(&store.pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn lists_only_users_with_active_holdings() {
        let store = in_memory_store().await;
        let with_active = insert_user(&store, Some(100)).await;
        let inactive_only = insert_user(&store, Some(200)).await;
        let _empty = insert_user(&store, Some(300)).await;

        insert_holding(&store, with_active, Some("SBER"), None, Some("equity"), true).await;
        insert_holding(&store, inactive_only, Some("GAZP"), None, Some("equity"), false).await;

        let users = store.list_users_with_holdings().await.unwrap();
        assert_eq!(users, vec![UserRef { id: with_active }]);
    }

    #[tokio::test]
    async fn active_only_filters_inactive_holdings() {
        let store = in_memory_store().await;
        let user = insert_user(&store, Some(100)).await;
        insert_holding(&store, user, Some("SBER"), None, Some("equity"), true).await;
        insert_holding(&store, user, Some("GAZP"), None, Some("equity"), false).await;

        let active = store.list_holdings(user, true).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].ticker.as_deref(), Some("SBER"));

        let all = store.list_holdings(user, false).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn holding_row_maps_type_and_name() {
        let store = in_memory_store().await;
        let user = insert_user(&store, None).await;
        insert_holding(&store, user, Some("BND1"), Some("RU000A0001"), Some("bond"), true).await;

        let holdings = store.list_holdings(user, true).await.unwrap();
        assert_eq!(holdings[0].security_type, SecurityType::Bond);
        assert_eq!(holdings[0].name, "Normalized Name");
        assert_eq!(holdings[0].isin.as_deref(), Some("RU000A0001"));
    }

    #[tokio::test]
    async fn resolve_identity_handles_missing_cases() {
        let store = in_memory_store().await;
        let with_id = insert_user(&store, Some(4242)).await;
        let without_id = insert_user(&store, None).await;

        assert_eq!(
            store.resolve_messaging_identity(with_id).await.unwrap(),
            Some(4242)
        );
        assert_eq!(
            store.resolve_messaging_identity(without_id).await.unwrap(),
            None
        );
        assert_eq!(store.resolve_messaging_identity(9999).await.unwrap(), None);
    }
}
