use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};

/// The user/credit store consulted around each generate or edit call.
#[async_trait]
pub trait CreditStore: Send + Sync {
    /// Takes one credit up front and returns what is left, or `NoCredits`.
    async fn reserve(&self, email: &str) -> Result<u32>;
    /// Gives back a credit taken by `reserve` when the request failed.
    async fn refund(&self, email: &str) -> Result<u32>;
}

#[derive(Debug, Clone)]
pub struct Account {
    pub credits: u32,
    pub updated_at: DateTime<Utc>,
}

/// Process-local credit ledger. Unknown users start on the free allotment.
pub struct InMemoryCredits {
    accounts: RwLock<HashMap<String, Account>>,
    free_credits: u32,
}

impl InMemoryCredits {
    pub fn new(free_credits: u32) -> Self {
        Self { accounts: RwLock::default(), free_credits }
    }

    pub fn with_account(self, email: &str, credits: u32) -> Self {
        self.accounts.write().insert(email.trim().to_lowercase(), Account { credits, updated_at: Utc::now() });
        self
    }

    pub fn account(&self, email: &str) -> Option<Account> {
        self.accounts.read().get(&email.trim().to_lowercase()).cloned()
    }
}

fn account_key(email: &str) -> Result<String> {
    let key = email.trim().to_lowercase();
    if key.is_empty() {
        return Err(AppError::InvalidRequest("userEmail is required".into()));
    }
    Ok(key)
}

#[async_trait]
impl CreditStore for InMemoryCredits {
    async fn reserve(&self, email: &str) -> Result<u32> {
        let key = account_key(email)?;
        let mut guard = self.accounts.write();
        let account = guard.entry(key.clone()).or_insert_with(|| Account { credits: self.free_credits, updated_at: Utc::now() });
        if account.credits == 0 {
            warn!("💳 {} has no credits left (last change {})", key, account.updated_at.to_rfc3339());
            return Err(AppError::NoCredits(key));
        }
        debug!("💳 {} last charged at {}", key, account.updated_at.to_rfc3339());
        account.credits -= 1;
        account.updated_at = Utc::now();
        info!("💳 {} reserved a credit, {} left", key, account.credits);
        Ok(account.credits)
    }

    async fn refund(&self, email: &str) -> Result<u32> {
        let key = account_key(email)?;
        let mut guard = self.accounts.write();
        let account = guard.entry(key.clone()).or_insert_with(|| Account { credits: self.free_credits, updated_at: Utc::now() });
        account.credits = account.credits.saturating_add(1);
        account.updated_at = Utc::now();
        info!("💳 {} refunded a credit, {} left", key, account.credits);
        Ok(account.credits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn new_users_get_the_free_allotment() {
        let credits = InMemoryCredits::new(3);
        assert_eq!(credits.reserve("New@Example.com ").await, Ok(2));
        assert_eq!(credits.account("new@example.com").map(|a| a.credits), Some(2));
    }

    #[tokio::test]
    async fn empty_accounts_are_rejected() {
        let credits = InMemoryCredits::new(5).with_account("paid@example.com", 1);
        assert_eq!(credits.reserve("paid@example.com").await, Ok(0));
        assert_eq!(credits.reserve("paid@example.com").await, Err(AppError::NoCredits("paid@example.com".into())));
    }

    #[tokio::test]
    async fn refund_restores_a_reserved_credit() {
        let credits = InMemoryCredits::new(5).with_account("paid@example.com", 1);
        let before = credits.account("paid@example.com").unwrap().updated_at;
        credits.reserve("paid@example.com").await.unwrap();
        assert_eq!(credits.refund("paid@example.com").await, Ok(1));

        let account = credits.account("paid@example.com").unwrap();
        assert_eq!(account.credits, 1);
        assert!(account.updated_at >= before);
    }

    #[tokio::test]
    async fn blank_email_is_invalid() {
        let credits = InMemoryCredits::new(5);
        assert_eq!(credits.reserve("  ").await.unwrap_err().kind(), "invalid_request");
        assert!(credits.account("").is_none());
    }
}
