//! Credit balance repository.
//!
//! Debits go through a stored procedure so the decrement is atomic on the
//! database side; the client never read-modify-writes a balance.

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::client::LedgerClient;
use crate::error::{LedgerError, LedgerResult};

const USERS_TABLE: &str = "users";
const DEBIT_FUNCTION: &str = "decrement_credits";

#[derive(Debug, Deserialize)]
struct UserRow {
    #[allow(dead_code)]
    id: String,
    credits: u32,
}

/// Repository for user credit balances.
#[derive(Clone)]
pub struct CreditsRepository {
    client: LedgerClient,
}

impl CreditsRepository {
    pub fn new(client: LedgerClient) -> Self {
        Self { client }
    }

    /// Current credit balance; errors if the user row does not exist.
    pub async fn get_balance(&self, user_id: &str) -> LedgerResult<u32> {
        let mut rows: Vec<UserRow> = self.client.select(USERS_TABLE, "id", user_id).await?;
        rows.pop()
            .map(|r| r.credits)
            .ok_or_else(|| LedgerError::not_found(format!("user {}", user_id)))
    }

    /// Create the user row with a zero balance if it is missing.
    pub async fn ensure_user(&self, user_id: &str) -> LedgerResult<u32> {
        let rows: Vec<UserRow> = self.client.select(USERS_TABLE, "id", user_id).await?;
        if let Some(row) = rows.into_iter().next() {
            return Ok(row.credits);
        }

        let row: UserRow = self
            .client
            .insert(USERS_TABLE, &json!({"id": user_id, "credits": 0}))
            .await?;
        info!(user_id, "Created ledger row for new user");
        Ok(row.credits)
    }

    /// Atomically debit `amount` credits.
    ///
    /// Returns the remaining balance. A balance below `amount` surfaces as
    /// [`LedgerError::InsufficientCredits`] without changing the row.
    pub async fn debit(&self, user_id: &str, amount: u32) -> LedgerResult<u32> {
        let result: DebitResult = self
            .client
            .rpc(
                DEBIT_FUNCTION,
                &json!({"p_user_id": user_id, "p_amount": amount}),
            )
            .await?;

        if !result.success {
            warn!(user_id, amount, available = result.balance, "Debit refused");
            return Err(LedgerError::InsufficientCredits {
                available: result.balance,
                required: amount,
            });
        }

        info!(user_id, amount, remaining = result.balance, "Debited credits");
        Ok(result.balance)
    }
}

#[derive(Debug, Deserialize)]
struct DebitResult {
    success: bool,
    /// Remaining balance on success, untouched balance on refusal.
    balance: u32,
}
