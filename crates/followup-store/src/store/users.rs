//! Owners and where their reminders are sent.

use super::Store;
use async_trait::async_trait;
use followup_core::{error::FollowupError, record::Recipient, traits::IdentityProvider};

impl Store {
    /// Create or replace a user.
    pub async fn upsert_user(
        &self,
        id: &str,
        email: Option<&str>,
        name: Option<&str>,
    ) -> Result<(), FollowupError> {
        sqlx::query(
            "INSERT INTO users (id, email, name) VALUES (?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET email = excluded.email, name = excluded.name",
        )
        .bind(id)
        .bind(email)
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(|e| FollowupError::Store(format!("upsert user failed: {e}")))?;
        Ok(())
    }

    /// Change (or remove) a user's email. Returns `true` if the user exists.
    pub async fn set_user_email(
        &self,
        id: &str,
        email: Option<&str>,
    ) -> Result<bool, FollowupError> {
        let result = sqlx::query("UPDATE users SET email = ? WHERE id = ?")
            .bind(email)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| FollowupError::Store(format!("set user email failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl IdentityProvider for Store {
    async fn resolve_recipient(
        &self,
        owner_id: &str,
    ) -> Result<Option<Recipient>, FollowupError> {
        let row: Option<(Option<String>, Option<String>)> =
            sqlx::query_as("SELECT email, name FROM users WHERE id = ?")
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| FollowupError::Store(format!("resolve recipient failed: {e}")))?;

        Ok(row.and_then(|(email, name)| {
            let email = email?.trim().to_string();
            if email.is_empty() {
                return None;
            }
            Some(Recipient { email, name })
        }))
    }
}
