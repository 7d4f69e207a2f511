//! Conversation and message repository.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use super::{DbError, Result};

/// Auto-generated titles are cut at this many characters.
const TITLE_CHARS: usize = 50;

#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct Conversation {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub role: String,
    pub content: String,
    /// JSON array of agent names, set on assistant messages.
    pub agents: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct ConversationRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ConversationRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a conversation titled from the first user message.
    pub async fn create(&self, user_id: i64, first_message: &str) -> Result<Conversation> {
        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO conversations (user_id, title, created_at, updated_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(derive_title(first_message))
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?
        .last_insert_rowid();

        self.by_id(id, user_id).await
    }

    /// Fetch a conversation, scoped to its owner.
    pub async fn by_id(&self, id: i64, user_id: i64) -> Result<Conversation> {
        sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("conversation", id.to_string()))
    }

    /// List the user's conversations, most recently updated first.
    pub async fn list(&self, user_id: i64) -> Result<Vec<Conversation>> {
        Ok(sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations WHERE user_id = ? ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?)
    }

    pub async fn rename(&self, id: i64, user_id: i64, title: &str) -> Result<Conversation> {
        let result = sqlx::query(
            "UPDATE conversations SET title = ?, updated_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(title)
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("conversation", id.to_string()));
        }
        self.by_id(id, user_id).await
    }

    /// Delete a conversation and its messages.
    pub async fn delete(&self, id: i64, user_id: i64) -> Result<()> {
        // Ownership check happens before the message sweep.
        self.by_id(id, user_id).await?;

        sqlx::query("DELETE FROM messages WHERE conversation_id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Append a message and bump the conversation's updated_at.
    pub async fn append_message(
        &self,
        conversation_id: i64,
        role: &str,
        content: &str,
        agents: Option<&str>,
    ) -> Result<i64> {
        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO messages (conversation_id, role, content, agents, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(conversation_id)
        .bind(role)
        .bind(content)
        .bind(agents)
        .bind(now)
        .execute(self.pool)
        .await?
        .last_insert_rowid();

        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(conversation_id)
            .execute(self.pool)
            .await?;
        Ok(id)
    }

    /// Messages in chronological order.
    pub async fn messages(&self, conversation_id: i64, user_id: i64) -> Result<Vec<Message>> {
        self.by_id(conversation_id, user_id).await?;
        Ok(sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE conversation_id = ? ORDER BY id ASC",
        )
        .bind(conversation_id)
        .fetch_all(self.pool)
        .await?)
    }

    /// Most recent messages for synthesis context, oldest first.
    pub async fn recent_messages(&self, conversation_id: i64, limit: i64) -> Result<Vec<Message>> {
        let mut rows = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE conversation_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        rows.reverse();
        Ok(rows)
    }
}

fn derive_title(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return "New conversation".to_string();
    }
    if trimmed.chars().count() <= TITLE_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(TITLE_CHARS).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_pool;

    #[tokio::test]
    async fn title_is_derived_and_truncated() {
        assert_eq!(derive_title("short query"), "short query");
        let long = "a".repeat(80);
        let title = derive_title(&long);
        assert_eq!(title, format!("{}...", "a".repeat(50)));
    }

    #[tokio::test]
    async fn messages_are_owner_scoped_and_ordered() {
        let pool = test_pool().await;
        let repo = ConversationRepo::new(&pool);

        let convo = repo.create(1, "metformin market size?").await.unwrap();
        repo.append_message(convo.id, "user", "metformin market size?", None)
            .await
            .unwrap();
        repo.append_message(convo.id, "assistant", "about $3.5B", Some("[\"MARKET\"]"))
            .await
            .unwrap();

        let messages = repo.messages(convo.id, 1).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].agents.as_deref(), Some("[\"MARKET\"]"));

        // Another user cannot read it.
        assert!(repo.messages(convo.id, 2).await.is_err());
    }

    #[tokio::test]
    async fn delete_removes_messages_too() {
        let pool = test_pool().await;
        let repo = ConversationRepo::new(&pool);

        let convo = repo.create(1, "hello").await.unwrap();
        repo.append_message(convo.id, "user", "hello", None)
            .await
            .unwrap();
        repo.delete(convo.id, 1).await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
