use async_trait::async_trait;
use sqlx::PgPool;

use super::UserDirectory;
use crate::error::Result;
use crate::models::UserId;

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn resolve_user_id(&self, identity: &str) -> Result<Option<UserId>> {
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = $1")
            .bind(identity)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }
}
