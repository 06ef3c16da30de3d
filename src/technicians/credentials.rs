//! Password hashing lives in the database (`hash_password` / `verify_password`, pgcrypto).
//! The service only ever forwards plaintext candidates to those functions.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_types::{Bool, Text};

use crate::core::shared::error::StoreError;
use crate::core::shared::utils::{with_conn, DbPool};

/// Credential assigned to every new account; must be changed at first login.
pub const DEFAULT_PASSWORD: &str = "123";
pub const MIN_PASSWORD_LEN: usize = 6;

#[async_trait]
pub trait CredentialService: Send + Sync {
    async fn hash(&self, plain: &str) -> Result<String, StoreError>;
    async fn verify(&self, plain: &str, hash: &str) -> Result<bool, StoreError>;
}

#[derive(QueryableByName)]
struct HashRow {
    #[diesel(sql_type = Text)]
    hash: String,
}

#[derive(QueryableByName)]
struct VerifyRow {
    #[diesel(sql_type = Bool)]
    matches: bool,
}

#[derive(Debug, Clone)]
pub struct PgCredentialService {
    pool: DbPool,
}

impl PgCredentialService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialService for PgCredentialService {
    async fn hash(&self, plain: &str) -> Result<String, StoreError> {
        let plain = plain.to_string();
        with_conn(&self.pool, move |conn| {
            let row: HashRow = diesel::sql_query("SELECT hash_password($1) AS hash")
                .bind::<Text, _>(plain)
                .get_result(conn)?;
            Ok(row.hash)
        })
        .await
    }

    async fn verify(&self, plain: &str, hash: &str) -> Result<bool, StoreError> {
        let plain = plain.to_string();
        let hash = hash.to_string();
        with_conn(&self.pool, move |conn| {
            let row: VerifyRow = diesel::sql_query("SELECT verify_password($1, $2) AS matches")
                .bind::<Text, _>(plain)
                .bind::<Text, _>(hash)
                .get_result(conn)?;
            Ok(row.matches)
        })
        .await
    }
}
