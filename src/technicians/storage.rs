use async_trait::async_trait;
use diesel::prelude::*;

use crate::core::shared::error::StoreError;
use crate::core::shared::schema::funcionarios_ti;
use crate::core::shared::utils::{with_conn, DbPool};

use super::types::{TechnicianAccount, TechnicianFields};

#[async_trait]
pub trait TechnicianStore: Send + Sync {
    /// All accounts ordered by name.
    async fn list(&self) -> Result<Vec<TechnicianAccount>, StoreError>;
    async fn get(&self, id: i64) -> Result<Option<TechnicianAccount>, StoreError>;
    /// Account plus stored hash, looked up by (lowercased) email.
    async fn find_with_hash(
        &self,
        email: &str,
    ) -> Result<Option<(TechnicianAccount, String)>, StoreError>;
    async fn password_hash(&self, id: i64) -> Result<Option<String>, StoreError>;
    async fn create(
        &self,
        fields: TechnicianFields,
        senha_hash: String,
    ) -> Result<TechnicianAccount, StoreError>;
    /// Edits name, email and permission only; the credential is untouched.
    async fn update(
        &self,
        id: i64,
        fields: TechnicianFields,
    ) -> Result<TechnicianAccount, StoreError>;
    async fn set_password_hash(&self, id: i64, senha_hash: String) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct PgTechnicianStore {
    pool: DbPool,
}

impl PgTechnicianStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TechnicianStore for PgTechnicianStore {
    async fn list(&self) -> Result<Vec<TechnicianAccount>, StoreError> {
        with_conn(&self.pool, |conn| {
            let accounts = funcionarios_ti::table
                .select(TechnicianAccount::as_select())
                .order(funcionarios_ti::nome.asc())
                .load(conn)?;
            Ok(accounts)
        })
        .await
    }

    async fn get(&self, id: i64) -> Result<Option<TechnicianAccount>, StoreError> {
        with_conn(&self.pool, move |conn| {
            let account = funcionarios_ti::table
                .find(id)
                .select(TechnicianAccount::as_select())
                .first(conn)
                .optional()?;
            Ok(account)
        })
        .await
    }

    async fn find_with_hash(
        &self,
        email: &str,
    ) -> Result<Option<(TechnicianAccount, String)>, StoreError> {
        let email = email.trim().to_lowercase();
        with_conn(&self.pool, move |conn| {
            let row = funcionarios_ti::table
                .filter(funcionarios_ti::email.eq(email))
                .select((TechnicianAccount::as_select(), funcionarios_ti::senha_hash))
                .first::<(TechnicianAccount, String)>(conn)
                .optional()?;
            Ok(row)
        })
        .await
    }

    async fn password_hash(&self, id: i64) -> Result<Option<String>, StoreError> {
        with_conn(&self.pool, move |conn| {
            let hash = funcionarios_ti::table
                .find(id)
                .select(funcionarios_ti::senha_hash)
                .first::<String>(conn)
                .optional()?;
            Ok(hash)
        })
        .await
    }

    async fn create(
        &self,
        fields: TechnicianFields,
        senha_hash: String,
    ) -> Result<TechnicianAccount, StoreError> {
        with_conn(&self.pool, move |conn| {
            let account = diesel::insert_into(funcionarios_ti::table)
                .values((&fields, funcionarios_ti::senha_hash.eq(senha_hash)))
                .returning(TechnicianAccount::as_returning())
                .get_result(conn)?;
            Ok(account)
        })
        .await
    }

    async fn update(
        &self,
        id: i64,
        fields: TechnicianFields,
    ) -> Result<TechnicianAccount, StoreError> {
        with_conn(&self.pool, move |conn| {
            diesel::update(funcionarios_ti::table.find(id))
                .set(&fields)
                .returning(TechnicianAccount::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or_else(|| StoreError::not_found("funcionario", id))
        })
        .await
    }

    async fn set_password_hash(&self, id: i64, senha_hash: String) -> Result<(), StoreError> {
        with_conn(&self.pool, move |conn| {
            let updated = diesel::update(funcionarios_ti::table.find(id))
                .set(funcionarios_ti::senha_hash.eq(senha_hash))
                .execute(conn)?;
            if updated == 0 {
                return Err(StoreError::not_found("funcionario", id));
            }
            Ok(())
        })
        .await
    }
}
