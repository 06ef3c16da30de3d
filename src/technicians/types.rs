use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::shared::enums::Permission;
use crate::core::shared::schema::funcionarios_ti;
use crate::core::shared::utils::{check_len, MAX_TEXT_LEN};

/// A technician account. The password hash is never loaded into this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = funcionarios_ti)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TechnicianAccount {
    pub id: i64,
    pub nome: String,
    pub email: String,
    pub permissao: Permission,
    pub created_at: DateTime<Utc>,
}

impl TechnicianAccount {
    pub fn to_ref(&self) -> TechnicianRef {
        TechnicianRef {
            id: self.id,
            nome: self.nome.clone(),
        }
    }
}

/// Identity of a technician as recorded on a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicianRef {
    pub id: i64,
    pub nome: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTechnicianRequest {
    pub nome: String,
    pub email: String,
    pub permissao: Permission,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTechnicianRequest {
    pub nome: String,
    pub email: String,
    pub permissao: Permission,
}

/// Validated account fields, shared by create and edit.
#[derive(Debug, Clone, PartialEq, Eq, Insertable, AsChangeset)]
#[diesel(table_name = funcionarios_ti)]
pub struct TechnicianFields {
    pub nome: String,
    pub email: String,
    pub permissao: Permission,
}

impl TechnicianFields {
    pub fn parse(nome: &str, email: &str, permissao: Permission) -> Result<Self, String> {
        let nome = nome.trim();
        let email = email.trim().to_lowercase();
        if nome.is_empty() {
            return Err("Nome é obrigatório".to_string());
        }
        if email.is_empty() {
            return Err("Email é obrigatório".to_string());
        }
        let valid_email = email
            .split_once('@')
            .map(|(user, domain)| !user.is_empty() && !domain.is_empty())
            .unwrap_or(false);
        if !valid_email {
            return Err(format!("Email inválido: {email}"));
        }
        check_len("nome", Some(nome), MAX_TEXT_LEN)?;
        check_len("email", Some(&email), MAX_TEXT_LEN)?;
        Ok(Self {
            nome: nome.to_string(),
            email,
            permissao,
        })
    }
}
