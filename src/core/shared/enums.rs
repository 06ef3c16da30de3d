//! Database enum types for the helpdesk schema
//!
//! Every enum here is persisted as its exact lowercase string (`aberto`, `imagem`, `admin`...)
//! because other writers of the same tables (the chat automation, older clients) compare
//! against those literals. Parsing any other string is an error, never a silent default.

use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Wires a string enum into diesel (`Text`), `Display` and `FromStr`.
macro_rules! text_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = UnknownVariant;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl ToSql<Text, Pg> for $ty {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.as_str().as_bytes())?;
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Pg> for $ty {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let value = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
                value.parse::<$ty>().map_err(Into::into)
            }
        }
    };
}

// ============================================================================
// TICKET STATUS
// ============================================================================

/// Lifecycle state of a ticket (`chamados_ti.status`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
pub enum TicketStatus {
    #[serde(rename = "aberto")]
    Open,
    #[serde(rename = "em_atendimento")]
    InService,
    #[serde(rename = "resolvido")]
    Resolved,
    #[serde(rename = "fechado")]
    Closed,
    /// Written only by the chat automation.
    #[serde(rename = "resolvido_pela_ia")]
    ResolvedByAutomation,
}

text_enum!(TicketStatus, "ticket status", {
    Open => "aberto",
    InService => "em_atendimento",
    Resolved => "resolvido",
    Closed => "fechado",
    ResolvedByAutomation => "resolvido_pela_ia",
});

impl Default for TicketStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl TicketStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Resolved | Self::Closed | Self::ResolvedByAutomation
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Open => "Aberto",
            Self::InService => "Em Atendimento",
            Self::Resolved => "Resolvido",
            Self::Closed => "Fechado",
            Self::ResolvedByAutomation => "Resolvido pela IA",
        }
    }
}

// ============================================================================
// PRIORITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Baixa,
    Media,
    Alta,
    Urgente,
}

text_enum!(Priority, "priority", {
    Baixa => "baixa",
    Media => "media",
    Alta => "alta",
    Urgente => "urgente",
});

// ============================================================================
// ATTACHMENT KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Imagem,
    Audio,
    Documento,
}

text_enum!(AttachmentKind, "attachment kind", {
    Imagem => "imagem",
    Audio => "audio",
    Documento => "documento",
});

// ============================================================================
// CHAT SENDER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    Usuario,
    Tecnico,
}

text_enum!(SenderKind, "sender kind", {
    Usuario => "usuario",
    Tecnico => "tecnico",
});

// ============================================================================
// PERMISSION
// ============================================================================

/// Technician permission flag (`funcionarios_ti.permissao`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Admin,
    Padrao,
}

text_enum!(Permission, "permission", {
    Admin => "admin",
    Padrao => "padrao",
});

impl Default for Permission {
    fn default() -> Self {
        Self::Padrao
    }
}
