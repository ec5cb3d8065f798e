// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::erp::ErpCredentials;

// Empresa do ERP (res.company), espelhada na tabela user_companies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    #[schema(example = 1)]
    pub id: i64,
    #[schema(example = "Constructora Andina SAC")]
    pub name: String,
}

/// Conteúdo do cookie de sessão (criptografado pelo PrivateCookieJar).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub uid: i64,
    pub login: String,
    pub name: String,
    pub password: String,
    pub company_ids: Vec<i64>,
    pub active_company_ids: Vec<i64>,
    pub expires_at: DateTime<Utc>,
}

impl SessionUser {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn credentials(&self) -> ErpCredentials {
        ErpCredentials {
            uid: self.uid,
            password: self.password.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginPayload {
    #[validate(length(min = 1, message = "O login é obrigatório."))]
    #[schema(example = "engenheiro@obra.pe")]
    pub login: String,
    #[validate(length(min = 1, message = "A senha é obrigatória."))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectCompaniesPayload {
    #[validate(length(min = 1, message = "Selecione ao menos uma empresa."))]
    pub company_ids: Vec<i64>,
}

// O que o frontend vê da sessão (nunca a senha)
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub uid: i64,
    pub login: String,
    pub name: String,
    pub company_ids: Vec<i64>,
    pub active_company_ids: Vec<i64>,
    pub expires_at: DateTime<Utc>,
}

impl From<&SessionUser> for MeResponse {
    fn from(session: &SessionUser) -> Self {
        Self {
            uid: session.uid,
            login: session.login.clone(),
            name: session.name.clone(),
            company_ids: session.company_ids.clone(),
            active_company_ids: session.active_company_ids.clone(),
            expires_at: session.expires_at,
        }
    }
}
