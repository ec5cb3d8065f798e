// src/services/auth.rs

use chrono::{Duration, Utc};

use crate::{
    common::error::AppError,
    db::CompanyRepository,
    erp::{ErpClient, ErpCredentials},
    models::auth::{Company, SessionUser},
};

#[derive(Clone)]
pub struct AuthService {
    erp: ErpClient,
    company_repo: CompanyRepository,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(erp: ErpClient, company_repo: CompanyRepository, session_ttl: Duration) -> Self {
        Self {
            erp,
            company_repo,
            session_ttl,
        }
    }

    /// Autentica no ERP e monta a sessão com as empresas liberadas para o usuário.
    pub async fn login(&self, login: &str, password: &str) -> Result<SessionUser, AppError> {
        let uid = self
            .erp
            .authenticate(login, password)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let credentials = ErpCredentials {
            uid,
            password: password.to_owned(),
        };

        let profile = self.erp.user_profile(&credentials).await?;
        let companies = self.erp.companies(&credentials, &profile.company_ids).await?;

        // Espelha as empresas no banco para os lookups da sessão
        self.company_repo.replace_for_user(uid, &companies).await?;

        let company_ids: Vec<i64> = companies.iter().map(|c| c.id).collect();
        tracing::info!(
            "🔑 Login de '{}' (uid {}) com {} empresa(s)",
            login,
            uid,
            company_ids.len()
        );

        Ok(SessionUser {
            uid,
            login: login.to_owned(),
            name: profile.name,
            password: credentials.password,
            active_company_ids: company_ids.clone(),
            company_ids,
            expires_at: Utc::now() + self.session_ttl,
        })
    }

    pub async fn companies(&self, session: &SessionUser) -> Result<Vec<Company>, AppError> {
        self.company_repo.list_for_user(session.uid).await
    }
}

/// Troca as empresas ativas da sessão; só aceita empresas liberadas ao usuário.
pub fn select_active_companies(
    session: &mut SessionUser,
    company_ids: &[i64],
) -> Result<(), AppError> {
    if company_ids.is_empty() {
        return Err(AppError::BadRequest("Selecione ao menos uma empresa.".into()));
    }
    if company_ids.iter().any(|id| !session.company_ids.contains(id)) {
        return Err(AppError::Forbidden);
    }

    let mut active = company_ids.to_vec();
    active.sort_unstable();
    active.dedup();
    session.active_company_ids = active;
    Ok(())
}
