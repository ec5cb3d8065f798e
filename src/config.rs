// src/config.rs

use std::{env, time::Duration};

use anyhow::Context;
use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{CompanyRepository, JsonStore, PhotoRepository},
    erp::ErpClient,
    services::{auth::AuthService, project_service::ProjectService, task_service::TaskService},
};

/// Configuração lida do ambiente (com suporte a `.env`).
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub session_secret: String,
    pub erp_url: String,
    pub erp_db: String,
    pub data_file: String,
    pub uploads_dir: String,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub erp_timeout_secs: u64,
}

fn required(name: &str) -> anyhow::Result<String> {
    env::var(name).with_context(|| format!("{} deve ser definida", name))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            session_secret: required("SESSION_SECRET")?,
            erp_url: required("ERP_URL")?,
            erp_db: required("ERP_DB")?,
            data_file: optional("DATA_FILE", "data/db.json"),
            uploads_dir: optional("UPLOADS_DIR", "uploads"),
            bind_addr: optional("BIND_ADDR", "0.0.0.0:3000"),
            session_ttl_hours: optional("SESSION_TTL_HOURS", "8")
                .parse()
                .context("SESSION_TTL_HOURS deve ser um número inteiro")?,
            erp_timeout_secs: optional("ERP_TIMEOUT_SECS", "15")
                .parse()
                .context("ERP_TIMEOUT_SECS deve ser um número inteiro")?,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub cookie_key: Key,
    pub settings: Settings,
    pub erp: ErpClient,
    pub photos: PhotoRepository,
    pub auth_service: AuthService,
    pub project_service: ProjectService,
    pub task_service: TaskService,
}

// O PrivateCookieJar busca a chave no estado
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

impl AppState {
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let cookie_key = Key::try_from(settings.session_secret.as_bytes())
            .map_err(|_| anyhow::anyhow!("SESSION_SECRET deve ter pelo menos 64 bytes"))?;

        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&settings.database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let erp = ErpClient::new(
            &settings.erp_url,
            &settings.erp_db,
            Duration::from_secs(settings.erp_timeout_secs),
        );
        let store = JsonStore::new(&settings.data_file);
        tracing::info!("📁 Projetos e tarefas em {}", store.path().display());
        let photos = PhotoRepository::new(&settings.uploads_dir);

        let company_repo = CompanyRepository::new(db_pool.clone());
        let auth_service = AuthService::new(
            erp.clone(),
            company_repo,
            chrono::Duration::hours(settings.session_ttl_hours),
        );
        let task_service = TaskService::new(store.clone(), photos.clone());
        let project_service = ProjectService::new(store, task_service.clone(), erp.clone());

        Ok(Self {
            db_pool,
            cookie_key,
            settings,
            erp,
            photos,
            auth_service,
            project_service,
            task_service,
        })
    }
}
