//src/main.rs

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod erp;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::{AppState, Settings};
use crate::db::photo_repo::UPLOADS_ROUTE;
use crate::docs::ApiDoc;
use crate::middleware::auth::session_guard;

// Fotos de celular passam fácil dos 2MB padrão do axum
const UPLOAD_LIMIT_BYTES: usize = 15 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let settings = Settings::from_env()?;
    let app_state = AppState::new(settings).await?;

    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Rotas públicas
    let auth_routes = Router::new()
        .route("/login", post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout));

    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .route(
            "/me/companies",
            get(handlers::auth::get_my_companies).put(handlers::auth::select_companies),
        );

    let project_routes = Router::new()
        .route(
            "/",
            get(handlers::projects::list_projects).post(handlers::projects::create_project),
        )
        .route("/sync", post(handlers::projects::sync_projects))
        .route(
            "/{id}",
            get(handlers::projects::get_project)
                .put(handlers::projects::update_project)
                .delete(handlers::projects::delete_project),
        )
        .route(
            "/{id}/tasks",
            get(handlers::tasks::list_project_tasks).post(handlers::tasks::create_task),
        )
        .route("/{id}/progress-curve", get(handlers::projects::get_progress_curve))
        .route("/{id}/cost-curve", get(handlers::projects::get_cost_curve));

    let task_routes = Router::new()
        .route(
            "/{id}",
            get(handlers::tasks::get_task)
                .put(handlers::tasks::update_task)
                .delete(handlers::tasks::delete_task),
        )
        .route("/{id}/consumption", put(handlers::tasks::upsert_consumption))
        .route("/{id}/partner", put(handlers::tasks::assign_partner))
        .route(
            "/{id}/validations",
            post(handlers::tasks::add_validation).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .route(
            "/{id}/validations/{validation_id}",
            delete(handlers::tasks::delete_validation),
        );

    let partner_routes = Router::new().route("/", get(handlers::partners::list_partners));

    // Tudo que exige sessão passa pelo mesmo guard
    let protected = Router::new()
        .nest("/api/users", user_routes)
        .nest("/api/projects", project_routes)
        .nest("/api/tasks", task_routes)
        .nest("/api/partners", partner_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            session_guard,
        ));

    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .merge(protected)
        .nest_service(UPLOADS_ROUTE, ServeDir::new(app_state.photos.dir()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state.clone());

    let listener = TcpListener::bind(&app_state.settings.bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
