// src/docs.rs

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::OpenApi;

use crate::handlers;
use crate::middleware::auth::SESSION_COOKIE;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::login,
        handlers::auth::logout,

        // --- Users ---
        handlers::auth::get_me,
        handlers::auth::get_my_companies,
        handlers::auth::select_companies,

        // --- Projects ---
        handlers::projects::list_projects,
        handlers::projects::create_project,
        handlers::projects::get_project,
        handlers::projects::update_project,
        handlers::projects::delete_project,
        handlers::projects::sync_projects,

        // --- Curves ---
        handlers::projects::get_progress_curve,
        handlers::projects::get_cost_curve,

        // --- Tasks ---
        handlers::tasks::list_project_tasks,
        handlers::tasks::create_task,
        handlers::tasks::get_task,
        handlers::tasks::update_task,
        handlers::tasks::delete_task,
        handlers::tasks::upsert_consumption,
        handlers::tasks::assign_partner,

        // --- Validations ---
        handlers::tasks::add_validation,
        handlers::tasks::delete_validation,

        // --- Partners ---
        handlers::partners::list_partners,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::Company,
            models::auth::LoginPayload,
            models::auth::SelectCompaniesPayload,
            models::auth::MeResponse,

            // --- Projects ---
            models::project::Project,
            models::project::SyncReport,
            handlers::projects::CreateProjectPayload,
            handlers::projects::UpdateProjectPayload,

            // --- Tasks ---
            models::project::TaskStatus,
            models::project::Task,
            models::project::DailyConsumption,
            models::project::TaskValidation,
            models::project::PartnerRef,
            handlers::tasks::CreateTaskPayload,
            handlers::tasks::UpdateTaskPayload,
            handlers::tasks::ConsumptionPayload,
            handlers::tasks::AssignPartnerPayload,
            handlers::tasks::ValidationUploadForm,

            // --- Curves ---
            models::curve::ProgressPoint,
            models::curve::CostPoint,
        )
    ),
    tags(
        (name = "Auth", description = "Login via ERP e sessão por cookie"),
        (name = "Users", description = "Sessão atual e empresas ativas"),
        (name = "Projects", description = "Obras e sincronização com o ERP"),
        (name = "Curves", description = "Curvas S de avanço e custo"),
        (name = "Tasks", description = "Partidas, consumo diário e fornecedores"),
        (name = "Validations", description = "Fotos de validação em campo"),
        (name = "Partners", description = "Fornecedores do ERP")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "session_cookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(SESSION_COOKIE))),
        );
    }
}
