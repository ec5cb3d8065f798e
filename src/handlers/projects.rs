// src/handlers/projects.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        curve::{CostPoint, ProgressPoint},
        project::{Project, SyncReport, MAX_AMOUNT},
    },
    services::project_service::{NewProject, ProjectChanges},
};

pub(crate) fn validate_amount(val: &Decimal) -> Result<(), ValidationError> {
    if *val < Decimal::ZERO || *val > MAX_AMOUNT {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.add_param("max".into(), &MAX_AMOUNT.to_string());
        err.message = Some("O valor deve estar entre 0 e 1 trilhão.".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectPayload {
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    #[schema(example = "Pavimentação Av. Central")]
    pub name: String,

    #[schema(example = 1)]
    pub company_id: i64,

    #[serde(default)]
    #[schema(example = "Municipalidad de Lima")]
    pub client: String,

    #[validate(custom(function = "validate_amount"))]
    #[schema(example = "250000.00")]
    pub total_value: Decimal,

    #[validate(custom(function = "validate_amount"))]
    #[schema(example = "180000.00")]
    pub total_cost: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectPayload {
    #[validate(length(min = 1, message = "O nome não pode ser vazio."))]
    pub name: Option<String>,
    pub client: Option<String>,
    #[validate(custom(function = "validate_amount"))]
    pub total_value: Option<Decimal>,
    #[validate(custom(function = "validate_amount"))]
    pub total_cost: Option<Decimal>,
}

// GET /api/projects
#[utoipa::path(
    get,
    path = "/api/projects",
    tag = "Projects",
    responses((status = 200, description = "Projetos das empresas ativas", body = Vec<Project>))
)]
pub async fn list_projects(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let projects = app_state
        .project_service
        .list(&user.active_company_ids)
        .await?;

    Ok((StatusCode::OK, Json(projects)))
}

// POST /api/projects
#[utoipa::path(
    post,
    path = "/api/projects",
    tag = "Projects",
    request_body = CreateProjectPayload,
    responses(
        (status = 201, description = "Projeto criado", body = Project),
        (status = 403, description = "Empresa fora do escopo do usuário")
    )
)]
pub async fn create_project(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<CreateProjectPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    // O nome da empresa vem do espelho do ERP no banco
    let company = app_state
        .auth_service
        .companies(&user)
        .await?
        .into_iter()
        .find(|c| c.id == payload.company_id)
        .ok_or(AppError::Forbidden)?;

    let project = app_state
        .project_service
        .create(
            NewProject {
                name: payload.name,
                company_id: company.id,
                company_name: company.name,
                client: payload.client,
                total_value: payload.total_value,
                total_cost: payload.total_cost,
            },
            &user.active_company_ids,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(project)))
}

// GET /api/projects/{id}
#[utoipa::path(
    get,
    path = "/api/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "ID do projeto")),
    responses(
        (status = 200, description = "Projeto", body = Project),
        (status = 404, description = "Projeto não encontrado")
    )
)]
pub async fn get_project(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, AppError> {
    let project = app_state
        .project_service
        .get(id, &user.active_company_ids)
        .await?;
    Ok(Json(project))
}

// PUT /api/projects/{id}
#[utoipa::path(
    put,
    path = "/api/projects/{id}",
    tag = "Projects",
    request_body = UpdateProjectPayload,
    params(("id" = Uuid, Path, description = "ID do projeto")),
    responses((status = 200, description = "Projeto atualizado", body = Project))
)]
pub async fn update_project(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProjectPayload>,
) -> Result<Json<Project>, AppError> {
    payload.validate()?;

    let project = app_state
        .project_service
        .update(
            id,
            ProjectChanges {
                name: payload.name,
                client: payload.client,
                total_value: payload.total_value,
                total_cost: payload.total_cost,
            },
            &user.active_company_ids,
        )
        .await?;

    Ok(Json(project))
}

// DELETE /api/projects/{id}
#[utoipa::path(
    delete,
    path = "/api/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "ID do projeto")),
    responses((status = 204, description = "Projeto e tarefas removidos"))
)]
pub async fn delete_project(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state
        .project_service
        .delete(id, &user.active_company_ids)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/projects/sync
#[utoipa::path(
    post,
    path = "/api/projects/sync",
    tag = "Projects",
    responses(
        (status = 200, description = "Resumo da sincronização", body = SyncReport),
        (status = 502, description = "ERP indisponível")
    )
)]
pub async fn sync_projects(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<SyncReport>, AppError> {
    let report = app_state
        .project_service
        .sync(&user.credentials(), &user.active_company_ids)
        .await?;
    Ok(Json(report))
}

// GET /api/projects/{id}/progress-curve
#[utoipa::path(
    get,
    path = "/api/projects/{id}/progress-curve",
    tag = "Curves",
    params(("id" = Uuid, Path, description = "ID do projeto")),
    responses((status = 200, description = "Curva S de avanço (base: valor total)", body = Vec<ProgressPoint>))
)]
pub async fn get_progress_curve(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ProgressPoint>>, AppError> {
    let curve = app_state
        .project_service
        .progress_curve(id, &user.active_company_ids)
        .await?;
    Ok(Json(curve))
}

// GET /api/projects/{id}/cost-curve
#[utoipa::path(
    get,
    path = "/api/projects/{id}/cost-curve",
    tag = "Curves",
    params(("id" = Uuid, Path, description = "ID do projeto")),
    responses((status = 200, description = "Curva S de custo por fornecedor (base: custo total)", body = Vec<CostPoint>))
)]
pub async fn get_cost_curve(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CostPoint>>, AppError> {
    let curve = app_state
        .project_service
        .cost_curve(id, &user.active_company_ids)
        .await?;
    Ok(Json(curve))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_must_be_between_zero_and_ceiling() {
        assert!(validate_amount(&Decimal::ZERO).is_ok());
        assert!(validate_amount(&MAX_AMOUNT).is_ok());
        assert!(validate_amount(&Decimal::from(-1)).is_err());
        assert!(validate_amount(&Decimal::from_i128_with_scale(10i128.pow(27), 0)).is_err());
    }

    #[test]
    fn oversized_payload_fails_validation() {
        let payload = CreateProjectPayload {
            name: "Puente".into(),
            company_id: 1,
            client: String::new(),
            total_value: Decimal::from_i128_with_scale(10i128.pow(27), 0),
            total_cost: Decimal::ZERO,
        };

        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("total_value"));
    }
}
