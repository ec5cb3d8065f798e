// src/handlers/tasks.rs

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    handlers::projects::validate_amount,
    middleware::auth::AuthenticatedUser,
    models::project::{PartnerRef, Task, TaskValidation},
    services::task_service::{normalize_consumption_date, NewTask, TaskChanges},
};

// =============================================================================
//  PAYLOADS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskPayload {
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    #[schema(example = "Vaciado de losa")]
    pub name: String,

    #[validate(custom(function = "validate_amount"))]
    #[schema(example = "100")]
    pub quantity: Decimal,

    #[validate(custom(function = "validate_amount"))]
    #[schema(example = "1000.00")]
    pub value: Decimal,

    #[schema(example = "2024-08-01")]
    pub start_date: NaiveDate,

    #[schema(example = "2024-08-10")]
    pub end_date: NaiveDate,

    pub partner: Option<PartnerRef>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskPayload {
    #[validate(length(min = 1, message = "O nome não pode ser vazio."))]
    pub name: Option<String>,
    #[validate(custom(function = "validate_amount"))]
    pub quantity: Option<Decimal>,
    #[validate(custom(function = "validate_amount"))]
    pub value: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionPayload {
    // Aceita "2024-08-01" ou um timestamp RFC 3339
    #[schema(example = "2024-08-01")]
    pub date: String,
    #[schema(example = "40")]
    pub consumed_quantity: Decimal,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignPartnerPayload {
    // null remove o fornecedor
    pub partner: Option<PartnerRef>,
}

// Só para a documentação do upload multipart
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct ValidationUploadForm {
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
    #[schema(example = "-12.046374,-77.042793")]
    pub location: String,
}

// =============================================================================
//  TAREFAS DE UM PROJETO
// =============================================================================

// GET /api/projects/{id}/tasks
#[utoipa::path(
    get,
    path = "/api/projects/{id}/tasks",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "ID do projeto")),
    responses((status = 200, description = "Tarefas do projeto", body = Vec<Task>))
)]
pub async fn list_project_tasks(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<Task>>, AppError> {
    app_state
        .project_service
        .get(project_id, &user.active_company_ids)
        .await?;

    let tasks = app_state.task_service.list_by_project(project_id).await?;
    Ok(Json(tasks))
}

// POST /api/projects/{id}/tasks
#[utoipa::path(
    post,
    path = "/api/projects/{id}/tasks",
    tag = "Tasks",
    request_body = CreateTaskPayload,
    params(("id" = Uuid, Path, description = "ID do projeto")),
    responses(
        (status = 201, description = "Tarefa criada (status derivado)", body = Task),
        (status = 400, description = "Início posterior ao término")
    )
)]
pub async fn create_task(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<CreateTaskPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    app_state
        .project_service
        .get(project_id, &user.active_company_ids)
        .await?;

    let task = app_state
        .task_service
        .create(
            project_id,
            NewTask {
                name: payload.name,
                quantity: payload.quantity,
                value: payload.value,
                start_date: payload.start_date,
                end_date: payload.end_date,
                partner: payload.partner,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(task)))
}

// =============================================================================
//  TAREFA
// =============================================================================

// GET /api/tasks/{id}
#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "ID da tarefa")),
    responses(
        (status = 200, description = "Tarefa", body = Task),
        (status = 404, description = "Tarefa não encontrada")
    )
)]
pub async fn get_task(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(task_id): Path<Uuid>,
) -> Result<Json<Task>, AppError> {
    let task = app_state
        .project_service
        .authorize_task(task_id, &user.active_company_ids)
        .await?;
    Ok(Json(task))
}

// PUT /api/tasks/{id}
#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    tag = "Tasks",
    request_body = UpdateTaskPayload,
    params(("id" = Uuid, Path, description = "ID da tarefa")),
    responses((status = 200, description = "Tarefa atualizada", body = Task))
)]
pub async fn update_task(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateTaskPayload>,
) -> Result<Json<Task>, AppError> {
    payload.validate()?;

    app_state
        .project_service
        .authorize_task(task_id, &user.active_company_ids)
        .await?;

    let task = app_state
        .task_service
        .update(
            task_id,
            TaskChanges {
                name: payload.name,
                quantity: payload.quantity,
                value: payload.value,
                start_date: payload.start_date,
                end_date: payload.end_date,
            },
        )
        .await?;

    Ok(Json(task))
}

// DELETE /api/tasks/{id}
#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "ID da tarefa")),
    responses((status = 204, description = "Tarefa removida"))
)]
pub async fn delete_task(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(task_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state
        .project_service
        .authorize_task(task_id, &user.active_company_ids)
        .await?;

    app_state.task_service.delete(task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// PUT /api/tasks/{id}/consumption
#[utoipa::path(
    put,
    path = "/api/tasks/{id}/consumption",
    tag = "Tasks",
    request_body = ConsumptionPayload,
    params(("id" = Uuid, Path, description = "ID da tarefa")),
    responses(
        (status = 200, description = "Consumo gravado e status recalculado", body = Task),
        (status = 400, description = "Data ou quantidade inválida"),
        (status = 404, description = "Tarefa não encontrada")
    )
)]
pub async fn upsert_consumption(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<ConsumptionPayload>,
) -> Result<Json<Task>, AppError> {
    let date = normalize_consumption_date(&payload.date)?;

    app_state
        .project_service
        .authorize_task(task_id, &user.active_company_ids)
        .await?;

    let task = app_state
        .task_service
        .upsert_consumption(task_id, date, payload.consumed_quantity)
        .await?;

    Ok(Json(task))
}

// PUT /api/tasks/{id}/partner
#[utoipa::path(
    put,
    path = "/api/tasks/{id}/partner",
    tag = "Tasks",
    request_body = AssignPartnerPayload,
    params(("id" = Uuid, Path, description = "ID da tarefa")),
    responses((status = 200, description = "Fornecedor atribuído", body = Task))
)]
pub async fn assign_partner(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<AssignPartnerPayload>,
) -> Result<Json<Task>, AppError> {
    app_state
        .project_service
        .authorize_task(task_id, &user.active_company_ids)
        .await?;

    let task = app_state
        .task_service
        .assign_partner(task_id, payload.partner)
        .await?;

    Ok(Json(task))
}

// =============================================================================
//  VALIDAÇÕES (FOTO + LOCALIZAÇÃO)
// =============================================================================

// POST /api/tasks/{id}/validations
#[utoipa::path(
    post,
    path = "/api/tasks/{id}/validations",
    tag = "Validations",
    request_body(content = ValidationUploadForm, content_type = "multipart/form-data"),
    params(("id" = Uuid, Path, description = "ID da tarefa")),
    responses(
        (status = 201, description = "Validação registrada", body = TaskValidation),
        (status = 400, description = "Imagem ou localização inválida")
    )
)]
pub async fn add_validation(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(task_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .project_service
        .authorize_task(task_id, &user.active_company_ids)
        .await?;

    let mut image: Option<Vec<u8>> = None;
    let mut location: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        match field.name() {
            Some("image") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                image = Some(bytes.to_vec());
            }
            Some("location") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                location = Some(text.trim().to_string());
            }
            _ => {}
        }
    }

    let image = image.ok_or_else(|| AppError::BadRequest("O campo 'image' é obrigatório.".into()))?;
    let location = location
        .filter(|l| !l.is_empty())
        .ok_or_else(|| AppError::BadRequest("O campo 'location' é obrigatório.".into()))?;

    let validation = app_state
        .task_service
        .add_validation(task_id, image, location)
        .await?;

    Ok((StatusCode::CREATED, Json(validation)))
}

// DELETE /api/tasks/{id}/validations/{validation_id}
#[utoipa::path(
    delete,
    path = "/api/tasks/{id}/validations/{validation_id}",
    tag = "Validations",
    params(
        ("id" = Uuid, Path, description = "ID da tarefa"),
        ("validation_id" = Uuid, Path, description = "ID da validação")
    ),
    responses(
        (status = 204, description = "Validação removida"),
        (status = 404, description = "Validação não encontrada")
    )
)]
pub async fn delete_validation(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((task_id, validation_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    app_state
        .project_service
        .authorize_task(task_id, &user.active_company_ids)
        .await?;

    app_state
        .task_service
        .delete_validation(task_id, validation_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
