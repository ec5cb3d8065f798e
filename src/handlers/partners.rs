// src/handlers/partners.rs

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    common::error::AppError, config::AppState, middleware::auth::AuthenticatedUser,
    models::project::PartnerRef,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PartnerQuery {
    /// Filtro parcial pelo nome (ilike)
    pub search: Option<String>,
}

// GET /api/partners
#[utoipa::path(
    get,
    path = "/api/partners",
    tag = "Partners",
    params(PartnerQuery),
    responses(
        (status = 200, description = "Fornecedores do ERP (máx. 80)", body = Vec<PartnerRef>),
        (status = 502, description = "ERP indisponível")
    )
)]
pub async fn list_partners(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<PartnerQuery>,
) -> Result<Json<Vec<PartnerRef>>, AppError> {
    let partners = app_state
        .erp
        .partners(&user.credentials(), query.search.as_deref())
        .await?;
    Ok(Json(partners))
}
