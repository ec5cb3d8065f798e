// src/handlers/auth.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::cookie::PrivateCookieJar;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::{removal_cookie, session_cookie, AuthenticatedUser},
    models::auth::{Company, LoginPayload, MeResponse, SelectCompaniesPayload},
    services::auth::select_active_companies,
};

// POST /api/auth/login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Sessão criada (cookie)", body = MeResponse),
        (status = 401, description = "Credenciais inválidas no ERP"),
        (status = 502, description = "ERP indisponível")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    jar: PrivateCookieJar,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let session = app_state
        .auth_service
        .login(&payload.login, &payload.password)
        .await?;

    let jar = jar.add(session_cookie(&session)?);
    Ok((jar, Json(MeResponse::from(&session))))
}

// POST /api/auth/logout
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses((status = 204, description = "Sessão encerrada"))
)]
pub async fn logout(jar: PrivateCookieJar) -> impl IntoResponse {
    (jar.remove(removal_cookie()), StatusCode::NO_CONTENT)
}

// GET /api/users/me
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "Dados da sessão", body = MeResponse),
        (status = 401, description = "Sem sessão")
    )
)]
pub async fn get_me(AuthenticatedUser(user): AuthenticatedUser) -> Json<MeResponse> {
    Json(MeResponse::from(&user))
}

// GET /api/users/me/companies
#[utoipa::path(
    get,
    path = "/api/users/me/companies",
    tag = "Users",
    responses((status = 200, description = "Empresas liberadas pelo ERP", body = Vec<Company>))
)]
pub async fn get_my_companies(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<Company>>, AppError> {
    let companies = app_state.auth_service.companies(&user).await?;
    Ok(Json(companies))
}

// PUT /api/users/me/companies
#[utoipa::path(
    put,
    path = "/api/users/me/companies",
    tag = "Users",
    request_body = SelectCompaniesPayload,
    responses(
        (status = 200, description = "Empresas ativas atualizadas", body = MeResponse),
        (status = 403, description = "Empresa não liberada para o usuário")
    )
)]
pub async fn select_companies(
    jar: PrivateCookieJar,
    AuthenticatedUser(mut user): AuthenticatedUser,
    Json(payload): Json<SelectCompaniesPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    select_active_companies(&mut user, &payload.company_ids)?;

    // Reemite o cookie com a nova seleção
    let jar = jar.add(session_cookie(&user)?);
    Ok((jar, Json(MeResponse::from(&user))))
}
