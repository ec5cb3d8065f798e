// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use chrono::Utc;

use crate::{common::error::AppError, models::auth::SessionUser};

pub const SESSION_COOKIE: &str = "valorizacion_session";

/// Monta o cookie de sessão (o conteúdo é criptografado pelo jar).
pub fn session_cookie(session: &SessionUser) -> Result<Cookie<'static>, AppError> {
    let payload = serde_json::to_string(session)?;
    Ok(Cookie::build((SESSION_COOKIE, payload))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build())
}

pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

/// Lê a sessão do jar. Cookie ausente, adulterado ou expirado = sem sessão.
pub fn read_session(jar: &PrivateCookieJar) -> Option<SessionUser> {
    let cookie = jar.get(SESSION_COOKIE)?;
    let session: SessionUser = serde_json::from_str(cookie.value()).ok()?;

    if session.is_expired(Utc::now()) {
        return None;
    }
    Some(session)
}

// O middleware em si
pub async fn session_guard(
    jar: PrivateCookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = read_session(&jar).ok_or(AppError::Unauthorized)?;

    // Insere a sessão nos "extensions" da requisição
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

// Extrator para obter o usuário autenticado diretamente nos handlers
pub struct AuthenticatedUser(pub SessionUser);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionUser>()
            .cloned()
            .map(AuthenticatedUser)
            .ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_extra::extract::cookie::Key;

    fn session(expires_in_hours: i64) -> SessionUser {
        SessionUser {
            uid: 9,
            login: "supervisor".into(),
            name: "Supervisor".into(),
            password: "clave".into(),
            company_ids: vec![1],
            active_company_ids: vec![1],
            expires_at: Utc::now() + chrono::Duration::hours(expires_in_hours),
        }
    }

    #[test]
    fn session_roundtrips_through_private_jar() {
        let jar = PrivateCookieJar::new(Key::generate());
        let jar = jar.add(session_cookie(&session(1)).unwrap());

        let restored = read_session(&jar).unwrap();

        assert_eq!(restored.uid, 9);
        assert_eq!(restored.password, "clave");
    }

    #[test]
    fn expired_session_is_ignored() {
        let jar = PrivateCookieJar::new(Key::generate());
        let jar = jar.add(session_cookie(&session(-1)).unwrap());

        assert!(read_session(&jar).is_none());
    }
}
