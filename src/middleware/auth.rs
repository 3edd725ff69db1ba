//! Middleware de autenticación JWT
//!
//! Verifica el bearer token de la sesión del admin en cada ruta de
//! `/routing`. La emisión de tokens es responsabilidad del servicio de
//! autenticación externo.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::{
    state::AppState,
    utils::{
        errors::AppError,
        jwt::{extract_token_from_header, verify_token},
    },
};

/// Sesión autenticada que se inyecta en las requests
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub admin_id: String,
}

/// Middleware de autenticación JWT
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Token de autorización requerido".to_string()))?;

    let token = extract_token_from_header(auth_header)?;
    let claims = verify_token(token, &state.jwt)?;

    request.extensions_mut().insert(AdminSession { admin_id: claims.sub });

    Ok(next.run(request).await)
}
