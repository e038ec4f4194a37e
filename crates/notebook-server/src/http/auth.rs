//! Bearer session extractor

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use super::blocking;
use super::error::AppError;
use crate::error::ServiceError;
use crate::session::User;
use crate::state::AppState;

/// The user behind a valid `Authorization: Bearer <key>` header
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub key: String,
}

fn bearer_key(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let key = value.strip_prefix("Bearer ")?.trim();
    (!key.is_empty()).then(|| key.to_string())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let key = bearer_key(parts).ok_or(ServiceError::Unauthorized)?;

        let backend = state.backend.clone();
        let lookup = key.clone();
        let user = blocking(move || backend.authenticate(&lookup)).await?;

        Ok(AuthUser { user, key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/v1/sync/state");
        if let Some(auth) = auth {
            builder = builder.header(AUTHORIZATION, auth);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_key() {
        assert_eq!(bearer_key(&parts(Some("Bearer abc"))), Some("abc".to_string()));
        assert_eq!(bearer_key(&parts(Some("Basic abc"))), None);
        assert_eq!(bearer_key(&parts(Some("Bearer  "))), None);
        assert_eq!(bearer_key(&parts(None)), None);
    }
}
