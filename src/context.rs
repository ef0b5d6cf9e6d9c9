//! Per-request caller context, extracted from headers.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_HEADER: &str = "x-user-id";

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    /// Absent when the caller did not identify itself.
    pub user_id: Option<i64>,
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = match parts.headers.get(USER_HEADER) {
            None => None,
            Some(value) => {
                let parsed = value
                    .to_str()
                    .ok()
                    .and_then(|raw| raw.trim().parse::<i64>().ok())
                    .ok_or_else(|| {
                        ApiError::BadRequest(format!("{USER_HEADER} must be a numeric user id"))
                    })?;
                Some(parsed)
            }
        };

        Ok(Self {
            request_id: Uuid::new_v4(),
            user_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<RequestContext, ApiError> {
        let (mut parts, _) = request.into_parts();
        RequestContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_user_header() {
        let request = Request::builder().header(USER_HEADER, "42").body(()).unwrap();
        let context = extract(request).await.unwrap();
        assert_eq!(context.user_id, Some(42));
    }

    #[tokio::test]
    async fn anonymous_without_header() {
        let context = extract(Request::new(())).await.unwrap();
        assert_eq!(context.user_id, None);
    }

    #[tokio::test]
    async fn rejects_non_numeric_user() {
        let request = Request::builder().header(USER_HEADER, "admin").body(()).unwrap();
        assert!(matches!(extract(request).await, Err(ApiError::BadRequest(_))));
    }
}
