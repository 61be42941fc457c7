//! Request authentication.
//!
//! Credentials arrive as an HTTP Basic authorization header and are verified
//! against the user store on every request.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::headers::authorization::{Authorization, Basic};
use axum::http::request::Parts;
use axum::{RequestPartsExt, TypedHeader};

use crate::app_state::SharedAppState;
use crate::error::EquistatError;
use crate::user_store::Principal;

/// The authenticated caller of a request.
pub struct CurrentUser(pub Principal);

#[async_trait]
impl FromRequestParts<SharedAppState> for CurrentUser {
    type Rejection = EquistatError;

    /// Extract a `CurrentUser` from the request headers.
    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedAppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(auth) = parts
            .extract::<TypedHeader<Authorization<Basic>>>()
            .await?;
        let principal = state
            .user_store
            .authenticate(auth.username(), auth.password())?;
        Ok(CurrentUser(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;

    use axum::body::Body;
    use axum::http::{self, header, Request, StatusCode};
    use axum::response::Response;
    use axum::routing::get;
    use axum::Router;
    use base64::prelude::*;
    use tower::ServiceExt;

    use crate::test_utils;

    async fn whoami(CurrentUser(principal): CurrentUser) -> String {
        principal.username
    }

    // Build a single-route service with one registered user.
    async fn service(data_dir: &Path) -> Router {
        let args = test_utils::test_args(data_dir);
        let state = test_utils::test_state(&args).await;
        state
            .user_store
            .register("alice", "hunter2", "", false)
            .await
            .unwrap();
        Router::new().route("/whoami", get(whoami)).with_state(state)
    }

    fn basic(username: &str, password: &str) -> String {
        format!(
            "Basic {}",
            BASE64_STANDARD.encode(format!("{}:{}", username, password))
        )
    }

    async fn request(service: Router, authorization: Option<String>) -> Response {
        let mut builder = Request::builder().method(http::Method::GET).uri("/whoami");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        service
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn valid_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let response = request(service, Some(basic("alice", "hunter2"))).await;
        assert_eq!(StatusCode::OK, response.status());
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!("alice", body);
    }

    #[tokio::test]
    async fn missing_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let response = request(service, None).await;
        assert_eq!(StatusCode::UNAUTHORIZED, response.status());
        assert_eq!(
            "Basic realm=\"equistat\"",
            response.headers()[header::WWW_AUTHENTICATE]
        );
    }

    #[tokio::test]
    async fn wrong_password() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let response = request(service, Some(basic("alice", "letmein"))).await;
        assert_eq!(StatusCode::UNAUTHORIZED, response.status());
    }
}
