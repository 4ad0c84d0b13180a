use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gitops_core::error::GitopsError;

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
///
/// The body is `{"error": <code>, "message": <text>}` where `code` is the
/// stable taxonomy name from [`GitopsError::code`].
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self.0.downcast_ref::<GitopsError>() {
            Some(e) => {
                let status = match e {
                    GitopsError::InvalidVersion(_) => StatusCode::BAD_REQUEST,
                    GitopsError::AlreadyInProgress { .. } => StatusCode::CONFLICT,
                    GitopsError::NoRollbackTarget(_) => StatusCode::NOT_FOUND,
                    GitopsError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    GitopsError::ConfigNotFound(_)
                    | GitopsError::Io(_)
                    | GitopsError::Yaml(_)
                    | GitopsError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.code())
            }
            None => (StatusCode::INTERNAL_SERVER_ERROR, "Internal"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": code, "message": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;

    #[test]
    fn invalid_version_maps_to_400() {
        let err = AppError(GitopsError::InvalidVersion("latest".into()).into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn already_in_progress_maps_to_409() {
        let err = AppError(
            GitopsError::AlreadyInProgress {
                target: "v2.0.0".into(),
                requested: "v3.0.0".into(),
            }
            .into(),
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn no_rollback_target_maps_to_404() {
        let err = AppError(GitopsError::NoRollbackTarget("v1.0.0".into()).into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_transition_maps_to_422() {
        let err = AppError(
            GitopsError::InvalidTransition {
                from: "Synced".into(),
                event: "succeed".into(),
                reason: "no sync in flight".into(),
            }
            .into(),
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn io_error_maps_to_500() {
        let io_err = std::io::Error::other("disk full");
        let err = AppError(GitopsError::Io(io_err).into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn non_gitops_error_maps_to_500() {
        let err = AppError(anyhow::anyhow!("something unexpected"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn response_body_carries_code_and_message() {
        let err = AppError(
            GitopsError::AlreadyInProgress {
                target: "v2.0.0".into(),
                requested: "v3.0.0".into(),
            }
            .into(),
        );
        let response = err.into_response();
        let ct = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(ct.to_str().unwrap().contains("application/json"));

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "AlreadyInProgress");
        assert!(json["message"].as_str().unwrap().contains("v2.0.0"));
    }
}
