use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{debug, error};

use keystone_auth::AuthError;

/// Handler error carrying an [`AuthError`]; renders the structured body.
#[derive(Debug)]
pub struct ApiError(pub AuthError);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(
                status = status.as_u16(),
                technical = %err.technical_message(),
                detail = err.detail().unwrap_or_default(),
                "request failed"
            );
        } else {
            debug!(status = status.as_u16(), error = %err, "request rejected");
        }

        (status, axum::Json(err.to_body())).into_response()
    }
}

/// Error body for failures that never reached the auth core (bad path
/// parameters, worker panics).
pub fn json_error(
    status: StatusCode,
    fault: &'static str,
    user_message: impl Into<String>,
) -> Response {
    (
        status,
        axum::Json(json!({
            "fault": fault,
            "userMessage": user_message.into(),
            "technicalMessage": "",
        })),
    )
        .into_response()
}

/// Run blocking auth work (password hashing) off the async runtime.
pub async fn blocking<T, F>(f: F) -> Result<T, Response>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(|e| ApiError(e).into_response()),
        Err(e) => {
            error!(error = %e, "blocking task failed");
            Err(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "SERVER_ERROR",
                "SERVER_EXCEPTION_SERVER_ERROR",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_timeout_maps_to_440() {
        let res = ApiError(AuthError::LoginTimeout).into_response();
        assert_eq!(res.status().as_u16(), 440);
    }

    #[test]
    fn invalid_login_maps_to_412() {
        let res = ApiError(AuthError::from(
            keystone_auth::LoginFailure::InvalidCredentials,
        ))
        .into_response();
        assert_eq!(res.status(), StatusCode::PRECONDITION_FAILED);
    }
}
