//! Error types.
//!
//! [`Error`] covers infrastructure failures that stop the process: binding
//! the port, bad configuration, an unreachable store at startup.
//!
//! [`ApiError`] is what route handlers return. It collapses every failure
//! into one of three answers: the request was malformed, the record does not
//! exist, or something else went wrong.

use thiserror::Error;
use tracing::error;

use crate::config::ConfigError;
use crate::response::{IntoResponse, Response};
use crate::status::Status;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("store: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Usuario no encontrado")]
    NotFound,

    /// `context` is the client-facing message; the source is only logged.
    #[error("{context}")]
    Internal {
        context: &'static str,
        #[source]
        source: StoreError,
    },
}

impl ApiError {
    /// Adapter for `map_err` on store calls.
    pub fn internal(context: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Internal { context, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::NotFound => Status::NotFound,
            ApiError::Internal { context, source } => {
                error!(error = %source, "{context}");
                Status::InternalServerError
            }
        };
        Response::error(status, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn maps_to_status_and_message() {
        let cases = [
            (ApiError::BadRequest("JSON inválido".into()), 400, "JSON inválido"),
            (ApiError::NotFound, 404, "Usuario no encontrado"),
            (
                ApiError::internal("Error al crear el usuario")(StoreError::Unavailable("down".into())),
                500,
                "Error al crear el usuario",
            ),
        ];

        for (err, status, message) in cases {
            let res = err.into_response();
            assert_eq!(res.status_code(), status);
            assert_eq!(res.body_json::<Value>().unwrap(), json!({ "error": message }));
        }
    }

    #[test]
    fn internal_hides_store_detail() {
        let res = ApiError::internal("Error al obtener los usuarios")(StoreError::Corrupt(
            "document without _id".into(),
        ))
        .into_response();
        assert!(!String::from_utf8_lossy(res.body()).contains("_id"));
    }
}
