//! The `/usuarios` resource.
//!
//! Each handler makes exactly one store call and maps the outcome:
//!
//! | Route | Success | Missing record |
//! |---|---|---|
//! | `POST /usuarios` | `201` + record | — |
//! | `GET /usuarios` | `200` + array | — |
//! | `GET /usuarios/{id}` | `200` + record | `404` |
//! | `PUT /usuarios/{id}` | `200` + record after the update | `404` |
//! | `DELETE /usuarios/{id}` | `200` + message | `404` |
//!
//! A malformed body is `400`. Any store failure is `500` with a message
//! naming the operation; the cause goes to the log, not to the client. An
//! identifier that is not a well-formed ObjectId is such a failure.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;
use crate::model::{self, Fields, NewUser, User};
use crate::response::{Created, Json};
use crate::state::AppState;
use crate::Request;

pub const GREETING: &str = "Bienvenido a la API CRUD";

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

pub async fn greeting(_state: AppState, _req: Request) -> &'static str {
    GREETING
}

pub async fn create_user(state: AppState, req: Request) -> Result<Created<User>, ApiError> {
    let fields = payload(&req)?;
    let user = state
        .store
        .insert(NewUser::new(fields, model::now()))
        .await
        .map_err(ApiError::internal("Error al crear el usuario"))?;

    debug!(id = %user.id, "user created");
    Ok(Created(user))
}

pub async fn list_users(state: AppState, _req: Request) -> Result<Json<Vec<User>>, ApiError> {
    let users = state
        .store
        .list()
        .await
        .map_err(ApiError::internal("Error al obtener los usuarios"))?;
    Ok(Json(users))
}

pub async fn get_user(state: AppState, req: Request) -> Result<Json<User>, ApiError> {
    state
        .store
        .find(id(&req))
        .await
        .map_err(ApiError::internal("Error al obtener el usuario"))?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

pub async fn update_user(state: AppState, req: Request) -> Result<Json<User>, ApiError> {
    let patch = payload(&req)?;
    state
        .store
        .update(id(&req), patch, model::now())
        .await
        .map_err(ApiError::internal("Error al actualizar el usuario"))?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

pub async fn delete_user(state: AppState, req: Request) -> Result<Json<Message>, ApiError> {
    let deleted = state
        .store
        .delete(id(&req))
        .await
        .map_err(ApiError::internal("Error al eliminar el usuario"))?;

    if !deleted {
        return Err(ApiError::NotFound);
    }
    debug!(id = id(&req), "user deleted");
    Ok(Json(Message { message: "Usuario eliminado" }))
}

/// The `{id}` segment. Always present on the routes that read it.
fn id(req: &Request) -> &str {
    req.param("id").unwrap_or_default()
}

/// Reads the body as record fields.
///
/// Only bodies declared as JSON or as an urlencoded form are read. An empty
/// body, or one of any other content type, is an empty field set.
fn payload(req: &Request) -> Result<Fields, ApiError> {
    if req.body().iter().all(u8::is_ascii_whitespace) {
        return Ok(Fields::new());
    }

    let fields = if req.is_form() {
        Fields::from_pairs(req.form())
    } else if req.is_json() {
        let value: Value = req
            .json()
            .map_err(|e| ApiError::BadRequest(format!("JSON inválido: {e}")))?;
        Fields::from_json(value)
    } else {
        debug!(content_type = ?req.header("content-type"), "ignoring body of unsupported type");
        return Ok(Fields::new());
    };

    fields.map_err(|e| ApiError::BadRequest(e.to_string()))
}
