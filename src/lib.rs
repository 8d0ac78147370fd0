//! # usuarios
//!
//! CRUD over one collection of user records, served over HTTP.
//!
//! ```text
//! hyper ──▶ Server ──▶ Router<AppState> ──▶ routes ──▶ dyn UserStore
//!                                                       ├─ MongoStore
//!                                                       └─ MemoryStore
//! ```
//!
//! Records are schema-less: any JSON object is accepted, apart from a few
//! structural checks on field names (see [`model::Fields`]). The store is
//! built once at startup and injected through [`AppState`]; nothing is held
//! in globals.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use usuarios::{AppState, Server, app, store::MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), usuarios::Error> {
//!     let state = AppState::new(Arc::new(MemoryStore::new()));
//!     Server::bind("127.0.0.1:3000".parse().unwrap())
//!         .await?
//!         .serve(app(state))
//!         .await
//! }
//! ```

mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;
mod status;

pub mod config;
pub mod error;
pub mod health;
pub mod model;
pub mod routes;
pub mod state;
pub mod store;

use std::sync::Arc;

use tracing::{info, warn};

pub use config::{Config, StoreKind};
pub use error::{ApiError, Error};
pub use handler::Handler;
pub use method::Method;
pub use request::Request;
pub use response::{Created, IntoResponse, Json, Response, ResponseBuilder};
pub use router::Router;
pub use server::{MAX_BODY_BYTES, Server};
pub use state::AppState;
pub use status::Status;

use store::{MemoryStore, MongoStore, UserStore};

/// The route table.
pub fn app(state: AppState) -> Router<AppState> {
    Router::with_state(state)
        .get("/", routes::greeting)
        .get("/usuarios", routes::list_users)
        .post("/usuarios", routes::create_user)
        .get("/usuarios/{id}", routes::get_user)
        .put("/usuarios/{id}", routes::update_user)
        .delete("/usuarios/{id}", routes::delete_user)
        .get("/healthz", health::liveness)
        .get("/readyz", health::readiness)
}

/// Connects the configured store, then serves until SIGTERM or Ctrl-C.
///
/// The store is reachable before the listener binds; a store that cannot be
/// pinged aborts startup.
pub async fn run(config: Config) -> Result<(), Error> {
    let store: Arc<dyn UserStore> = match config.store {
        StoreKind::Memory => {
            warn!("using the in-memory store; records are lost on exit");
            Arc::new(MemoryStore::new())
        }
        StoreKind::Mongo => {
            let uri = config.mongo_uri.as_deref().ok_or(config::ConfigError::MissingUri)?;
            let store = MongoStore::connect(uri).await?;
            store.ping().await?;
            info!(database = store.database_name(), "connected to MongoDB");
            Arc::new(store)
        }
    };

    let server = Server::bind(config.addr()).await?;
    server.serve(app(AppState::new(store))).await
}
