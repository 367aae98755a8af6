pub mod auth;
pub mod forms;
pub mod pages;
pub mod render;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::catalog::CatalogService;
use crate::cli::ServeArgs;
use crate::db::Database;
use crate::error::Error;
use crate::identity::{IdentityStore, SqliteIdentityStore};
use crate::store::SqliteCatalogStore;

#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub identity: Arc<dyn IdentityStore>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self {
            catalog: CatalogService::new(Arc::new(SqliteCatalogStore::new(db.clone()))),
            identity: Arc::new(SqliteIdentityStore::new(db)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/", get(pages::book_list))
        .route("/books/add", get(pages::book_add_form).post(pages::book_add))
        .route("/books/:id", get(pages::book_detail))
        .route(
            "/books/:id/edit",
            get(pages::book_edit_form).post(pages::book_edit),
        )
        .route(
            "/books/:id/delete",
            get(pages::book_delete_confirm).post(pages::book_delete),
        )
        .route(
            "/books/:id/add-chapter",
            get(pages::chapter_add_form).post(pages::chapter_add),
        )
        .route(
            "/chapters/:id/edit",
            get(pages::chapter_edit_form).post(pages::chapter_edit),
        )
        .route(
            "/chapters/:id/delete",
            get(pages::chapter_delete_confirm).post(pages::chapter_delete),
        )
        .route("/books/:id/favorite", get(pages::favorite_add))
        .route("/books/:id/unfavorite", get(pages::favorite_remove))
        .route("/search", get(pages::search))
        .route("/profile", get(pages::profile))
        .route(
            "/authors/add",
            get(pages::author_add_form).post(pages::author_add),
        )
        .route(
            "/accounts/register",
            get(auth::register_form).post(auth::register),
        )
        .route("/accounts/login", get(auth::login_form).post(auth::login))
        .route("/accounts/logout", get(auth::logout))
        .route(
            "/accounts/password-change",
            get(auth::password_change_form).post(auth::password_change),
        )
        .with_state(state)
}

pub async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let db = Database::open(&args.db).await?;
    tokio::fs::create_dir_all(&args.media_dir).await?;

    let state = AppState::new(db);
    let app = router(state)
        .nest_service("/media", ServeDir::new(&args.media_dir))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, db = %args.db.display(), "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutting down");
}

/// A service error paired with the path the user was trying to reach, so
/// the login redirect can send them back after signing in.
///
/// Routes with operation-specific denial behavior (silent redirects,
/// access-denied pages, form re-rendering) intercept those variants before
/// falling back to this.
pub struct Failure {
    err: Error,
    next: String,
}

impl Failure {
    pub(crate) fn new(err: Error, next: impl Into<String>) -> Self {
        Self {
            err,
            next: next.into(),
        }
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        match &self.err {
            Error::Unauthenticated => auth::login_redirect(&self.next),
            Error::NotFound(what) => {
                (StatusCode::NOT_FOUND, render::not_found_page(what)).into_response()
            }
            Error::PermissionDenied(_) => Redirect::to("/").into_response(),
            Error::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                render::validation_page(errors),
            )
                .into_response(),
            Error::Database(_) | Error::Io(_) => {
                tracing::error!(error = %self.err, path = %self.next, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, render::server_error_page()).into_response()
            }
        }
    }
}
