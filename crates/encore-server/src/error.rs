use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

use crate::templates::{NotFoundTemplate, ServerErrorTemplate};

#[derive(Error, Debug)]
pub enum PageError {
    #[error("not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("template error: {0}")]
    Render(#[from] askama::Error),
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            PageError::NotFound => {
                let body = NotFoundTemplate
                    .render()
                    .unwrap_or_else(|_| "Not Found".to_string());
                (StatusCode::NOT_FOUND, Html(body)).into_response()
            }
            err => {
                // Internal detail goes to the log, never to the client.
                tracing::error!("request failed: {err}");
                let body = ServerErrorTemplate
                    .render()
                    .unwrap_or_else(|_| "Internal Server Error".to_string());
                (StatusCode::INTERNAL_SERVER_ERROR, Html(body)).into_response()
            }
        }
    }
}
