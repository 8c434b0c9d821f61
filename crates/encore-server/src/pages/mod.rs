//! Page handlers and the view helpers they share.

pub mod artists;
pub mod shows;
pub mod venues;

use askama::Template;
use axum::response::{Html, IntoResponse, Response};
use chrono::{DateTime, FixedOffset, Utc};
use uuid::Uuid;

use encore_db::entities::show;

use crate::error::PageError;
use crate::templates::HomeTemplate;

/// One listed venue or artist: a detail link plus its upcoming-show count.
pub struct Listing {
    pub id: Uuid,
    pub name: String,
    pub num_upcoming_shows: u64,
}

/// A show row on a detail page, carrying the counterpart's id, name, image,
/// and formatted start time.
pub struct ShowSlot {
    pub id: Uuid,
    pub name: String,
    pub image_link: String,
    pub start_time: String,
}

/// GET /
pub async fn home() -> Result<Response, PageError> {
    render_home(Vec::new())
}

pub(crate) fn render_home(flash: Vec<String>) -> Result<Response, PageError> {
    let tmpl = HomeTemplate { flash };
    Ok(Html(tmpl.render()?).into_response())
}

/// Fallback for unknown routes.
pub async fn not_found() -> Response {
    PageError::NotFound.into_response()
}

/// The instant shows are classified against. Captured once per request so
/// every show in one response is compared to the same "now".
pub(crate) fn now_fixed() -> DateTime<FixedOffset> {
    Utc::now().fixed_offset()
}

/// Path ids are parsed by hand so a malformed id gets the 404 page instead of
/// a bare rejection.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, PageError> {
    Uuid::parse_str(raw).map_err(|_| PageError::NotFound)
}

/// Escape SQL LIKE wildcards so user input matches literally.
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term.trim().replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

pub(crate) fn split_genres(genres: &str) -> Vec<String> {
    genres
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

pub(crate) fn format_start_time(start: &DateTime<FixedOffset>) -> String {
    start.format("%Y-%m-%d %H:%M").to_string()
}

/// Split shows into (past, upcoming) against a single instant. A show is
/// upcoming iff it starts strictly later than `now`.
pub(crate) fn partition_shows(
    shows: Vec<show::Model>,
    now: DateTime<FixedOffset>,
) -> (Vec<show::Model>, Vec<show::Model>) {
    shows.into_iter().partition(|s| s.start_time <= now)
}
