use std::collections::HashMap;
use std::sync::Arc;

use askama::Template;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{Html, IntoResponse, Response};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use encore_db::entities::{artist, show, venue};
use encore_db::AppState;

use super::{format_start_time, render_home};
use crate::error::PageError;
use crate::forms::{FormData, ShowForm, ShowInput};
use crate::templates::{ShowFormTemplate, ShowsTemplate};

/// One row on the shows listing.
pub struct ShowListing {
    pub venue_id: Uuid,
    pub venue_name: String,
    pub artist_id: Uuid,
    pub artist_name: String,
    pub artist_image_link: String,
    pub start_time: String,
}

/// GET /shows
pub async fn list_shows(State(state): State<Arc<AppState>>) -> Result<Response, PageError> {
    let shows = show::Entity::find()
        .order_by_asc(show::Column::StartTime)
        .all(&state.db)
        .await?;

    let artist_ids: Vec<Uuid> = shows.iter().map(|s| s.artist_id).collect();
    let venue_ids: Vec<Uuid> = shows.iter().map(|s| s.venue_id).collect();

    let artists: HashMap<Uuid, artist::Model> = if artist_ids.is_empty() {
        HashMap::new()
    } else {
        artist::Entity::find()
            .filter(artist::Column::Id.is_in(artist_ids))
            .all(&state.db)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect()
    };
    let venues: HashMap<Uuid, venue::Model> = if venue_ids.is_empty() {
        HashMap::new()
    } else {
        venue::Entity::find()
            .filter(venue::Column::Id.is_in(venue_ids))
            .all(&state.db)
            .await?
            .into_iter()
            .map(|v| (v.id, v))
            .collect()
    };

    let rows: Vec<ShowListing> = shows
        .iter()
        .map(|s| {
            let artist = artists.get(&s.artist_id);
            ShowListing {
                venue_id: s.venue_id,
                venue_name: venues
                    .get(&s.venue_id)
                    .map(|v| v.name.clone())
                    .unwrap_or_default(),
                artist_id: s.artist_id,
                artist_name: artist.map(|a| a.name.clone()).unwrap_or_default(),
                artist_image_link: artist
                    .and_then(|a| a.image_link.clone())
                    .unwrap_or_default(),
                start_time: format_start_time(&s.start_time),
            }
        })
        .collect();

    let tmpl = ShowsTemplate { shows: rows };
    Ok(Html(tmpl.render()?).into_response())
}

/// GET /shows/create
pub async fn new_show_form() -> Result<Response, PageError> {
    let tmpl = ShowFormTemplate {
        form: ShowForm::default(),
        errors: Vec::new(),
    };
    Ok(Html(tmpl.render()?).into_response())
}

enum ShowInsertOutcome {
    Created,
    MissingArtist,
    MissingVenue,
}

/// Existence of both referenced records is checked inside the same
/// transaction as the insert.
async fn insert_show(db: &DatabaseConnection, input: ShowInput) -> Result<ShowInsertOutcome, DbErr> {
    let txn = db.begin().await?;

    if artist::Entity::find_by_id(input.artist_id)
        .one(&txn)
        .await?
        .is_none()
    {
        txn.rollback().await?;
        return Ok(ShowInsertOutcome::MissingArtist);
    }
    if venue::Entity::find_by_id(input.venue_id)
        .one(&txn)
        .await?
        .is_none()
    {
        txn.rollback().await?;
        return Ok(ShowInsertOutcome::MissingVenue);
    }

    show::ActiveModel {
        id: Set(Uuid::new_v4()),
        start_time: Set(input.start_time),
        artist_id: Set(input.artist_id),
        venue_id: Set(input.venue_id),
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;
    Ok(ShowInsertOutcome::Created)
}

/// POST /shows/create
pub async fn create_show(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, PageError> {
    let form = ShowForm::from_form(&FormData::parse(&body));
    let input = match form.resolve() {
        Ok(input) => input,
        Err(errors) => {
            let tmpl = ShowFormTemplate { form, errors };
            return Ok(Html(tmpl.render()?).into_response());
        }
    };

    match insert_show(&state.db, input).await {
        Ok(ShowInsertOutcome::Created) => render_home(vec!["Show created successfully!".to_string()]),
        Ok(ShowInsertOutcome::MissingArtist) => {
            let tmpl = ShowFormTemplate {
                form,
                errors: vec!["No artist with that id exists.".to_string()],
            };
            Ok(Html(tmpl.render()?).into_response())
        }
        Ok(ShowInsertOutcome::MissingVenue) => {
            let tmpl = ShowFormTemplate {
                form,
                errors: vec!["No venue with that id exists.".to_string()],
            };
            Ok(Html(tmpl.render()?).into_response())
        }
        Err(err) => {
            tracing::error!("show insert failed: {err}");
            render_home(vec!["An error occurred. Show could not be created.".to_string()])
        }
    }
}
