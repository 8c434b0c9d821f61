use std::collections::HashMap;
use std::sync::Arc;

use askama::Template;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use encore_db::entities::{artist, show, venue};
use encore_db::AppState;

use super::{
    format_start_time, like_pattern, non_empty, now_fixed, parse_id, partition_shows, render_home,
    split_genres, Listing, ShowSlot,
};
use crate::error::PageError;
use crate::forms::{ArtistForm, FormData};
use crate::templates::{
    ArtistDetailTemplate, ArtistFormTemplate, ArtistsTemplate, SearchArtistsTemplate,
};

/// Artist detail view model.
pub struct ArtistPage {
    pub id: Uuid,
    pub name: String,
    pub genres: Vec<String>,
    pub city: String,
    pub state: String,
    pub phone: String,
    pub image_link: String,
    pub facebook_link: String,
    pub website_link: String,
    pub seeking_venue: bool,
    pub seeking_description: String,
    pub past_shows: Vec<ShowSlot>,
    pub upcoming_shows: Vec<ShowSlot>,
    pub past_shows_count: usize,
    pub upcoming_shows_count: usize,
}

async fn upcoming_counts(
    db: &DatabaseConnection,
    artists: &[artist::Model],
    now: DateTime<FixedOffset>,
) -> Result<HashMap<Uuid, u64>, DbErr> {
    let mut counts = HashMap::with_capacity(artists.len());
    for a in artists {
        let count = show::Entity::find()
            .filter(show::Column::ArtistId.eq(a.id))
            .filter(show::Column::StartTime.gt(now))
            .count(db)
            .await?;
        counts.insert(a.id, count);
    }
    Ok(counts)
}

fn listings(artists: &[artist::Model], counts: &HashMap<Uuid, u64>) -> Vec<Listing> {
    artists
        .iter()
        .map(|a| Listing {
            id: a.id,
            name: a.name.clone(),
            num_upcoming_shows: counts.get(&a.id).copied().unwrap_or(0),
        })
        .collect()
}

/// GET /artists
pub async fn list_artists(State(state): State<Arc<AppState>>) -> Result<Response, PageError> {
    let now = now_fixed();
    let artists = artist::Entity::find()
        .order_by_asc(artist::Column::Name)
        .all(&state.db)
        .await?;
    let counts = upcoming_counts(&state.db, &artists, now).await?;

    let tmpl = ArtistsTemplate {
        artists: listings(&artists, &counts),
    };
    Ok(Html(tmpl.render()?).into_response())
}

/// POST /artists/search
pub async fn search_artists(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, PageError> {
    let term = FormData::parse(&body).text("search_term");
    let pattern = like_pattern(&term);
    let now = now_fixed();

    let artists = artist::Entity::find()
        .filter(Expr::col(artist::Column::Name).ilike(pattern.as_str()))
        .order_by_asc(artist::Column::Name)
        .all(&state.db)
        .await?;
    let counts = upcoming_counts(&state.db, &artists, now).await?;
    let results = listings(&artists, &counts);

    let tmpl = SearchArtistsTemplate {
        search_term: term,
        count: results.len(),
        results,
    };
    Ok(Html(tmpl.render()?).into_response())
}

fn venue_slots(shows: &[show::Model], venues: &HashMap<Uuid, venue::Model>) -> Vec<ShowSlot> {
    shows
        .iter()
        .map(|s| {
            let (name, image_link) = venues
                .get(&s.venue_id)
                .map(|v| (v.name.clone(), v.image_link.clone().unwrap_or_default()))
                .unwrap_or_default();
            ShowSlot {
                id: s.venue_id,
                name,
                image_link,
                start_time: format_start_time(&s.start_time),
            }
        })
        .collect()
}

/// GET /artists/{id}
pub async fn show_artist(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let id = parse_id(&id)?;
    let artist = artist::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(PageError::NotFound)?;

    let shows = show::Entity::find()
        .filter(show::Column::ArtistId.eq(id))
        .order_by_asc(show::Column::StartTime)
        .all(&state.db)
        .await?;
    let now = now_fixed();
    let (past, upcoming) = partition_shows(shows, now);

    let venue_ids: Vec<Uuid> = past
        .iter()
        .chain(upcoming.iter())
        .map(|s| s.venue_id)
        .collect();
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

    let tmpl = ArtistDetailTemplate {
        artist: ArtistPage {
            id: artist.id,
            name: artist.name,
            genres: split_genres(&artist.genres),
            city: artist.city,
            state: artist.state,
            phone: artist.phone,
            image_link: artist.image_link.unwrap_or_default(),
            facebook_link: artist.facebook_link.unwrap_or_default(),
            website_link: artist.website_link.unwrap_or_default(),
            seeking_venue: artist.seeking_venue,
            seeking_description: artist.seeking_description.unwrap_or_default(),
            past_shows_count: past.len(),
            upcoming_shows_count: upcoming.len(),
            past_shows: venue_slots(&past, &venues),
            upcoming_shows: venue_slots(&upcoming, &venues),
        },
    };
    Ok(Html(tmpl.render()?).into_response())
}

/// GET /artists/create
pub async fn new_artist_form() -> Result<Response, PageError> {
    let tmpl = ArtistFormTemplate::create(&ArtistForm::default(), Vec::new());
    Ok(Html(tmpl.render()?).into_response())
}

/// POST /artists/create
pub async fn create_artist(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, PageError> {
    let form = ArtistForm::from_form(&FormData::parse(&body));
    let errors = form.validate();
    if !errors.is_empty() {
        let tmpl = ArtistFormTemplate::create(&form, errors);
        return Ok(Html(tmpl.render()?).into_response());
    }

    match insert_artist(&state.db, &form).await {
        Ok(created) => render_home(vec![format!(
            "Artist {} was successfully listed!",
            created.name
        )]),
        Err(err) => {
            tracing::error!("artist insert failed: {err}");
            render_home(vec![format!(
                "An error occurred. Artist {} could not be listed.",
                form.name
            )])
        }
    }
}

async fn insert_artist(db: &DatabaseConnection, form: &ArtistForm) -> Result<artist::Model, DbErr> {
    let txn = db.begin().await?;
    let created = artist::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(form.name.clone()),
        city: Set(form.city.clone()),
        state: Set(form.state.clone()),
        phone: Set(form.phone.clone()),
        genres: Set(form.genres_joined()),
        image_link: Set(non_empty(&form.image_link)),
        facebook_link: Set(non_empty(&form.facebook_link)),
        website_link: Set(non_empty(&form.website_link)),
        seeking_venue: Set(form.seeking_venue),
        seeking_description: Set(non_empty(&form.seeking_description)),
        created_at: Set(Utc::now().fixed_offset()),
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;
    Ok(created)
}

/// GET /artists/{id}/edit
pub async fn edit_artist_form(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let id = parse_id(&id)?;
    let artist = artist::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(PageError::NotFound)?;

    let tmpl = ArtistFormTemplate::edit(id, &form_from_model(&artist), Vec::new());
    Ok(Html(tmpl.render()?).into_response())
}

/// POST /artists/{id}/edit
pub async fn update_artist(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, PageError> {
    let id = parse_id(&id)?;
    let existing = artist::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(PageError::NotFound)?;

    let form = ArtistForm::from_form(&FormData::parse(&body));
    let errors = form.validate();
    if !errors.is_empty() {
        let tmpl = ArtistFormTemplate::edit(id, &form, errors);
        return Ok(Html(tmpl.render()?).into_response());
    }

    match apply_artist_update(&state.db, existing, &form).await {
        Ok(()) => Ok(Redirect::to(&format!("/artists/{id}")).into_response()),
        Err(err) => {
            tracing::error!("artist update failed: {err}");
            render_home(vec![format!(
                "An error occurred. Artist {} could not be updated.",
                form.name
            )])
        }
    }
}

async fn apply_artist_update(
    db: &DatabaseConnection,
    existing: artist::Model,
    form: &ArtistForm,
) -> Result<(), DbErr> {
    let txn = db.begin().await?;
    let mut active: artist::ActiveModel = existing.into();
    active.name = Set(form.name.clone());
    active.city = Set(form.city.clone());
    active.state = Set(form.state.clone());
    active.phone = Set(form.phone.clone());
    active.genres = Set(form.genres_joined());
    active.image_link = Set(non_empty(&form.image_link));
    active.facebook_link = Set(non_empty(&form.facebook_link));
    active.website_link = Set(non_empty(&form.website_link));
    active.seeking_venue = Set(form.seeking_venue);
    active.seeking_description = Set(non_empty(&form.seeking_description));
    active.update(&txn).await?;
    txn.commit().await
}

fn form_from_model(artist: &artist::Model) -> ArtistForm {
    ArtistForm {
        name: artist.name.clone(),
        city: artist.city.clone(),
        state: artist.state.clone(),
        phone: artist.phone.clone(),
        genres: split_genres(&artist.genres),
        image_link: artist.image_link.clone().unwrap_or_default(),
        facebook_link: artist.facebook_link.clone().unwrap_or_default(),
        website_link: artist.website_link.clone().unwrap_or_default(),
        seeking_venue: artist.seeking_venue,
        seeking_description: artist.seeking_description.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artist_named(name: &str) -> artist::Model {
        artist::Model {
            id: Uuid::new_v4(),
            name: name.to_string(),
            city: "San Francisco".to_string(),
            state: "CA".to_string(),
            phone: "326-123-5000".to_string(),
            genres: "Rock n Roll".to_string(),
            image_link: Some("https://example.com/guns.jpg".to_string()),
            facebook_link: None,
            website_link: None,
            seeking_venue: true,
            seeking_description: Some("Looking for shows".to_string()),
            created_at: Utc::now().fixed_offset(),
        }
    }

    #[test]
    fn test_listings_default_to_zero_upcoming() {
        let artists = vec![artist_named("Guns N Petals")];
        let rows = listings(&artists, &HashMap::new());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].num_upcoming_shows, 0);
        assert_eq!(rows[0].name, "Guns N Petals");
    }

    #[test]
    fn test_form_from_model_round_trip() {
        let artist = artist_named("The Wild Sax Band");
        let form = form_from_model(&artist);
        assert!(form.validate().is_empty());
        assert_eq!(form.genres_joined(), artist.genres);
        assert!(form.seeking_venue);
        assert_eq!(form.facebook_link, "");
    }
}
