use std::collections::{BTreeMap, HashMap};
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
use crate::forms::{FormData, VenueForm};
use crate::templates::{
    SearchVenuesTemplate, VenueDetailTemplate, VenueFormTemplate, VenuesTemplate,
};

/// One (city, state) group on the venues index.
pub struct CityGroup {
    pub city: String,
    pub state: String,
    pub venues: Vec<Listing>,
}

/// Venue detail view model.
pub struct VenuePage {
    pub id: Uuid,
    pub name: String,
    pub genres: Vec<String>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub phone: String,
    pub image_link: String,
    pub facebook_link: String,
    pub website_link: String,
    pub seeking_talent: bool,
    pub seeking_description: String,
    pub past_shows: Vec<ShowSlot>,
    pub upcoming_shows: Vec<ShowSlot>,
    pub past_shows_count: usize,
    pub upcoming_shows_count: usize,
}

/// Group venues by the full (city, state) key. A city that reappears later in
/// the input still lands in its one group, whatever the query order.
pub fn group_by_locality(
    venues: &[venue::Model],
    upcoming: &HashMap<Uuid, u64>,
) -> Vec<CityGroup> {
    let mut groups: BTreeMap<(String, String), Vec<Listing>> = BTreeMap::new();
    for v in venues {
        groups
            .entry((v.state.clone(), v.city.clone()))
            .or_default()
            .push(Listing {
                id: v.id,
                name: v.name.clone(),
                num_upcoming_shows: upcoming.get(&v.id).copied().unwrap_or(0),
            });
    }
    groups
        .into_iter()
        .map(|((state, city), venues)| CityGroup {
            city,
            state,
            venues,
        })
        .collect()
}

async fn upcoming_counts(
    db: &DatabaseConnection,
    venues: &[venue::Model],
    now: DateTime<FixedOffset>,
) -> Result<HashMap<Uuid, u64>, DbErr> {
    let mut counts = HashMap::with_capacity(venues.len());
    for v in venues {
        let count = show::Entity::find()
            .filter(show::Column::VenueId.eq(v.id))
            .filter(show::Column::StartTime.gt(now))
            .count(db)
            .await?;
        counts.insert(v.id, count);
    }
    Ok(counts)
}

/// GET /venues
pub async fn list_venues(State(state): State<Arc<AppState>>) -> Result<Response, PageError> {
    let now = now_fixed();
    let venues = venue::Entity::find()
        .order_by_asc(venue::Column::Name)
        .all(&state.db)
        .await?;
    let counts = upcoming_counts(&state.db, &venues, now).await?;

    let tmpl = VenuesTemplate {
        areas: group_by_locality(&venues, &counts),
    };
    Ok(Html(tmpl.render()?).into_response())
}

/// POST /venues/search
pub async fn search_venues(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, PageError> {
    let term = FormData::parse(&body).text("search_term");
    let pattern = like_pattern(&term);
    let now = now_fixed();

    let venues = venue::Entity::find()
        .filter(Expr::col(venue::Column::Name).ilike(pattern.as_str()))
        .order_by_asc(venue::Column::Name)
        .all(&state.db)
        .await?;
    let counts = upcoming_counts(&state.db, &venues, now).await?;

    let results: Vec<Listing> = venues
        .iter()
        .map(|v| Listing {
            id: v.id,
            name: v.name.clone(),
            num_upcoming_shows: counts.get(&v.id).copied().unwrap_or(0),
        })
        .collect();

    let tmpl = SearchVenuesTemplate {
        search_term: term,
        count: results.len(),
        results,
    };
    Ok(Html(tmpl.render()?).into_response())
}

fn artist_slots(shows: &[show::Model], artists: &HashMap<Uuid, artist::Model>) -> Vec<ShowSlot> {
    shows
        .iter()
        .map(|s| {
            let (name, image_link) = artists
                .get(&s.artist_id)
                .map(|a| (a.name.clone(), a.image_link.clone().unwrap_or_default()))
                .unwrap_or_default();
            ShowSlot {
                id: s.artist_id,
                name,
                image_link,
                start_time: format_start_time(&s.start_time),
            }
        })
        .collect()
}

/// GET /venues/{id}
pub async fn show_venue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let id = parse_id(&id)?;
    let venue = venue::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(PageError::NotFound)?;

    let shows = show::Entity::find()
        .filter(show::Column::VenueId.eq(id))
        .order_by_asc(show::Column::StartTime)
        .all(&state.db)
        .await?;
    let now = now_fixed();
    let (past, upcoming) = partition_shows(shows, now);

    let artist_ids: Vec<Uuid> = past
        .iter()
        .chain(upcoming.iter())
        .map(|s| s.artist_id)
        .collect();
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

    let tmpl = VenueDetailTemplate {
        venue: VenuePage {
            id: venue.id,
            name: venue.name,
            genres: split_genres(&venue.genres),
            address: venue.address,
            city: venue.city,
            state: venue.state,
            phone: venue.phone,
            image_link: venue.image_link.unwrap_or_default(),
            facebook_link: venue.facebook_link.unwrap_or_default(),
            website_link: venue.website_link.unwrap_or_default(),
            seeking_talent: venue.seeking_talent,
            seeking_description: venue.seeking_description.unwrap_or_default(),
            past_shows_count: past.len(),
            upcoming_shows_count: upcoming.len(),
            past_shows: artist_slots(&past, &artists),
            upcoming_shows: artist_slots(&upcoming, &artists),
        },
    };
    Ok(Html(tmpl.render()?).into_response())
}

/// GET /venues/create
pub async fn new_venue_form() -> Result<Response, PageError> {
    let tmpl = VenueFormTemplate::create(&VenueForm::default(), Vec::new());
    Ok(Html(tmpl.render()?).into_response())
}

/// POST /venues/create
pub async fn create_venue(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, PageError> {
    let form = VenueForm::from_form(&FormData::parse(&body));
    let errors = form.validate();
    if !errors.is_empty() {
        let tmpl = VenueFormTemplate::create(&form, errors);
        return Ok(Html(tmpl.render()?).into_response());
    }

    match insert_venue(&state.db, &form).await {
        Ok(created) => render_home(vec![format!(
            "Venue {} was successfully listed!",
            created.name
        )]),
        Err(err) => {
            tracing::error!("venue insert failed: {err}");
            render_home(vec![format!(
                "An error occurred. Venue {} could not be listed.",
                form.name
            )])
        }
    }
}

async fn insert_venue(db: &DatabaseConnection, form: &VenueForm) -> Result<venue::Model, DbErr> {
    let txn = db.begin().await?;
    let created = venue::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(form.name.clone()),
        city: Set(form.city.clone()),
        state: Set(form.state.clone()),
        address: Set(form.address.clone()),
        phone: Set(form.phone.clone()),
        genres: Set(form.genres_joined()),
        image_link: Set(non_empty(&form.image_link)),
        facebook_link: Set(non_empty(&form.facebook_link)),
        website_link: Set(non_empty(&form.website_link)),
        seeking_talent: Set(form.seeking_talent),
        seeking_description: Set(non_empty(&form.seeking_description)),
        created_at: Set(Utc::now().fixed_offset()),
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;
    Ok(created)
}

/// GET /venues/{id}/edit
pub async fn edit_venue_form(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let id = parse_id(&id)?;
    let venue = venue::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(PageError::NotFound)?;

    let tmpl = VenueFormTemplate::edit(id, &form_from_model(&venue), Vec::new());
    Ok(Html(tmpl.render()?).into_response())
}

/// POST /venues/{id}/edit
pub async fn update_venue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, PageError> {
    let id = parse_id(&id)?;
    let existing = venue::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(PageError::NotFound)?;

    let form = VenueForm::from_form(&FormData::parse(&body));
    let errors = form.validate();
    if !errors.is_empty() {
        let tmpl = VenueFormTemplate::edit(id, &form, errors);
        return Ok(Html(tmpl.render()?).into_response());
    }

    match apply_venue_update(&state.db, existing, &form).await {
        Ok(()) => Ok(Redirect::to(&format!("/venues/{id}")).into_response()),
        Err(err) => {
            tracing::error!("venue update failed: {err}");
            render_home(vec![format!(
                "An error occurred. Venue {} could not be updated.",
                form.name
            )])
        }
    }
}

async fn apply_venue_update(
    db: &DatabaseConnection,
    existing: venue::Model,
    form: &VenueForm,
) -> Result<(), DbErr> {
    let txn = db.begin().await?;
    let mut active: venue::ActiveModel = existing.into();
    active.name = Set(form.name.clone());
    active.city = Set(form.city.clone());
    active.state = Set(form.state.clone());
    active.address = Set(form.address.clone());
    active.phone = Set(form.phone.clone());
    active.genres = Set(form.genres_joined());
    active.image_link = Set(non_empty(&form.image_link));
    active.facebook_link = Set(non_empty(&form.facebook_link));
    active.website_link = Set(non_empty(&form.website_link));
    active.seeking_talent = Set(form.seeking_talent);
    active.seeking_description = Set(non_empty(&form.seeking_description));
    active.update(&txn).await?;
    txn.commit().await
}

/// DELETE /venues/{id}
///
/// Removes the venue's shows first, then the venue itself, in one
/// transaction. Redirects to the home page on success.
pub async fn delete_venue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let id = parse_id(&id)?;

    let txn = state.db.begin().await?;
    let venue = venue::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(PageError::NotFound)?;

    show::Entity::delete_many()
        .filter(show::Column::VenueId.eq(venue.id))
        .exec(&txn)
        .await?;
    venue::Entity::delete_by_id(venue.id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(venue_id = %id, "venue deleted");
    Ok(Redirect::to("/").into_response())
}

fn form_from_model(venue: &venue::Model) -> VenueForm {
    VenueForm {
        name: venue.name.clone(),
        city: venue.city.clone(),
        state: venue.state.clone(),
        address: venue.address.clone(),
        phone: venue.phone.clone(),
        genres: split_genres(&venue.genres),
        image_link: venue.image_link.clone().unwrap_or_default(),
        facebook_link: venue.facebook_link.clone().unwrap_or_default(),
        website_link: venue.website_link.clone().unwrap_or_default(),
        seeking_talent: venue.seeking_talent,
        seeking_description: venue.seeking_description.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn venue_in(name: &str, city: &str, state: &str) -> venue::Model {
        venue::Model {
            id: Uuid::new_v4(),
            name: name.to_string(),
            city: city.to_string(),
            state: state.to_string(),
            address: "123 Main St".to_string(),
            phone: "555-123-4567".to_string(),
            genres: "Jazz,Folk".to_string(),
            image_link: None,
            facebook_link: None,
            website_link: None,
            seeking_talent: false,
            seeking_description: None,
            created_at: Utc::now().fixed_offset(),
        }
    }

    // ── Grouping ──────────────────────────────────────────────────────

    #[test]
    fn test_grouping_merges_non_adjacent_localities() {
        // SF venues are interleaved with a NY venue; they must still form
        // one San Francisco group.
        let venues = vec![
            venue_in("The Musical Hop", "San Francisco", "CA"),
            venue_in("The Dueling Pianos Bar", "New York", "NY"),
            venue_in("Park Square Live Music & Coffee", "San Francisco", "CA"),
        ];
        let groups = group_by_locality(&venues, &HashMap::new());
        assert_eq!(groups.len(), 2);
        let sf = groups
            .iter()
            .find(|g| g.city == "San Francisco")
            .expect("san francisco group");
        assert_eq!(sf.venues.len(), 2);
    }

    #[test]
    fn test_grouping_one_group_per_distinct_locality() {
        let venues = vec![
            venue_in("A", "Portland", "OR"),
            venue_in("B", "Portland", "ME"),
            venue_in("C", "Portland", "OR"),
            venue_in("D", "Portland", "ME"),
        ];
        let groups = group_by_locality(&venues, &HashMap::new());
        // Same city name, different states: two groups, no duplicates.
        assert_eq!(groups.len(), 2);
        for group in &groups {
            assert_eq!(group.venues.len(), 2);
        }
    }

    #[test]
    fn test_grouping_order_is_deterministic() {
        let venues = vec![
            venue_in("A", "Seattle", "WA"),
            venue_in("B", "Austin", "TX"),
            venue_in("C", "Boston", "MA"),
        ];
        let first: Vec<String> = group_by_locality(&venues, &HashMap::new())
            .iter()
            .map(|g| g.state.clone())
            .collect();
        let reversed: Vec<venue::Model> = venues.into_iter().rev().collect();
        let second: Vec<String> = group_by_locality(&reversed, &HashMap::new())
            .iter()
            .map(|g| g.state.clone())
            .collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["MA", "TX", "WA"]);
    }

    #[test]
    fn test_grouping_carries_upcoming_counts() {
        let venues = vec![venue_in("The Musical Hop", "San Francisco", "CA")];
        let mut counts = HashMap::new();
        counts.insert(venues[0].id, 3);
        let groups = group_by_locality(&venues, &counts);
        assert_eq!(groups[0].venues[0].num_upcoming_shows, 3);
    }

    #[test]
    fn test_grouping_empty_input() {
        assert!(group_by_locality(&[], &HashMap::new()).is_empty());
    }

    // ── Form round-trip ───────────────────────────────────────────────

    #[test]
    fn test_form_from_model_splits_genres() {
        let venue = venue_in("The Musical Hop", "San Francisco", "CA");
        let form = form_from_model(&venue);
        assert_eq!(form.genres, vec!["Jazz", "Folk"]);
        assert!(form.validate().is_empty());
        assert_eq!(form.genres_joined(), venue.genres);
    }
}
