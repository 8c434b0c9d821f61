//! Askama templates, one struct per rendered page.

use askama::Template;
use uuid::Uuid;

use crate::forms::{ArtistForm, ShowForm, VenueForm, GENRES, STATES};
use crate::pages::artists::ArtistPage;
use crate::pages::shows::ShowListing;
use crate::pages::venues::{CityGroup, VenuePage};
use crate::pages::Listing;

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub flash: Vec<String>,
}

#[derive(Template)]
#[template(path = "venues.html")]
pub struct VenuesTemplate {
    pub areas: Vec<CityGroup>,
}

#[derive(Template)]
#[template(path = "artists.html")]
pub struct ArtistsTemplate {
    pub artists: Vec<Listing>,
}

#[derive(Template)]
#[template(path = "search_venues.html")]
pub struct SearchVenuesTemplate {
    pub search_term: String,
    pub count: usize,
    pub results: Vec<Listing>,
}

#[derive(Template)]
#[template(path = "search_artists.html")]
pub struct SearchArtistsTemplate {
    pub search_term: String,
    pub count: usize,
    pub results: Vec<Listing>,
}

#[derive(Template)]
#[template(path = "venue_detail.html")]
pub struct VenueDetailTemplate {
    pub venue: VenuePage,
}

#[derive(Template)]
#[template(path = "artist_detail.html")]
pub struct ArtistDetailTemplate {
    pub artist: ArtistPage,
}

#[derive(Template)]
#[template(path = "shows.html")]
pub struct ShowsTemplate {
    pub shows: Vec<ShowListing>,
}

/// A select/multi-select entry with its checked state, so form templates
/// never inspect form values themselves.
pub struct ChoiceOption {
    pub value: String,
    pub selected: bool,
}

fn genre_options(selected: &[String]) -> Vec<ChoiceOption> {
    GENRES
        .iter()
        .map(|genre| ChoiceOption {
            value: genre.to_string(),
            selected: selected.iter().any(|s| s == genre),
        })
        .collect()
}

fn state_options(selected: &str) -> Vec<ChoiceOption> {
    STATES
        .iter()
        .map(|state| ChoiceOption {
            value: state.to_string(),
            selected: *state == selected,
        })
        .collect()
}

#[derive(Template)]
#[template(path = "venue_form.html")]
pub struct VenueFormTemplate {
    pub heading: &'static str,
    pub action: String,
    pub errors: Vec<String>,
    pub form: VenueForm,
    pub genre_options: Vec<ChoiceOption>,
    pub state_options: Vec<ChoiceOption>,
}

impl VenueFormTemplate {
    pub fn create(form: &VenueForm, errors: Vec<String>) -> Self {
        Self::build("List a new venue", "/venues/create".to_string(), form, errors)
    }

    pub fn edit(id: Uuid, form: &VenueForm, errors: Vec<String>) -> Self {
        Self::build("Edit venue", format!("/venues/{id}/edit"), form, errors)
    }

    fn build(heading: &'static str, action: String, form: &VenueForm, errors: Vec<String>) -> Self {
        Self {
            heading,
            action,
            errors,
            genre_options: genre_options(&form.genres),
            state_options: state_options(&form.state),
            form: form.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "artist_form.html")]
pub struct ArtistFormTemplate {
    pub heading: &'static str,
    pub action: String,
    pub errors: Vec<String>,
    pub form: ArtistForm,
    pub genre_options: Vec<ChoiceOption>,
    pub state_options: Vec<ChoiceOption>,
}

impl ArtistFormTemplate {
    pub fn create(form: &ArtistForm, errors: Vec<String>) -> Self {
        Self::build("List a new artist", "/artists/create".to_string(), form, errors)
    }

    pub fn edit(id: Uuid, form: &ArtistForm, errors: Vec<String>) -> Self {
        Self::build("Edit artist", format!("/artists/{id}/edit"), form, errors)
    }

    fn build(heading: &'static str, action: String, form: &ArtistForm, errors: Vec<String>) -> Self {
        Self {
            heading,
            action,
            errors,
            genre_options: genre_options(&form.genres),
            state_options: state_options(&form.state),
            form: form.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "show_form.html")]
pub struct ShowFormTemplate {
    pub errors: Vec<String>,
    pub form: ShowForm,
}

#[derive(Template)]
#[template(path = "404.html")]
pub struct NotFoundTemplate;

#[derive(Template)]
#[template(path = "500.html")]
pub struct ServerErrorTemplate;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_renders_flash() {
        let html = HomeTemplate {
            flash: vec!["Venue The Musical Hop was successfully listed!".to_string()],
        }
        .render()
        .unwrap();
        assert!(html.contains("successfully listed"));
    }

    #[test]
    fn test_home_escapes_flash() {
        let html = HomeTemplate {
            flash: vec!["<script>alert(1)</script>".to_string()],
        }
        .render()
        .unwrap();
        assert!(!html.contains("<script>alert"));
    }

    #[test]
    fn test_error_templates_render() {
        assert!(NotFoundTemplate.render().unwrap().contains("404"));
        assert!(ServerErrorTemplate.render().unwrap().contains("500"));
    }

    #[test]
    fn test_venue_form_marks_selection() {
        let form = VenueForm {
            state: "CA".to_string(),
            genres: vec!["Jazz".to_string()],
            ..VenueForm::default()
        };
        let tmpl = VenueFormTemplate::create(&form, Vec::new());
        assert!(tmpl.state_options.iter().any(|o| o.value == "CA" && o.selected));
        assert!(tmpl.genre_options.iter().any(|o| o.value == "Jazz" && o.selected));
        assert!(tmpl
            .genre_options
            .iter()
            .all(|o| o.value == "Jazz" || !o.selected));
        let html = tmpl.render().unwrap();
        assert!(html.contains("action=\"/venues/create\""));
    }

    #[test]
    fn test_venue_form_edit_action() {
        let id = Uuid::new_v4();
        let tmpl = VenueFormTemplate::edit(id, &VenueForm::default(), Vec::new());
        assert_eq!(tmpl.action, format!("/venues/{id}/edit"));
    }

    #[test]
    fn test_form_errors_are_rendered() {
        let tmpl = ArtistFormTemplate::create(
            &ArtistForm::default(),
            vec!["Invalid phone number.".to_string()],
        );
        let html = tmpl.render().unwrap();
        assert!(html.contains("Invalid phone number."));
    }

    #[test]
    fn test_search_results_render_count() {
        let html = SearchVenuesTemplate {
            search_term: "Hop".to_string(),
            count: 1,
            results: vec![Listing {
                id: Uuid::new_v4(),
                name: "The Musical Hop".to_string(),
                num_upcoming_shows: 2,
            }],
        }
        .render()
        .unwrap();
        assert!(html.contains("The Musical Hop"));
        assert!(html.contains("1 result"));
    }
}
