//! Form decoding and validation.
//!
//! Venue, artist, and show forms arrive as `application/x-www-form-urlencoded`
//! bodies. The genre field is a multi-select and shows up as repeated
//! `genres=` pairs, which serde-based form extractors collapse to the last
//! value, so bodies are decoded here into a small multimap instead.
//! Validation never touches the database: a form either validates completely
//! or is re-rendered with the collected messages.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use regex::Regex;
use uuid::Uuid;

// ─── Choice lists ───────────────────────────────────────────────────────

/// The fixed genre tags a venue or artist can be listed under.
pub const GENRES: &[&str] = &[
    "Alternative",
    "Blues",
    "Classical",
    "Country",
    "Electronic",
    "Folk",
    "Funk",
    "Hip-Hop",
    "Heavy Metal",
    "Instrumental",
    "Jazz",
    "Musical Theatre",
    "Pop",
    "Punk",
    "R&B",
    "Reggae",
    "Rock n Roll",
    "Soul",
    "Other",
];

/// 50 states plus DC.
pub const STATES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN",
    "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH",
    "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT",
    "VT", "VA", "WA", "WV", "WI", "WY",
];

/// Phone numbers are entered as NNN-NNN-NNNN.
const PHONE_PATTERN: &str = r"^\d{3}-\d{3}-\d{4}$";

// ─── Body decoding ──────────────────────────────────────────────────────

/// Decoded urlencoded body, preserving repeated keys.
#[derive(Debug, Default)]
pub struct FormData {
    pairs: Vec<(String, String)>,
}

impl FormData {
    pub fn parse(body: &[u8]) -> Self {
        Self {
            pairs: url::form_urlencoded::parse(body).into_owned().collect(),
        }
    }

    /// First value for `key`, if present.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values for `key`, in submission order.
    pub fn values(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// First value for `key`, trimmed, or the empty string.
    pub fn text(&self, key: &str) -> String {
        self.value(key).unwrap_or_default().trim().to_string()
    }
}

// ─── Field validators ───────────────────────────────────────────────────

/// Checkbox parse for the seeking flags. WTForms-style forms submit "y",
/// plain HTML checkboxes submit "on"; anything unrecognized is false.
pub fn checkbox(value: Option<&str>) -> bool {
    matches!(value, Some("y") | Some("on") | Some("true") | Some("1"))
}

pub fn phone_is_valid(phone: &str) -> bool {
    Regex::new(PHONE_PATTERN)
        .map(|re| re.is_match(phone))
        .unwrap_or(false)
}

/// Optional link fields only need to be well-formed when filled in.
pub fn link_is_valid(link: &str) -> bool {
    link.is_empty() || url::Url::parse(link).is_ok()
}

/// Parse a form timestamp. Accepts RFC 3339 and the date-time formats the
/// show form produces; naive inputs are read as UTC.
pub fn parse_start_time(input: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    None
}

fn validate_genres(genres: &[String], errors: &mut Vec<String>) {
    if genres.is_empty() {
        errors.push("Select at least one genre.".to_string());
        return;
    }
    for genre in genres {
        if !GENRES.contains(&genre.as_str()) {
            errors.push(format!("Unknown genre: {genre}."));
        }
    }
}

fn validate_state(state: &str, errors: &mut Vec<String>) {
    if !STATES.contains(&state) {
        errors.push("Select a state.".to_string());
    }
}

fn require(value: &str, field: &str, errors: &mut Vec<String>) {
    if value.is_empty() {
        errors.push(format!("{field} is required."));
    }
}

// ─── Venue form ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct VenueForm {
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: String,
    pub phone: String,
    pub genres: Vec<String>,
    pub image_link: String,
    pub facebook_link: String,
    pub website_link: String,
    pub seeking_talent: bool,
    pub seeking_description: String,
}

impl VenueForm {
    pub fn from_form(data: &FormData) -> Self {
        Self {
            name: data.text("name"),
            city: data.text("city"),
            state: data.text("state"),
            address: data.text("address"),
            phone: data.text("phone"),
            genres: data.values("genres").iter().map(|g| g.to_string()).collect(),
            image_link: data.text("image_link"),
            facebook_link: data.text("facebook_link"),
            website_link: data.text("website_link"),
            seeking_talent: checkbox(data.value("seeking_talent")),
            seeking_description: data.text("seeking_description"),
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        require(&self.name, "Name", &mut errors);
        require(&self.city, "City", &mut errors);
        require(&self.address, "Address", &mut errors);
        validate_state(&self.state, &mut errors);
        validate_genres(&self.genres, &mut errors);
        if !phone_is_valid(&self.phone) {
            errors.push("Invalid phone number.".to_string());
        }
        if !link_is_valid(&self.facebook_link) {
            errors.push("Invalid facebook link.".to_string());
        }
        if !link_is_valid(&self.website_link) {
            errors.push("Invalid website link.".to_string());
        }
        errors
    }

    pub fn genres_joined(&self) -> String {
        self.genres.join(",")
    }
}

// ─── Artist form ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ArtistForm {
    pub name: String,
    pub city: String,
    pub state: String,
    pub phone: String,
    pub genres: Vec<String>,
    pub image_link: String,
    pub facebook_link: String,
    pub website_link: String,
    pub seeking_venue: bool,
    pub seeking_description: String,
}

impl ArtistForm {
    pub fn from_form(data: &FormData) -> Self {
        Self {
            name: data.text("name"),
            city: data.text("city"),
            state: data.text("state"),
            phone: data.text("phone"),
            genres: data.values("genres").iter().map(|g| g.to_string()).collect(),
            image_link: data.text("image_link"),
            facebook_link: data.text("facebook_link"),
            website_link: data.text("website_link"),
            seeking_venue: checkbox(data.value("seeking_venue")),
            seeking_description: data.text("seeking_description"),
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        require(&self.name, "Name", &mut errors);
        require(&self.city, "City", &mut errors);
        validate_state(&self.state, &mut errors);
        validate_genres(&self.genres, &mut errors);
        if !phone_is_valid(&self.phone) {
            errors.push("Invalid phone number.".to_string());
        }
        if !link_is_valid(&self.facebook_link) {
            errors.push("Invalid facebook link.".to_string());
        }
        if !link_is_valid(&self.website_link) {
            errors.push("Invalid website link.".to_string());
        }
        errors
    }

    pub fn genres_joined(&self) -> String {
        self.genres.join(",")
    }
}

// ─── Show form ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ShowForm {
    pub artist_id: String,
    pub venue_id: String,
    pub start_time: String,
}

/// A show form that parsed cleanly.
#[derive(Debug, Clone, Copy)]
pub struct ShowInput {
    pub artist_id: Uuid,
    pub venue_id: Uuid,
    pub start_time: DateTime<FixedOffset>,
}

impl ShowForm {
    pub fn from_form(data: &FormData) -> Self {
        Self {
            artist_id: data.text("artist_id"),
            venue_id: data.text("venue_id"),
            start_time: data.text("start_time"),
        }
    }

    pub fn resolve(&self) -> Result<ShowInput, Vec<String>> {
        let mut errors = Vec::new();

        let artist_id = Uuid::parse_str(&self.artist_id).ok();
        if artist_id.is_none() {
            errors.push("Invalid artist id.".to_string());
        }
        let venue_id = Uuid::parse_str(&self.venue_id).ok();
        if venue_id.is_none() {
            errors.push("Invalid venue id.".to_string());
        }
        let start_time = if self.start_time.is_empty() {
            errors.push("Start time is required.".to_string());
            None
        } else {
            let parsed = parse_start_time(&self.start_time);
            if parsed.is_none() {
                errors.push("Invalid start time.".to_string());
            }
            parsed
        };

        match (artist_id, venue_id, start_time) {
            (Some(artist_id), Some(venue_id), Some(start_time)) if errors.is_empty() => {
                Ok(ShowInput {
                    artist_id,
                    venue_id,
                    start_time,
                })
            }
            _ => Err(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(body: &str) -> FormData {
        FormData::parse(body.as_bytes())
    }

    // ── Multimap decoding ─────────────────────────────────────────────

    #[test]
    fn test_repeated_keys_are_preserved() {
        let data = decode("genres=Jazz&genres=Blues&genres=Rock+n+Roll");
        assert_eq!(data.values("genres"), vec!["Jazz", "Blues", "Rock n Roll"]);
    }

    #[test]
    fn test_value_returns_first_occurrence() {
        let data = decode("genres=Jazz&genres=Blues");
        assert_eq!(data.value("genres"), Some("Jazz"));
    }

    #[test]
    fn test_percent_decoding() {
        let data = decode("name=Park+Square+Live+Music+%26+Coffee");
        assert_eq!(data.value("name"), Some("Park Square Live Music & Coffee"));
    }

    #[test]
    fn test_missing_key() {
        let data = decode("name=x");
        assert_eq!(data.value("phone"), None);
        assert!(data.values("genres").is_empty());
        assert_eq!(data.text("phone"), "");
    }

    // ── Checkbox parse ────────────────────────────────────────────────

    #[test]
    fn test_checkbox_recognized_values() {
        assert!(checkbox(Some("y")));
        assert!(checkbox(Some("on")));
        assert!(checkbox(Some("true")));
        assert!(checkbox(Some("1")));
    }

    #[test]
    fn test_checkbox_fails_closed() {
        assert!(!checkbox(None));
        assert!(!checkbox(Some("")));
        assert!(!checkbox(Some("n")));
        assert!(!checkbox(Some("yes please")));
    }

    // ── Phone ─────────────────────────────────────────────────────────

    #[test]
    fn test_phone_valid() {
        assert!(phone_is_valid("555-123-4567"));
    }

    #[test]
    fn test_phone_missing_dashes() {
        assert!(!phone_is_valid("5551234567"));
    }

    #[test]
    fn test_phone_rejects_prefix_and_suffix() {
        // The pattern is anchored at both ends.
        assert!(!phone_is_valid("x555-123-4567"));
        assert!(!phone_is_valid("555-123-45678"));
        assert!(!phone_is_valid(""));
    }

    // ── Links ─────────────────────────────────────────────────────────

    #[test]
    fn test_link_empty_is_ok() {
        assert!(link_is_valid(""));
    }

    #[test]
    fn test_link_well_formed() {
        assert!(link_is_valid("https://www.facebook.com/themusicalhop"));
        assert!(!link_is_valid("not a url"));
    }

    // ── Start time ────────────────────────────────────────────────────

    #[test]
    fn test_start_time_rfc3339() {
        let dt = parse_start_time("2035-04-01T20:00:00+00:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2035-04-01T20:00:00+00:00");
    }

    #[test]
    fn test_start_time_naive_is_utc() {
        let dt = parse_start_time("2035-04-01 20:00:00").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_start_time_datetime_local_format() {
        assert!(parse_start_time("2035-04-01T20:00").is_some());
    }

    #[test]
    fn test_start_time_garbage() {
        assert!(parse_start_time("next tuesday").is_none());
    }

    // ── Venue form ────────────────────────────────────────────────────

    fn valid_venue_body() -> &'static str {
        "name=The+Musical+Hop&city=San+Francisco&state=CA&address=1015+Folsom+Street\
         &phone=555-123-4567&genres=Jazz&genres=Folk&facebook_link=https%3A%2F%2Ffacebook.com%2Fhop\
         &website_link=https%3A%2F%2Fthemusicalhop.com&seeking_talent=y&seeking_description=Looking+for+local+artists"
    }

    #[test]
    fn test_venue_form_valid() {
        let form = VenueForm::from_form(&decode(valid_venue_body()));
        assert!(form.validate().is_empty());
        assert_eq!(form.genres, vec!["Jazz", "Folk"]);
        assert!(form.seeking_talent);
        assert_eq!(form.genres_joined(), "Jazz,Folk");
    }

    #[test]
    fn test_venue_form_missing_required_fields() {
        let form = VenueForm::from_form(&decode("phone=555-123-4567&state=CA&genres=Jazz"));
        let errors = form.validate();
        assert!(errors.contains(&"Name is required.".to_string()));
        assert!(errors.contains(&"City is required.".to_string()));
        assert!(errors.contains(&"Address is required.".to_string()));
    }

    #[test]
    fn test_venue_form_bad_phone_blocks() {
        let body = valid_venue_body().replace("555-123-4567", "5551234567");
        let form = VenueForm::from_form(&decode(&body));
        assert!(form
            .validate()
            .contains(&"Invalid phone number.".to_string()));
    }

    #[test]
    fn test_venue_form_empty_genres() {
        let form =
            VenueForm::from_form(&decode("name=x&city=y&state=CA&address=z&phone=555-123-4567"));
        assert!(form
            .validate()
            .contains(&"Select at least one genre.".to_string()));
    }

    #[test]
    fn test_venue_form_unknown_genre() {
        let form = VenueForm::from_form(&decode(
            "name=x&city=y&state=CA&address=z&phone=555-123-4567&genres=Polka",
        ));
        assert!(form.validate().contains(&"Unknown genre: Polka.".to_string()));
    }

    #[test]
    fn test_venue_form_unknown_state() {
        let form = VenueForm::from_form(&decode(
            "name=x&city=y&state=ZZ&address=z&phone=555-123-4567&genres=Jazz",
        ));
        assert!(form.validate().contains(&"Select a state.".to_string()));
    }

    // ── Artist form ───────────────────────────────────────────────────

    #[test]
    fn test_artist_form_valid() {
        let form = ArtistForm::from_form(&decode(
            "name=Guns+N+Petals&city=San+Francisco&state=CA&phone=326-123-5000&genres=Rock+n+Roll",
        ));
        assert!(form.validate().is_empty());
        assert!(!form.seeking_venue);
    }

    #[test]
    fn test_artist_form_bad_facebook_link() {
        let form = ArtistForm::from_form(&decode(
            "name=a&city=b&state=CA&phone=326-123-5000&genres=Jazz&facebook_link=nope",
        ));
        assert!(form
            .validate()
            .contains(&"Invalid facebook link.".to_string()));
    }

    // ── Show form ─────────────────────────────────────────────────────

    #[test]
    fn test_show_form_resolves() {
        let artist = Uuid::new_v4();
        let venue = Uuid::new_v4();
        let body = format!(
            "artist_id={artist}&venue_id={venue}&start_time=2035-04-01T20%3A00%3A00%2B00%3A00"
        );
        let input = ShowForm::from_form(&decode(&body)).resolve().unwrap();
        assert_eq!(input.artist_id, artist);
        assert_eq!(input.venue_id, venue);
    }

    #[test]
    fn test_show_form_collects_all_errors() {
        let form = ShowForm::from_form(&decode("artist_id=abc&venue_id=&start_time=whenever"));
        let errors = form.resolve().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    // ── Choice lists ──────────────────────────────────────────────────

    #[test]
    fn test_choice_list_sizes() {
        assert_eq!(GENRES.len(), 19);
        assert_eq!(STATES.len(), 51);
        assert!(STATES.contains(&"DC"));
    }
}
