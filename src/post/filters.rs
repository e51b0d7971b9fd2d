use std::collections::HashSet;

use crate::cli::config::PostSettings;
use super::JobListing;

/// Country names in match form: lowercase, punctuation replaced by spaces.
/// Georgia is left out because it is also a US state.
const COUNTRIES: &[&str] = &[
    "afghanistan", "albania", "algeria", "andorra", "angola", "antigua and barbuda", "argentina",
    "armenia", "australia", "austria", "azerbaijan", "bahamas", "bahrain", "bangladesh", "barbados",
    "belarus", "belgium", "belize", "benin", "bhutan", "bolivia", "bosnia and herzegovina",
    "botswana", "brazil", "brunei", "bulgaria", "burkina faso", "burundi", "cabo verde", "cambodia",
    "cameroon", "canada", "central african republic", "chad", "chile", "china", "colombia",
    "comoros", "congo", "costa rica", "croatia", "cuba", "cyprus", "czech republic", "czechia",
    "cote d ivoire", "denmark", "djibouti", "dominica", "dominican republic", "timor leste",
    "ecuador", "egypt", "el salvador", "equatorial guinea", "eritrea", "estonia", "eswatini",
    "ethiopia", "fiji", "finland", "france", "gabon", "gambia", "germany", "ghana", "greece",
    "grenada", "guatemala", "guinea", "guinea bissau", "guyana", "haiti", "honduras", "hungary",
    "iceland", "india", "indonesia", "iran", "iraq", "ireland", "israel", "italy", "jamaica",
    "japan", "jordan", "kazakhstan", "kenya", "kiribati", "korea", "kosovo", "kuwait", "kyrgyzstan",
    "laos", "latvia", "lebanon", "lesotho", "liberia", "libya", "liechtenstein", "lithuania",
    "luxembourg", "madagascar", "malawi", "malaysia", "maldives", "mali", "malta",
    "marshall islands", "mauritania", "mauritius", "mexico", "micronesia", "moldova", "monaco",
    "mongolia", "montenegro", "morocco", "mozambique", "myanmar", "burma", "namibia", "nauru",
    "nepal", "netherlands", "new zealand", "nicaragua", "niger", "nigeria", "north macedonia",
    "norway", "oman", "pakistan", "palau", "panama", "papua new guinea", "paraguay", "peru",
    "philippines", "poland", "portugal", "qatar", "romania", "russia", "rwanda",
    "saint kitts and nevis", "saint lucia", "saint vincent and the grenadines", "samoa",
    "san marino", "sao tome and principe", "saudi arabia", "senegal", "serbia", "seychelles",
    "sierra leone", "singapore", "slovakia", "slovenia", "solomon islands", "somalia",
    "south africa", "spain", "sri lanka", "sudan", "suriname", "sweden", "switzerland", "syria",
    "taiwan", "tajikistan", "tanzania", "thailand", "togo", "tonga", "trinidad and tobago",
    "tunisia", "turkey", "turkmenistan", "tuvalu", "uganda", "ukraine", "united arab emirates",
    "united kingdom", "uk", "uruguay", "uzbekistan", "vanuatu", "vatican city", "venezuela",
    "vietnam", "yemen", "zambia", "zimbabwe",
];

/// Phrases that mark a location as being in the US (match form)
const US_MARKERS: &[&str] = &["united states", "usa", "us", "u s", "america", "remote"];

const STATE_CODES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM",
    "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA",
    "WV", "WI", "WY",
];

/// Lowercase, punctuation to spaces, padded so phrases match on word boundaries
fn match_form(s: &str) -> String {
    let words: Vec<String> = s
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    format!(" {} ", words.join(" "))
}

fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    haystack.contains(&format!(" {} ", phrase))
}

/// Whether a location names a country other than the US
pub fn names_foreign_country(location: &str) -> bool {
    let form = match_form(location);
    COUNTRIES.iter().any(|country| contains_phrase(&form, country))
}

/// Whether a location carries any US marker
pub fn names_us(location: &str) -> bool {
    let form = match_form(location);
    if US_MARKERS.iter().any(|marker| contains_phrase(&form, marker)) {
        return true;
    }
    // State codes only count in upper case, "in" and "or" are words too
    location
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| STATE_CODES.contains(&token))
}

/// Optional post-processing filters
pub struct Filters {
    title_keywords: Vec<String>,
    us_only: bool,
    /// Links published by earlier runs
    seen_links: HashSet<String>,
}

impl Filters {
    pub fn new(settings: &PostSettings, seen_links: HashSet<String>) -> Self {
        Self {
            title_keywords: settings
                .exclude_title_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            us_only: settings.us_only,
            seen_links,
        }
    }

    /// Returns the reason when a listing should be dropped.
    ///
    /// With `us_only`, a kept listing whose location has no US marker gets
    /// its location blanked.
    pub fn apply(&self, listing: &mut JobListing) -> Option<String> {
        let title = listing.job_title.to_lowercase();
        if let Some(keyword) = self.title_keywords.iter().find(|k| title.contains(k.as_str())) {
            return Some(format!("title contains '{}'", keyword));
        }

        if self.seen_links.contains(&listing.job_link) {
            return Some("published by an earlier run".to_string());
        }

        if self.us_only {
            if names_foreign_country(&listing.location) {
                return Some(format!("location '{}' is outside the US", listing.location));
            }
            if !names_us(&listing.location) {
                listing.location.clear();
            }
        }

        None
    }
}
