use url::Url;

use crate::extractor::outcome::{value_text, RawJobRecord};
use crate::run::RunId;
use super::JobListing;

/// Where a record came from
pub struct RecordSource<'a> {
    pub company: &'a str,
    pub site_id: &'a str,
    pub snapshot: &'a str,
    pub link_base: &'a str,
    pub run_id: &'a RunId,
}

/// Collapse runs of whitespace and trim
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical spacing for location strings.
///
/// Commas become `", "`, list separators (`|`, `;`, line breaks) become
/// `"; "`, and empty segments disappear.
pub fn canonicalize_location(s: &str) -> String {
    s.split(|c| matches!(c, '|' | ';' | '\n'))
        .map(|part| {
            part.split(',')
                .map(normalize_whitespace)
                .filter(|segment| !segment.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Resolve a job link to an absolute http(s) URL without fragment
pub fn resolve_link(link: &str, base: &str) -> Result<String, String> {
    let link = link.trim();
    if link.is_empty() {
        return Err("empty job link".to_string());
    }

    let base = Url::parse(base).map_err(|e| format!("invalid link base '{}': {}", base, e))?;
    let mut resolved = base
        .join(link)
        .map_err(|e| format!("unresolvable job link '{}': {}", link, e))?;

    match resolved.scheme() {
        "http" | "https" => {}
        other => return Err(format!("job link '{}' has unsupported scheme '{}'", link, other)),
    }
    resolved.set_fragment(None);

    Ok(resolved.to_string())
}

/// Validate an untrusted record and bring it into canonical form
pub fn normalize_record(record: &RawJobRecord, source: &RecordSource<'_>) -> Result<JobListing, String> {
    let company = match normalize_whitespace(source.company) {
        c if !c.is_empty() => c,
        _ => value_text(&record.company_name)
            .map(|c| normalize_whitespace(&c))
            .ok_or("missing company name")?,
    };

    let job_title = value_text(&record.job_title)
        .map(|t| normalize_whitespace(&t))
        .ok_or("missing job title")?;

    let link = value_text(&record.job_link).ok_or("missing job link")?;
    let job_link = resolve_link(&link, source.link_base)?;

    let location = value_text(&record.location)
        .map(|l| canonicalize_location(&l))
        .unwrap_or_default();

    let job_id = value_text(&record.job_id).map(|id| normalize_whitespace(&id));

    Ok(JobListing {
        company_name: company,
        job_id,
        job_title,
        location,
        job_link,
        site_id: source.site_id.to_string(),
        source_snapshot: source.snapshot.to_string(),
        run_id: source.run_id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(run_id: &RunId) -> RecordSource<'_> {
        RecordSource {
            company: "Acme Corp",
            site_id: "acme",
            snapshot: "acme_0000_run-1",
            link_base: "https://careers.acme.com/search?page=2",
            run_id,
        }
    }

    #[test]
    fn test_whitespace() {
        assert_eq!(normalize_whitespace("  Senior\n Data\tScientist "), "Senior Data Scientist");
        assert_eq!(normalize_whitespace(" \n "), "");
    }

    #[test]
    fn test_location_canonical_form() {
        assert_eq!(canonicalize_location("New York ,NY"), "New York, NY");
        assert_eq!(canonicalize_location("  New   York,  NY , "), "New York, NY");
        assert_eq!(canonicalize_location("Austin, TX | Remote"), "Austin, TX; Remote");
        assert_eq!(canonicalize_location("Seattle, WA;;Boston, MA"), "Seattle, WA; Boston, MA");
        assert_eq!(canonicalize_location(" , "), "");
    }

    #[test]
    fn test_relative_links_resolve_against_base() {
        let base = "https://careers.acme.com/search?page=2";
        assert_eq!(resolve_link("/jobs/R157984", base).unwrap(), "https://careers.acme.com/jobs/R157984");
        assert_eq!(resolve_link("R157984", base).unwrap(), "https://careers.acme.com/R157984");
        assert_eq!(resolve_link("//jobs.acme.com/1", base).unwrap(), "https://jobs.acme.com/1");
        assert_eq!(
            resolve_link("https://boards.example.com/acme/7#apply", base).unwrap(),
            "https://boards.example.com/acme/7"
        );
    }

    #[test]
    fn test_bad_links_are_rejected() {
        let base = "https://careers.acme.com/";
        assert!(resolve_link("   ", base).is_err());
        assert!(resolve_link("mailto:jobs@acme.com", base).is_err());
        assert!(resolve_link("javascript:void(0)", base).is_err());
        assert!(resolve_link("/jobs/1", "not a base").is_err());
    }

    #[test]
    fn test_normalize_record() {
        let run_id: RunId = "run-1".parse().unwrap();
        let record = RawJobRecord {
            job_id: Some(json!(" R157984 ")),
            job_title: Some(json!("Senior  Data Scientist")),
            location: Some(json!("New York ,NY")),
            company_name: Some(json!("ACME")),
            job_link: Some(json!("/jobs/R157984")),
        };

        let listing = normalize_record(&record, &source(&run_id)).unwrap();
        assert_eq!(listing.company_name, "Acme Corp");
        assert_eq!(listing.job_id.as_deref(), Some("R157984"));
        assert_eq!(listing.job_title, "Senior Data Scientist");
        assert_eq!(listing.location, "New York, NY");
        assert_eq!(listing.job_link, "https://careers.acme.com/jobs/R157984");
        assert_eq!(listing.source_snapshot, "acme_0000_run-1");
    }

    #[test]
    fn test_company_falls_back_to_record() {
        let run_id: RunId = "run-1".parse().unwrap();
        let mut src = source(&run_id);
        src.company = " ";
        let record = RawJobRecord {
            job_title: Some(json!("Analyst")),
            company_name: Some(json!("Globex")),
            job_link: Some(json!("https://globex.example/1")),
            ..Default::default()
        };
        assert_eq!(normalize_record(&record, &src).unwrap().company_name, "Globex");

        let record = RawJobRecord {
            company_name: None,
            ..record
        };
        assert!(normalize_record(&record, &src).is_err());
    }

    #[test]
    fn test_missing_required_fields() {
        let run_id: RunId = "run-1".parse().unwrap();
        let no_title = RawJobRecord {
            job_link: Some(json!("/jobs/1")),
            ..Default::default()
        };
        assert!(normalize_record(&no_title, &source(&run_id)).is_err());

        let no_link = RawJobRecord {
            job_title: Some(json!("Engineer")),
            ..Default::default()
        };
        assert!(normalize_record(&no_link, &source(&run_id)).is_err());

        let minimal = RawJobRecord {
            job_title: Some(json!("Engineer")),
            job_link: Some(json!("/jobs/1")),
            ..Default::default()
        };
        let listing = normalize_record(&minimal, &source(&run_id)).unwrap();
        assert_eq!(listing.job_id, None);
        assert_eq!(listing.location, "");
    }
}
