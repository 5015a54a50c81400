use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Current metadata record layout.
pub const SCHEMA_VERSION: u32 = 1;

/// Location ids are reduced into this range.
const LOCATION_ID_MODULUS: u64 = 100_000_000;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// A place mentioned in an article, geocoded upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// NUTS region code, e.g. `DE212`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nuts: Option<String>,
    /// Administrative region name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Location {
    pub fn new(name: &str) -> Self {
        Location {
            name: Self::normalize_name(name),
            latitude: None,
            longitude: None,
            nuts: None,
            region: None,
        }
    }

    /// Lower-case, keep only `a-z`, `äöüß`, space and apostrophe, trim.
    pub fn normalize_name(raw: &str) -> String {
        raw.to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_lowercase() || matches!(c, 'ä' | 'ö' | 'ü' | 'ß' | ' ' | '\''))
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Stable id of the normalized name, below 10^8.
    pub fn location_id(&self) -> u64 {
        let digest = Sha256::digest(self.name.as_bytes());
        digest
            .iter()
            .fold(0u64, |acc, byte| (acc * 256 + *byte as u64) % LOCATION_ID_MODULUS)
    }
}

/// Per-document attributes, versioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    /// Crawl or producer the record came from.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crawled_at: Option<DateTime<Utc>>,
    /// Stamped by the coordinator when the record is first written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingested_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub locations: Vec<Location>,
}

impl MetadataRecord {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        MetadataRecord {
            schema_version: SCHEMA_VERSION,
            text: text.into(),
            title: None,
            excerpt: None,
            url: None,
            hostname: None,
            tags: Vec::new(),
            categories: Vec::new(),
            source: source.into(),
            published: None,
            crawled_at: None,
            ingested_at: None,
            locations: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_published(mut self, date: NaiveDate) -> Self {
        self.published = Some(date);
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.locations.push(location);
        self
    }

    /// Canonical form: location names normalized (empty ones dropped) and
    /// hostname derived from the url when missing.
    pub fn normalize(&mut self) {
        for location in &mut self.locations {
            location.name = Location::normalize_name(&location.name);
        }
        self.locations.retain(|l| !l.name.is_empty());
        if self.hostname.is_none() {
            self.hostname = self.url.as_deref().and_then(host_of).map(str::to_string);
        }
    }

    /// Last dot-separated label of the hostname.
    pub fn tld(&self) -> Option<&str> {
        self.hostname
            .as_deref()
            .and_then(|host| host.trim_end_matches('.').rsplit('.').next())
            .filter(|label| !label.is_empty())
    }

    /// Equality ignoring `ingested_at`, used to detect no-op resubmissions.
    pub fn same_content(&self, other: &MetadataRecord) -> bool {
        let mut a = self.clone();
        a.ingested_at = other.ingested_at;
        a == *other
    }
}

/// Host part of an absolute URL.
fn host_of(url: &str) -> Option<&str> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?.split(':').next()?;
    (!host.is_empty()).then_some(host)
}
