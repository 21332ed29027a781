//! Professional and platform ratings attributed to a wine

use super::wine::WineId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a rating row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatingId(String);

impl RatingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RatingId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RatingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A recognized rating guide (e.g. "gambero-rosso" / "Gambero Rosso")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingSource {
    pub id: String,
    pub name: String,
}

impl RatingSource {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// The fixed set of rating sources whose scores may be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceWhitelist {
    sources: Vec<RatingSource>,
}

impl SourceWhitelist {
    pub fn new(sources: Vec<RatingSource>) -> Self {
        Self { sources }
    }

    /// Guides recognized out of the box.
    pub fn builtin() -> Self {
        Self::new(vec![
            RatingSource::new("gambero-rosso", "Gambero Rosso"),
            RatingSource::new("veronelli", "Veronelli"),
            RatingSource::new("bibenda", "Bibenda"),
            RatingSource::new("doctor-wine", "Doctor Wine"),
            RatingSource::new("vitae-ais", "Vitae AIS"),
            RatingSource::new("james-suckling", "James Suckling"),
            RatingSource::new("wine-spectator", "Wine Spectator"),
            RatingSource::new("wine-advocate", "Robert Parker Wine Advocate"),
            RatingSource::new("decanter", "Decanter"),
            RatingSource::new("vinous", "Vinous"),
            RatingSource::new("wine-enthusiast", "Wine Enthusiast"),
            RatingSource::new("vivino", "Vivino"),
        ])
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.get(source_id).is_some()
    }

    pub fn get(&self, source_id: &str) -> Option<&RatingSource> {
        self.sources.iter().find(|s| s.id == source_id)
    }

    pub fn sources(&self) -> &[RatingSource] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Default for SourceWhitelist {
    fn default() -> Self {
        Self::builtin()
    }
}

/// One rating persisted for a wine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WineRating {
    pub id: RatingId,
    pub wine_id: WineId,
    pub source_id: String,
    pub source_name: String,
    /// Free-form score; guides use heterogeneous scales ("95/100", "Tre Bicchieri")
    pub score: String,
    /// Always within 0.0..=1.0
    pub confidence: f64,
    pub year: Option<i32>,
}

impl WineRating {
    pub fn new(
        wine_id: WineId,
        source: &RatingSource,
        score: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            id: RatingId::new(),
            wine_id,
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            score: score.into(),
            confidence: confidence.clamp(0.0, 1.0),
            year: None,
        }
    }

    pub fn with_year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }
}
