//! Wine: a catalog item owned by a venue

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a wine
///
/// Serializes as a plain string (UUID or an id assigned by the catalog)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WineId(String);

impl WineId {
    /// Create a new random WineId (UUID-based)
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a WineId from an existing string id
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for WineId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WineId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for WineId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Wine category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WineCategory {
    Red,
    White,
    #[serde(alias = "rosé")]
    Rose,
    Sparkling,
    Dessert,
}

impl WineCategory {
    /// Storage key (ASCII, stable)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::White => "white",
            Self::Rose => "rose",
            Self::Sparkling => "sparkling",
            Self::Dessert => "dessert",
        }
    }
}

impl std::fmt::Display for WineCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rose => write!(f, "rosé"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown wine category: {0}")]
pub struct CategoryParseError(pub String);

impl std::str::FromStr for WineCategory {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "red" => Ok(Self::Red),
            "white" => Ok(Self::White),
            "rose" | "rosé" => Ok(Self::Rose),
            "sparkling" => Ok(Self::Sparkling),
            "dessert" => Ok(Self::Dessert),
            other => Err(CategoryParseError(other.to_string())),
        }
    }
}

/// A wine in a venue's catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wine {
    pub id: WineId,
    /// Owning venue, if the catalog is multi-tenant
    pub venue_id: Option<String>,
    pub name: String,
    pub producer: Option<String>,
    pub region: Option<String>,
    pub denomination: Option<String>,
    pub vintage: Option<i32>,
    /// Grape varieties in blend order
    pub grape_varieties: Option<Vec<String>>,
    pub description: Option<String>,
    pub category: WineCategory,
    pub bottle_price: f64,
    pub glass_price: Option<f64>,
    pub available: bool,
    pub recommended: bool,
}

impl Wine {
    /// Create an available, non-recommended wine with only the required fields set
    pub fn new(name: impl Into<String>, category: WineCategory, bottle_price: f64) -> Self {
        Self {
            id: WineId::new(),
            venue_id: None,
            name: name.into(),
            producer: None,
            region: None,
            denomination: None,
            vintage: None,
            grape_varieties: None,
            description: None,
            category,
            bottle_price,
            glass_price: None,
            available: true,
            recommended: false,
        }
    }

    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = Some(producer.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_denomination(mut self, denomination: impl Into<String>) -> Self {
        self.denomination = Some(denomination.into());
        self
    }

    pub fn with_vintage(mut self, vintage: i32) -> Self {
        self.vintage = Some(vintage);
        self
    }

    pub fn with_grapes<I, S>(mut self, grapes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grape_varieties = Some(grapes.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_glass_price(mut self, price: f64) -> Self {
        self.glass_price = Some(price);
        self
    }

    pub fn with_venue(mut self, venue_id: impl Into<String>) -> Self {
        self.venue_id = Some(venue_id.into());
        self
    }

    pub fn region_missing(&self) -> bool {
        is_blank(self.region.as_deref())
    }

    pub fn denomination_missing(&self) -> bool {
        is_blank(self.denomination.as_deref())
    }

    pub fn description_missing(&self) -> bool {
        is_blank(self.description.as_deref())
    }

    pub fn grapes_missing(&self) -> bool {
        match &self.grape_varieties {
            None => true,
            Some(grapes) => grapes.iter().all(|g| g.trim().is_empty()),
        }
    }

    /// True when any field the enrichment pipeline can fill is missing.
    pub fn is_incomplete(&self) -> bool {
        self.region_missing()
            || self.denomination_missing()
            || self.description_missing()
            || self.grapes_missing()
    }
}

/// True for `None`, empty, or whitespace-only values
pub(crate) fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

/// A set of descriptive fields to write into a wine.
///
/// Only the four fields the enrichment pipeline may fill are representable;
/// name, prices, and category cannot be expressed here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denomination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grape_varieties: Option<Vec<String>>,
}

impl FieldUpdates {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.region.is_none()
            && self.denomination.is_none()
            && self.grape_varieties.is_none()
    }

    /// Names of the fields this update sets.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.description.is_some() {
            names.push("description");
        }
        if self.region.is_some() {
            names.push("region");
        }
        if self.denomination.is_some() {
            names.push("denomination");
        }
        if self.grape_varieties.is_some() {
            names.push("grape_varieties");
        }
        names
    }

    /// The subset of this update whose fields are still missing in `wine`.
    pub fn restricted_to(&self, wine: &Wine) -> FieldUpdates {
        FieldUpdates {
            description: self.description.clone().filter(|_| wine.description_missing()),
            region: self.region.clone().filter(|_| wine.region_missing()),
            denomination: self.denomination.clone().filter(|_| wine.denomination_missing()),
            grape_varieties: self.grape_varieties.clone().filter(|_| wine.grapes_missing()),
        }
    }

    /// Copy the set fields into `wine`.
    pub fn apply_to(&self, wine: &mut Wine) {
        if let Some(ref v) = self.description {
            wine.description = Some(v.clone());
        }
        if let Some(ref v) = self.region {
            wine.region = Some(v.clone());
        }
        if let Some(ref v) = self.denomination {
            wine.denomination = Some(v.clone());
        }
        if let Some(ref v) = self.grape_varieties {
            wine.grape_varieties = Some(v.clone());
        }
    }
}
