//! Core domain types for the station enrichment pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Stations
// ---------------------------------------------------------------------------

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Station display name in the primary (Japanese) and secondary (English) language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilingualName {
    pub ja: String,
    #[serde(default)]
    pub en: String,
}

/// A raw station record as loaded from one of the static station lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    /// Identifier, unique per source list.
    pub id: String,
    pub name: BilingualName,
    /// Administrative area (ward / city) tag.
    pub ward: String,
    pub location: Coordinate,
    /// Encyclopedia article title, if it differs from the station name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wiki_title: Option<String>,
    /// Suppress POI enrichment (airport terminals and similar nodes).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip_enrichment: bool,
}

/// A group of co-located station records representing one transit hub.
///
/// A cluster is opened around its primary record and can only grow, so it
/// is never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationCluster {
    /// Id of the primary (first-seen) member.
    pub primary_id: String,
    /// Ward of the primary member.
    pub ward: String,
    /// Location of the primary member.
    pub center: Coordinate,
    /// Members in absorption order; the primary is always first.
    members: Vec<StationRecord>,
}

impl StationCluster {
    /// Open a cluster whose id, ward and center come from `primary`.
    pub fn new(primary: StationRecord) -> Self {
        Self {
            primary_id: primary.id.clone(),
            ward: primary.ward.clone(),
            center: primary.location,
            members: vec![primary],
        }
    }

    /// Add a neighbouring record after the existing members.
    pub fn absorb(&mut self, record: StationRecord) {
        self.members.push(record);
    }

    pub fn members(&self) -> &[StationRecord] {
        &self.members
    }

    /// The representative member.
    pub fn primary(&self) -> &StationRecord {
        &self.members[0]
    }

    pub fn member_ids(&self) -> Vec<String> {
        self.members.iter().map(|m| m.id.clone()).collect()
    }

    /// True when any member asks for POI enrichment to be skipped.
    pub fn skips_enrichment(&self) -> bool {
        self.members.iter().any(|m| m.skip_enrichment)
    }
}

// ---------------------------------------------------------------------------
// Categories & seasonal flags
// ---------------------------------------------------------------------------

/// POI category queried against the map-data service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Dining,
    Shopping,
    Accommodation,
    Culture,
    Nature,
    Nightlife,
    Sightseeing,
    Convenience,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Self::Dining,
        Self::Shopping,
        Self::Accommodation,
        Self::Culture,
        Self::Nature,
        Self::Nightlife,
        Self::Sightseeing,
        Self::Convenience,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dining => "dining",
            Self::Shopping => "shopping",
            Self::Accommodation => "accommodation",
            Self::Culture => "culture",
            Self::Nature => "nature",
            Self::Nightlife => "nightlife",
            Self::Sightseeing => "sightseeing",
            Self::Convenience => "convenience",
        }
    }

    /// Parse a category label. Unknown labels yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == label)
    }

    /// Premium categories get a larger default quota.
    pub fn is_premium(&self) -> bool {
        matches!(
            self,
            Self::Dining | Self::Shopping | Self::Accommodation | Self::Culture
        )
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seasonal signal detected in encyclopedia text and used to boost nature POIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeasonalFlag {
    /// Cherry blossom.
    Sakura,
    /// Autumn foliage.
    Koyo,
    /// Hydrangea.
    Ajisai,
    /// Plum blossom.
    Ume,
}

impl SeasonalFlag {
    pub const ALL: [SeasonalFlag; 4] = [Self::Sakura, Self::Koyo, Self::Ajisai, Self::Ume];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sakura => "Sakura",
            Self::Koyo => "Koyo",
            Self::Ajisai => "Ajisai",
            Self::Ume => "Ume",
        }
    }
}

// ---------------------------------------------------------------------------
// POI results
// ---------------------------------------------------------------------------

/// A single point of interest retained for a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiEntry {
    /// Source-native identifier, e.g. `node/123456`.
    pub id: String,
    pub name: String,
    pub category: Category,
    pub location: Coordinate,
    /// Raw key/value tags from the source.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub is_seasonal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seasonal_theme: Option<SeasonalFlag>,
}

/// Ranked, quota-truncated POIs for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: Category,
    /// Valid candidates before truncation.
    pub total_count: usize,
    /// Entries kept after truncation.
    pub saved_count: usize,
    pub items: Vec<PoiEntry>,
}

/// "X found, Y shown" summary stored in the output log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: Category,
    pub total_count: usize,
    pub saved_count: usize,
}

impl From<&CategoryResult> for CategorySummary {
    fn from(result: &CategoryResult) -> Self {
        Self {
            category: result.category,
            total_count: result.total_count,
            saved_count: result.saved_count,
        }
    }
}

// ---------------------------------------------------------------------------
// Thematic analysis
// ---------------------------------------------------------------------------

/// Text in the three output languages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    pub ja: String,
    pub en: String,
    pub zh: String,
}

impl LocalizedText {
    pub fn new(ja: impl Into<String>, en: impl Into<String>, zh: impl Into<String>) -> Self {
        Self {
            ja: ja.into(),
            en: en.into(),
            zh: zh.into(),
        }
    }

    /// The same text in every language.
    pub fn uniform(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            ja: text.clone(),
            en: text.clone(),
            zh: text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedTag {
    pub tag: String,
    pub weight: u32,
}

impl WeightedTag {
    pub fn new(tag: impl Into<String>, weight: u32) -> Self {
        Self {
            tag: tag.into(),
            weight,
        }
    }
}

/// Output of the thematic text analyzer for one station.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThematicAnalysis {
    pub summary: LocalizedText,
    pub title: LocalizedText,
    pub tagline: LocalizedText,
    #[serde(default)]
    pub seasonal_flags: Vec<SeasonalFlag>,
    #[serde(default)]
    pub tags: Vec<WeightedTag>,
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// Hand-curated override bundle for a high-importance station.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationProfile {
    pub station_id: String,
    /// Persona text prefixed to the Japanese summary.
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub core_vibes: Vec<String>,
    /// Tags always attached with a high weight.
    #[serde(default)]
    pub mandatory_tags: Vec<String>,
    /// Landmark names that must rank first among POIs.
    #[serde(default)]
    pub mandatory_landmarks: Vec<String>,
    #[serde(default)]
    pub priority_categories: Vec<Category>,
    #[serde(default)]
    pub quota_overrides: BTreeMap<Category, usize>,
}

// ---------------------------------------------------------------------------
// Cluster results
// ---------------------------------------------------------------------------

/// One record of the resumable output log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResult {
    pub cluster_id: String,
    pub name: BilingualName,
    pub ward: String,
    pub member_ids: Vec<String>,
    pub is_major_hub: bool,
    pub analysis: ThematicAnalysis,
    pub display_tags: Vec<String>,
    pub categories: Vec<CategorySummary>,
    pub poi_sample: Vec<PoiEntry>,
    pub processed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> StationRecord {
        StationRecord {
            id: id.into(),
            name: BilingualName {
                ja: "上野".into(),
                en: "Ueno".into(),
            },
            ward: "Taito".into(),
            location: Coordinate::new(35.7141, 139.7774),
            wiki_title: None,
            skip_enrichment: false,
        }
    }

    #[test]
    fn category_labels_roundtrip() {
        for category in Category::ALL {
            assert_eq!(Category::from_label(category.as_str()), Some(category));
        }
        assert_eq!(Category::from_label("bakery"), None);
    }

    #[test]
    fn premium_categories() {
        let premium: Vec<_> = Category::ALL.into_iter().filter(|c| c.is_premium()).collect();
        assert_eq!(
            premium,
            vec![
                Category::Dining,
                Category::Shopping,
                Category::Accommodation,
                Category::Culture
            ]
        );
    }

    #[test]
    fn station_record_defaults_optional_fields() {
        let json = r#"{
            "id": "ueno",
            "name": { "ja": "上野", "en": "Ueno" },
            "ward": "Taito",
            "location": { "lat": 35.7141, "lon": 139.7774 }
        }"#;
        let parsed: StationRecord = serde_json::from_str(json).expect("parse station");
        assert_eq!(parsed, record("ueno"));
    }

    #[test]
    fn cluster_skips_when_any_member_flagged() {
        let mut terminal = record("haneda-t3");
        terminal.skip_enrichment = true;
        let mut cluster = StationCluster::new(record("ueno"));
        cluster.absorb(terminal);
        assert!(cluster.skips_enrichment());
        assert_eq!(cluster.primary().id, "ueno");
        assert_eq!(cluster.primary_id, "ueno");
        assert_eq!(cluster.center, Coordinate::new(35.7141, 139.7774));
        assert_eq!(cluster.member_ids(), vec!["ueno", "haneda-t3"]);
    }

    #[test]
    fn profile_quota_overrides_use_category_labels() {
        let json = r#"{
            "station_id": "shinjuku",
            "core_vibes": ["眠らない街"],
            "quota_overrides": { "dining": 80, "nature": 10 }
        }"#;
        let profile: StationProfile = serde_json::from_str(json).expect("parse profile");
        assert_eq!(profile.quota_overrides.get(&Category::Dining), Some(&80));
        assert_eq!(profile.quota_overrides.get(&Category::Nature), Some(&10));
        assert!(profile.mandatory_landmarks.is_empty());
    }
}
