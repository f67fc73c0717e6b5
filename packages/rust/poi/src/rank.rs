//! Filtering, scoring and quota truncation of raw Overpass elements.

use std::collections::BTreeMap;

use serde::Deserialize;

use ekimae_shared::{Category, CategoryResult, Coordinate, PoiEntry, SeasonalFlag};

/// Default quota for premium categories.
pub const PREMIUM_QUOTA: usize = 50;
/// Default quota for every other category.
pub const STANDARD_QUOTA: usize = 30;
/// Bonus for a nature POI matching an active seasonal flag.
pub const SEASONAL_BONUS: u32 = 50;
/// Bonus for a POI whose name contains a mandatory landmark.
pub const LANDMARK_BONUS: u32 = 100;

/// Tag fields checked for seasonal keywords besides the name.
const SEASONAL_TAG_FIELDS: &[&str] = &[
    "species",
    "species:en",
    "species:ja",
    "genus",
    "flower",
    "description",
];

// ---------------------------------------------------------------------------
// Overpass payload
// ---------------------------------------------------------------------------

/// Top-level Overpass JSON response.
#[derive(Debug, Clone, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
}

/// One feature from the `elements` array.
#[derive(Debug, Clone, Deserialize)]
pub struct OverpassElement {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: i64,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    /// Present on ways requested with `out center`.
    #[serde(default)]
    pub center: Option<Coordinate>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl OverpassElement {
    /// Local name, falling back to the English one. Blank names don't count.
    pub fn display_name(&self) -> Option<&str> {
        ["name", "name:en"]
            .iter()
            .filter_map(|key| self.tags.get(*key))
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }

    /// Node coordinate, or the computed center of a way.
    pub fn location(&self) -> Option<Coordinate> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => self.center,
        }
    }
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Station-specific inputs to ranking.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankContext<'a> {
    pub seasonal_flags: &'a [SeasonalFlag],
    pub quota_overrides: Option<&'a BTreeMap<Category, usize>>,
    pub mandatory_landmarks: &'a [String],
}

/// Quota for `category`, honouring a per-station override.
pub fn quota_for(category: Category, overrides: Option<&BTreeMap<Category, usize>>) -> usize {
    if let Some(quota) = overrides.and_then(|o| o.get(&category)) {
        return *quota;
    }
    if category.is_premium() {
        PREMIUM_QUOTA
    } else {
        STANDARD_QUOTA
    }
}

/// Lower-case keywords identifying each seasonal theme on a POI.
pub fn seasonal_keywords(flag: SeasonalFlag) -> &'static [&'static str] {
    match flag {
        SeasonalFlag::Sakura => &["桜", "さくら", "サクラ", "sakura", "cherry", "prunus"],
        SeasonalFlag::Koyo => &[
            "紅葉", "もみじ", "モミジ", "銀杏", "いちょう", "イチョウ", "maple", "acer", "ginkgo",
        ],
        SeasonalFlag::Ajisai => &["紫陽花", "あじさい", "アジサイ", "hydrangea"],
        SeasonalFlag::Ume => &["梅", "うめ", "plum", "mume"],
    }
}

/// First of `flags` whose keywords appear in the name or a seasonal tag field.
pub fn seasonal_match(
    name: &str,
    tags: &BTreeMap<String, String>,
    flags: &[SeasonalFlag],
) -> Option<SeasonalFlag> {
    let mut haystacks = vec![name.to_lowercase()];
    haystacks.extend(
        SEASONAL_TAG_FIELDS
            .iter()
            .filter_map(|field| tags.get(*field))
            .map(|v| v.to_lowercase()),
    );

    flags.iter().copied().find(|flag| {
        seasonal_keywords(*flag)
            .iter()
            .any(|kw| haystacks.iter().any(|h| h.contains(kw)))
    })
}

/// Turn raw elements into a ranked, truncated [`CategoryResult`].
///
/// Elements without a usable name or coordinate are dropped first; the
/// remainder is counted, scored, stable-sorted by descending score and cut
/// to the category quota.
pub fn rank_elements(
    category: Category,
    elements: Vec<OverpassElement>,
    ctx: &RankContext<'_>,
) -> CategoryResult {
    let mut scored: Vec<(u32, PoiEntry)> = elements
        .into_iter()
        .filter_map(|el| {
            let name = el.display_name()?.to_string();
            let location = el.location()?;

            let seasonal_theme = if category == Category::Nature {
                seasonal_match(&name, &el.tags, ctx.seasonal_flags)
            } else {
                None
            };

            let mut score = 0;
            if seasonal_theme.is_some() {
                score += SEASONAL_BONUS;
            }
            if is_landmark(&name, &el.tags, ctx.mandatory_landmarks) {
                score += LANDMARK_BONUS;
            }

            let entry = PoiEntry {
                id: format!("{}/{}", el.kind, el.id),
                name,
                category,
                location,
                tags: el.tags,
                is_seasonal: seasonal_theme.is_some(),
                seasonal_theme,
            };
            Some((score, entry))
        })
        .collect();

    let total_count = scored.len();

    // `sort_by` is stable: equal scores keep source order.
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let quota = quota_for(category, ctx.quota_overrides);
    scored.truncate(quota);

    let items: Vec<PoiEntry> = scored.into_iter().map(|(_, entry)| entry).collect();

    CategoryResult {
        category,
        total_count,
        saved_count: items.len(),
        items,
    }
}

fn is_landmark(name: &str, tags: &BTreeMap<String, String>, landmarks: &[String]) -> bool {
    let en_name = tags.get("name:en").map(String::as_str).unwrap_or("");
    landmarks
        .iter()
        .filter(|l| !l.is_empty())
        .any(|l| name.contains(l.as_str()) || en_name.contains(l.as_str()))
}
