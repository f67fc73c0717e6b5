//! Static station lists and curated profiles.
//!
//! Lists are JSON arrays of [`StationRecord`]s, merged core → extended →
//! ward scan. The first occurrence of an id wins.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, info, warn};

use ekimae_shared::{
    Coordinate, EkimaeError, Result, SourcesConfig, StationProfile, StationRecord,
};

/// Everything the pipeline needs to know about its inputs.
#[derive(Debug, Clone, Default)]
pub struct StationSet {
    /// Merged records in source order.
    pub stations: Vec<StationRecord>,
    /// Ids that came from the core list.
    pub core_ids: HashSet<String>,
    /// Profiles keyed by station id.
    pub profiles: HashMap<String, StationProfile>,
}

impl StationSet {
    /// The profile for a cluster: the first member (in absorption order) that has one.
    pub fn profile_for<'a>(&'a self, members: &[StationRecord]) -> Option<&'a StationProfile> {
        members.iter().find_map(|m| self.profiles.get(&m.id))
    }
}

/// Read one station list, rejecting records that cannot be clustered.
pub fn read_station_list(path: &Path) -> Result<Vec<StationRecord>> {
    let content = std::fs::read_to_string(path).map_err(|e| EkimaeError::io(path, e))?;
    let records: Vec<StationRecord> = serde_json::from_str(&content)
        .map_err(|e| EkimaeError::parse(format!("{}: {e}", path.display())))?;

    for record in &records {
        validate_record(record)
            .map_err(|msg| EkimaeError::validation(format!("{}: {msg}", path.display())))?;
    }

    debug!(path = %path.display(), count = records.len(), "station list loaded");
    Ok(records)
}

fn validate_record(record: &StationRecord) -> std::result::Result<(), String> {
    if record.id.trim().is_empty() {
        return Err(format!("station '{}' has an empty id", record.name.ja));
    }
    if record.name.ja.trim().is_empty() {
        return Err(format!("station '{}' has no Japanese name", record.id));
    }
    let Coordinate { lat, lon } = record.location;
    if !(lat.is_finite() && lon.is_finite()) || lat.abs() > 90.0 || lon.abs() > 180.0 {
        return Err(format!("station '{}' has invalid coordinates ({lat}, {lon})", record.id));
    }
    Ok(())
}

/// Merge lists in priority order. Later duplicates of an id are dropped.
///
/// Returns the merged records and the ids contributed by the first list.
pub fn merge_station_lists(lists: Vec<Vec<StationRecord>>) -> (Vec<StationRecord>, HashSet<String>) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();
    let mut core_ids = HashSet::new();

    for (index, list) in lists.into_iter().enumerate() {
        for record in list {
            if !seen.insert(record.id.clone()) {
                warn!(id = %record.id, list = index, "duplicate station id, keeping first");
                continue;
            }
            if index == 0 {
                core_ids.insert(record.id.clone());
            }
            merged.push(record);
        }
    }

    (merged, core_ids)
}

/// Read the profile file. A missing file means no profiles.
pub fn read_profiles(path: &Path) -> Result<HashMap<String, StationProfile>> {
    if !path.exists() {
        warn!(path = %path.display(), "profile file not found, continuing without profiles");
        return Ok(HashMap::new());
    }

    let content = std::fs::read_to_string(path).map_err(|e| EkimaeError::io(path, e))?;
    let profiles: Vec<StationProfile> = serde_json::from_str(&content)
        .map_err(|e| EkimaeError::parse(format!("{}: {e}", path.display())))?;

    let mut by_id = HashMap::with_capacity(profiles.len());
    for profile in profiles {
        if profile.station_id.trim().is_empty() {
            return Err(EkimaeError::validation(format!(
                "{}: profile without station_id",
                path.display()
            )));
        }
        if by_id.contains_key(&profile.station_id) {
            warn!(id = %profile.station_id, "duplicate profile, keeping first");
            continue;
        }
        by_id.insert(profile.station_id.clone(), profile);
    }

    Ok(by_id)
}

/// Load the configured sources.
pub fn load_station_set(sources: &SourcesConfig, include_ward_scan: bool) -> Result<StationSet> {
    let mut lists = vec![
        read_station_list(Path::new(&sources.core_stations))?,
        read_station_list(Path::new(&sources.extended_stations))?,
    ];
    if include_ward_scan {
        lists.push(read_station_list(Path::new(&sources.ward_scan_stations))?);
    }

    let (stations, core_ids) = merge_station_lists(lists);
    let profiles = read_profiles(Path::new(&sources.profiles))?;

    info!(
        stations = stations.len(),
        core = core_ids.len(),
        profiles = profiles.len(),
        ward_scan = include_ward_scan,
        "station sources loaded"
    );

    Ok(StationSet {
        stations,
        core_ids,
        profiles,
    })
}
