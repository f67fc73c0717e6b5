//! Proximity clustering of station records into transit hubs.
//!
//! Several source lists describe the same physical hub with slightly different
//! coordinates (one record per operator or line). [`cluster_stations`] folds
//! them into [`StationCluster`]s and picks one representative per hub.
//!
//! The algorithm is a single greedy pass: each unvisited record in scan order
//! becomes a primary and claims every unvisited record within the threshold of
//! *itself*. There is no transitive merging, so the scan order decides which
//! record represents a hub and, for chains of stations, which records end up
//! together. Callers control that order through the comparator argument;
//! [`core_first`] is the ordering used by the pipeline.

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::debug;

use ekimae_shared::{Coordinate, StationCluster, StationRecord};

/// Default proximity threshold in metres.
pub const DEFAULT_THRESHOLD_M: f64 = 500.0;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates, in metres.
pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Ordering that puts curated core stations ahead of everything else.
///
/// Within each group the sort is stable, so input order is kept.
pub fn core_first(
    core_ids: &HashSet<String>,
) -> impl FnMut(&StationRecord, &StationRecord) -> Ordering + '_ {
    move |a, b| {
        let a_core = core_ids.contains(&a.id);
        let b_core = core_ids.contains(&b.id);
        b_core.cmp(&a_core)
    }
}

/// Partition `records` into clusters of stations within `threshold_m` of a primary.
///
/// Records are stable-sorted with `order` first. Every record ends up in
/// exactly one cluster, and every member is within the threshold of its
/// cluster's primary (inclusive). The same input and order always give the
/// same partition.
pub fn cluster_stations<F>(
    records: &[StationRecord],
    threshold_m: f64,
    mut order: F,
) -> Vec<StationCluster>
where
    F: FnMut(&StationRecord, &StationRecord) -> Ordering,
{
    let mut sorted: Vec<&StationRecord> = records.iter().collect();
    sorted.sort_by(|a, b| order(*a, *b));

    let mut visited: HashSet<usize> = HashSet::with_capacity(sorted.len());
    let mut clusters = Vec::new();

    for (i, primary) in sorted.iter().enumerate() {
        if !visited.insert(i) {
            continue;
        }

        let mut cluster = StationCluster::new((*primary).clone());

        for (j, candidate) in sorted.iter().enumerate().skip(i + 1) {
            if visited.contains(&j) {
                continue;
            }
            if haversine_m(primary.location, candidate.location) <= threshold_m {
                visited.insert(j);
                cluster.absorb((*candidate).clone());
            }
        }

        if cluster.members().len() > 1 {
            debug!(
                primary = %primary.id,
                members = cluster.members().len(),
                "merged co-located stations"
            );
        }

        clusters.push(cluster);
    }

    debug!(
        records = records.len(),
        clusters = clusters.len(),
        threshold_m,
        "clustering complete"
    );

    clusters
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use ekimae_shared::BilingualName;

    fn station(id: &str, lat: f64, lon: f64) -> StationRecord {
        StationRecord {
            id: id.into(),
            name: BilingualName {
                ja: id.into(),
                en: id.into(),
            },
            ward: format!("{id}-ward"),
            location: Coordinate::new(lat, lon),
            wiki_title: None,
            skip_enrichment: false,
        }
    }

    fn input_order(_: &StationRecord, _: &StationRecord) -> Ordering {
        Ordering::Equal
    }

    fn ids(cluster: &StationCluster) -> Vec<&str> {
        cluster.members().iter().map(|m| m.id.as_str()).collect()
    }

    /// Deterministic scatter of stations over central Tokyo.
    fn scattered(n: usize) -> Vec<StationRecord> {
        let mut seed: u64 = 0x5eed_1234;
        let mut next = move || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) as f64 / (1u64 << 31) as f64
        };
        (0..n)
            .map(|i| {
                let lat = 35.60 + next() * 0.15;
                let lon = 139.65 + next() * 0.20;
                station(&format!("s{i}"), lat, lon)
            })
            .collect()
    }

    #[test]
    fn haversine_zero_for_identical_points() {
        let p = Coordinate::new(35.6812, 139.7671);
        assert_eq!(haversine_m(p, p), 0.0);
    }

    #[test]
    fn haversine_known_distance() {
        // Tokyo Station to Shinjuku Station is roughly 6.1 km.
        let tokyo = Coordinate::new(35.6812, 139.7671);
        let shinjuku = Coordinate::new(35.6896, 139.7006);
        let d = haversine_m(tokyo, shinjuku);
        assert!((5_900.0..6_300.0).contains(&d), "got {d}");
        assert!((haversine_m(shinjuku, tokyo) - d).abs() < 1e-6);
    }

    #[test]
    fn nearby_stations_cluster_and_distant_one_stays_alone() {
        let records = vec![
            station("ueno", 35.7141, 139.7774),
            station("keisei-ueno", 35.7143, 139.7780),
            station("shibuya", 35.6580, 139.7016),
        ];
        let d = haversine_m(records[0].location, records[1].location);
        assert!(d < 100.0, "expected ~60 m, got {d}");

        let clusters = cluster_stations(&records, DEFAULT_THRESHOLD_M, input_order);
        assert_eq!(clusters.len(), 2);
        assert_eq!(ids(&clusters[0]), vec!["ueno", "keisei-ueno"]);
        assert_eq!(ids(&clusters[1]), vec!["shibuya"]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let a = station("a", 35.6812, 139.7671);
        let b = station("b", 35.6840, 139.7700);
        let d = haversine_m(a.location, b.location);
        let records = vec![a, b];

        let at = cluster_stations(&records, d, input_order);
        assert_eq!(at.len(), 1);

        let beyond = cluster_stations(&records, d - 1.0, input_order);
        assert_eq!(beyond.len(), 2);
    }

    #[test]
    fn identical_coordinates_always_cluster() {
        let records = vec![
            station("jr", 35.6812, 139.7671),
            station("metro", 35.6812, 139.7671),
        ];
        let clusters = cluster_stations(&records, 0.0, input_order);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members().len(), 2);
    }

    #[test]
    fn singleton_and_empty_inputs() {
        assert!(cluster_stations(&[], DEFAULT_THRESHOLD_M, input_order).is_empty());

        let clusters = cluster_stations(
            &[station("lonely", 35.0, 139.0)],
            DEFAULT_THRESHOLD_M,
            input_order,
        );
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].primary_id, "lonely");
        assert_eq!(clusters[0].center, Coordinate::new(35.0, 139.0));
    }

    #[test]
    fn chained_stations_are_not_merged_transitively() {
        // a -- ~400 m -- b -- ~400 m -- c, a and c ~800 m apart.
        let a = station("a", 35.6800, 139.7000);
        let b = station("b", 35.6800, 139.7044);
        let c = station("c", 35.6800, 139.7088);
        assert!(haversine_m(a.location, b.location) < DEFAULT_THRESHOLD_M);
        assert!(haversine_m(b.location, c.location) < DEFAULT_THRESHOLD_M);
        assert!(haversine_m(a.location, c.location) > DEFAULT_THRESHOLD_M);

        // Scanning from the end of the chain splits it.
        let clusters = cluster_stations(
            &[a.clone(), b.clone(), c.clone()],
            DEFAULT_THRESHOLD_M,
            input_order,
        );
        assert_eq!(clusters.len(), 2);
        assert_eq!(ids(&clusters[0]), vec!["a", "b"]);
        assert_eq!(ids(&clusters[1]), vec!["c"]);

        // Scanning from the middle absorbs both ends.
        let core: HashSet<String> = ["b".to_string()].into();
        let clusters = cluster_stations(&[a, b, c], DEFAULT_THRESHOLD_M, core_first(&core));
        assert_eq!(clusters.len(), 1);
        assert_eq!(ids(&clusters[0]), vec!["b", "a", "c"]);
    }

    #[test]
    fn core_station_becomes_primary() {
        let records = vec![
            station("scanned-shinjuku", 35.6900, 139.7000),
            station("shinjuku", 35.6896, 139.7006),
        ];
        let core: HashSet<String> = ["shinjuku".to_string()].into();

        let clusters = cluster_stations(&records, DEFAULT_THRESHOLD_M, core_first(&core));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].primary_id, "shinjuku");
        assert_eq!(clusters[0].ward, "shinjuku-ward");
        assert_eq!(clusters[0].center, records[1].location);
    }

    #[test]
    fn core_first_keeps_input_order_within_groups() {
        let records = vec![
            station("x1", 35.60, 139.60),
            station("c1", 35.70, 139.70),
            station("x2", 35.80, 139.80),
            station("c2", 35.90, 139.90),
        ];
        let core: HashSet<String> = ["c1".to_string(), "c2".to_string()].into();
        let clusters = cluster_stations(&records, DEFAULT_THRESHOLD_M, core_first(&core));
        let primaries: Vec<_> = clusters.iter().map(|c| c.primary_id.as_str()).collect();
        assert_eq!(primaries, vec!["c1", "c2", "x1", "x2"]);
    }

    #[test]
    fn every_record_lands_in_exactly_one_cluster() {
        let records = scattered(300);
        let clusters = cluster_stations(&records, DEFAULT_THRESHOLD_M, input_order);

        let mut seen: HashMap<&str, usize> = HashMap::new();
        for cluster in &clusters {
            assert_eq!(cluster.primary_id, cluster.primary().id);
            for member in cluster.members() {
                *seen.entry(member.id.as_str()).or_default() += 1;
                assert!(haversine_m(cluster.center, member.location) <= DEFAULT_THRESHOLD_M);
            }
        }
        assert_eq!(seen.len(), records.len());
        assert!(seen.values().all(|&n| n == 1));
    }

    #[test]
    fn clustering_is_deterministic() {
        let records = scattered(150);
        let first = cluster_stations(&records, DEFAULT_THRESHOLD_M, input_order);
        let second = cluster_stations(&records, DEFAULT_THRESHOLD_M, input_order);
        assert_eq!(first, second);
    }
}
