//! End-to-end run: stations → clusters → analysis + POIs → output log.

use std::time::{Duration, Instant};

use tracing::{info, instrument};

use ekimae_geocluster::{cluster_stations, core_first};
use ekimae_poi::{MapTransport, PoiFetcher, PoiQuery};
use ekimae_shared::{
    AppConfig, Category, CategoryResult, CategorySummary, ClusterResult, PoiEntry, Result,
    StationCluster, StationProfile, ThematicAnalysis, parse_categories,
};
use ekimae_thematic::{EncyclopediaClient, TextGenerator, ThematicAnalyzer};

use crate::progress_log::{PipelineState, ProgressLog};
use crate::sources::StationSet;

/// Clusters with at least this many members count as major hubs.
pub const MAJOR_HUB_MIN_MEMBERS: usize = 3;
/// Tags taken from the analysis for display, after seasonal labels.
pub const DISPLAY_TAG_LIMIT: usize = 5;
/// POIs sampled per category into the result.
pub const SAMPLE_PER_CATEGORY: usize = 3;
/// Upper bound on the POI sample.
pub const SAMPLE_LIMIT: usize = 20;

/// Run parameters derived from config and CLI flags.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub cluster_threshold_m: f64,
    pub poi_radius_m: u32,
    /// Default categories, fetched after any profile priority categories.
    pub categories: Vec<Category>,
    /// Allow-list of substrings; empty means every cluster.
    pub only: Vec<String>,
}

impl RunConfig {
    pub fn from_app(config: &AppConfig, only: Vec<String>) -> Result<Self> {
        Ok(Self {
            cluster_threshold_m: config.defaults.cluster_threshold_m,
            poi_radius_m: config.defaults.poi_radius_m,
            categories: parse_categories(&config.defaults.categories)?,
            only,
        })
    }
}

/// The two enrichment stages a run drives.
pub struct PipelineDeps<W, G, T> {
    pub analyzer: ThematicAnalyzer<W, G>,
    pub fetcher: PoiFetcher<T>,
}

/// Outcome of [`run_pipeline`].
#[derive(Debug)]
pub struct RunSummary {
    /// Clusters produced from the merged station lists.
    pub total_clusters: usize,
    /// Clusters passing the allow-list.
    pub selected: usize,
    /// Selected clusters already in the log before this run.
    pub already_processed: usize,
    /// Clusters finished by this run.
    pub processed: usize,
    /// Categories that yielded nothing because every attempt failed.
    pub failed_categories: usize,
    pub elapsed: Duration,
    pub state: PipelineState,
}

/// One cluster a run would process.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCluster {
    pub cluster_id: String,
    pub name_ja: String,
    pub member_ids: Vec<String>,
    pub is_major_hub: bool,
    pub skips_enrichment: bool,
    pub categories: Vec<Category>,
}

/// Dry-run listing produced by [`plan`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub total_clusters: usize,
    pub selected: usize,
    pub already_processed: usize,
    pub pending: Vec<PlannedCluster>,
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a cluster is enriched.
    fn cluster_started(&self, name: &str, current: usize, total: usize);
    /// Called after a cluster is persisted.
    fn cluster_finished(&self, result: &ClusterResult);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn cluster_started(&self, _name: &str, _current: usize, _total: usize) {}
    fn cluster_finished(&self, _result: &ClusterResult) {}
    fn done(&self, _summary: &RunSummary) {}
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// True when any member's id or name contains one of `only`.
///
/// English names are matched case-insensitively.
pub fn matches_allow_list(cluster: &StationCluster, only: &[String]) -> bool {
    if only.is_empty() {
        return true;
    }
    cluster.members().iter().any(|member| {
        only.iter().any(|needle| {
            member.id.contains(needle.as_str())
                || member.name.ja.contains(needle.as_str())
                || member
                    .name
                    .en
                    .to_lowercase()
                    .contains(&needle.to_lowercase())
        })
    })
}

/// Profile priority categories first, then the defaults, without repeats.
pub fn categories_for(profile: Option<&StationProfile>, defaults: &[Category]) -> Vec<Category> {
    let priority = profile.map(|p| p.priority_categories.as_slice()).unwrap_or(&[]);
    let mut categories: Vec<Category> = Vec::with_capacity(priority.len() + defaults.len());
    for &category in priority.iter().chain(defaults) {
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    categories
}

/// A profile for any member, or at least [`MAJOR_HUB_MIN_MEMBERS`] members.
pub fn is_major_hub(cluster: &StationCluster, profile: Option<&StationProfile>) -> bool {
    profile.is_some() || cluster.members().len() >= MAJOR_HUB_MIN_MEMBERS
}

/// Encyclopedia title for a cluster's primary station.
pub fn reference_title(cluster: &StationCluster) -> String {
    let primary = cluster.primary();
    match primary.wiki_title.as_deref().map(str::trim) {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => format!("{}駅", primary.name.ja),
    }
}

fn select<'a>(clusters: &'a [StationCluster], only: &[String]) -> Vec<&'a StationCluster> {
    clusters
        .iter()
        .filter(|c| matches_allow_list(c, only))
        .collect()
}

// ---------------------------------------------------------------------------
// Result assembly
// ---------------------------------------------------------------------------

/// Seasonal labels, then the heaviest tags, without repeats.
pub fn display_tags(analysis: &ThematicAnalysis) -> Vec<String> {
    let mut tags: Vec<String> = analysis
        .seasonal_flags
        .iter()
        .map(|f| f.as_str().to_string())
        .collect();

    let mut weighted: Vec<_> = analysis.tags.iter().collect();
    weighted.sort_by(|a, b| b.weight.cmp(&a.weight));

    for tag in weighted.into_iter().take(DISPLAY_TAG_LIMIT) {
        if !tags.contains(&tag.tag) {
            tags.push(tag.tag.clone());
        }
    }
    tags
}

/// Up to [`SAMPLE_PER_CATEGORY`] entries per category, at most [`SAMPLE_LIMIT`].
pub fn poi_sample(results: &[CategoryResult]) -> Vec<PoiEntry> {
    results
        .iter()
        .flat_map(|r| r.items.iter().take(SAMPLE_PER_CATEGORY))
        .take(SAMPLE_LIMIT)
        .cloned()
        .collect()
}

fn build_result(
    cluster: &StationCluster,
    profile: Option<&StationProfile>,
    analysis: ThematicAnalysis,
    categories: &[CategoryResult],
) -> ClusterResult {
    let primary = cluster.primary();
    ClusterResult {
        cluster_id: cluster.primary_id.clone(),
        name: primary.name.clone(),
        ward: cluster.ward.clone(),
        member_ids: cluster.member_ids(),
        is_major_hub: is_major_hub(cluster, profile),
        display_tags: display_tags(&analysis),
        categories: categories.iter().map(CategorySummary::from).collect(),
        poi_sample: poi_sample(categories),
        analysis,
        processed_at: chrono::Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// List what a run would do without touching the network or the log.
pub fn plan(config: &RunConfig, stations: &StationSet, log: &dyn ProgressLog) -> Result<RunPlan> {
    let clusters = cluster_stations(
        &stations.stations,
        config.cluster_threshold_m,
        core_first(&stations.core_ids),
    );
    let selected = select(&clusters, &config.only);
    let state = PipelineState::from_records(log.load()?);

    let mut already_processed = 0;
    let mut pending = Vec::new();
    for cluster in &selected {
        if state.is_processed(&cluster.primary_id) {
            already_processed += 1;
            continue;
        }
        let profile = stations.profile_for(cluster.members());
        pending.push(PlannedCluster {
            cluster_id: cluster.primary_id.clone(),
            name_ja: cluster.primary().name.ja.clone(),
            member_ids: cluster.member_ids(),
            is_major_hub: is_major_hub(cluster, profile),
            skips_enrichment: cluster.skips_enrichment(),
            categories: categories_for(profile, &config.categories),
        });
    }

    Ok(RunPlan {
        total_clusters: clusters.len(),
        selected: selected.len(),
        already_processed,
        pending,
    })
}

/// Enrich every pending cluster, persisting after each one.
///
/// 1. Cluster the merged station list (core stations first)
/// 2. Apply the allow-list and skip clusters already in the log
/// 3. Per cluster: thematic analysis, then POI categories (unless skipped)
/// 4. Append the result to the log
///
/// Analysis and POI failures degrade the cluster's result. A log write
/// failure ends the run with an error.
#[instrument(skip_all, fields(stations = stations.stations.len(), only = config.only.len()))]
pub async fn run_pipeline<W, G, T, L>(
    config: &RunConfig,
    stations: &StationSet,
    deps: &PipelineDeps<W, G, T>,
    log: &mut L,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary>
where
    W: EncyclopediaClient,
    G: TextGenerator,
    T: MapTransport,
    L: ProgressLog + ?Sized,
{
    let start = Instant::now();

    progress.phase("Clustering stations");
    let clusters = cluster_stations(
        &stations.stations,
        config.cluster_threshold_m,
        core_first(&stations.core_ids),
    );
    let selected = select(&clusters, &config.only);

    progress.phase("Loading output log");
    let mut state = PipelineState::from_records(log.load()?);
    let pending: Vec<&StationCluster> = selected
        .iter()
        .copied()
        .filter(|c| !state.is_processed(&c.primary_id))
        .collect();
    let already_processed = selected.len() - pending.len();

    info!(
        clusters = clusters.len(),
        selected = selected.len(),
        already_processed,
        pending = pending.len(),
        "run planned"
    );

    progress.phase("Enriching clusters");
    let total = pending.len();
    let mut processed = 0;
    let mut failed_categories = 0;

    for (i, cluster) in pending.into_iter().enumerate() {
        let primary = cluster.primary();
        progress.cluster_started(&primary.name.ja, i + 1, total);

        let profile = stations.profile_for(cluster.members());
        let title = reference_title(cluster);
        let analysis = deps.analyzer.analyze(&title, profile).await;

        let categories = categories_for(profile, &config.categories);
        let category_results = if cluster.skips_enrichment() {
            info!(cluster = %cluster.primary_id, "POI enrichment skipped for cluster");
            Vec::new()
        } else {
            let query = PoiQuery {
                center: cluster.center,
                radius_m: config.poi_radius_m,
                categories: &categories,
                seasonal_flags: &analysis.seasonal_flags,
                profile,
            };
            let results = deps.fetcher.fetch_all(&query).await;
            failed_categories += categories.len() - results.len();
            results
        };

        let result = build_result(cluster, profile, analysis, &category_results);
        log.append(&result)?;
        progress.cluster_finished(&result);

        info!(
            cluster = %result.cluster_id,
            members = result.member_ids.len(),
            categories = result.categories.len(),
            tags = result.display_tags.len(),
            "cluster processed"
        );

        state.record(result);
        processed += 1;
    }

    let summary = RunSummary {
        total_clusters: clusters.len(),
        selected: selected.len(),
        already_processed,
        processed,
        failed_categories,
        elapsed: start.elapsed(),
        state,
    };

    progress.done(&summary);

    info!(
        processed = summary.processed,
        already_processed = summary.already_processed,
        failed_categories = summary.failed_categories,
        elapsed_ms = summary.elapsed.as_millis(),
        "run complete"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    use ekimae_poi::{RetryPolicy, TransportResponse};
    use ekimae_shared::{Coordinate, EkimaeError, SeasonalFlag, StationRecord, WeightedTag};
    use ekimae_thematic::{Article, Prompt};
    use url::Url;

    use super::*;
    use crate::progress_log::MemoryLog;
    use crate::progress_log::tests::result as logged;
    use crate::sources::tests::station;

    // -- fakes ---------------------------------------------------------------

    /// Knows a handful of Japanese articles; everything else is missing.
    #[derive(Default)]
    struct FakeWiki {
        articles: HashMap<String, String>,
        requested: Arc<Mutex<Vec<String>>>,
    }

    impl FakeWiki {
        fn with(mut self, title: &str, extract: &str) -> Self {
            self.articles.insert(title.into(), extract.into());
            self
        }
    }

    impl EncyclopediaClient for FakeWiki {
        async fn fetch_article(&self, lang: &str, title: &str) -> Result<Option<Article>> {
            self.requested.lock().unwrap().push(format!("{lang}:{title}"));
            if lang != "ja" {
                return Ok(None);
            }
            Ok(self.articles.get(title).map(|extract| Article {
                title: title.into(),
                extract: extract.clone(),
                langlinks: HashMap::new(),
            }))
        }
    }

    struct NoGenerator;

    impl TextGenerator for NoGenerator {
        async fn generate(&self, _prompt: &Prompt) -> Result<String> {
            Err(EkimaeError::Generation("disabled".into()))
        }
    }

    /// Answers every query with the same named nodes; optionally fails
    /// queries whose body mentions a marker string.
    struct FakeOverpass {
        names: Vec<&'static str>,
        fail_marker: Option<&'static str>,
        queries: Arc<Mutex<Vec<String>>>,
    }

    impl FakeOverpass {
        fn answering(names: &[&'static str]) -> Self {
            Self {
                names: names.to_vec(),
                fail_marker: None,
                queries: Arc::default(),
            }
        }
    }

    impl MapTransport for FakeOverpass {
        async fn post(&self, _endpoint: &Url, query: &str) -> Result<TransportResponse> {
            self.queries.lock().unwrap().push(query.to_string());
            if self.fail_marker.is_some_and(|m| query.contains(m)) {
                return Ok(TransportResponse {
                    status: 504,
                    body: String::new(),
                });
            }
            let elements: Vec<_> = self
                .names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    serde_json::json!({
                        "type": "node", "id": i, "lat": 35.71, "lon": 139.77,
                        "tags": { "name": name }
                    })
                })
                .collect();
            Ok(TransportResponse {
                status: 200,
                body: serde_json::json!({ "elements": elements }).to_string(),
            })
        }
    }

    /// Pipeline dependencies plus handles on what the fakes were asked.
    struct Harness {
        deps: PipelineDeps<FakeWiki, NoGenerator, FakeOverpass>,
        queries: Arc<Mutex<Vec<String>>>,
        requested: Arc<Mutex<Vec<String>>>,
    }

    impl Harness {
        fn fetcher_queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }

        fn analyzer_requests(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    fn harness(wiki: FakeWiki, overpass: FakeOverpass) -> Harness {
        let queries = Arc::clone(&overpass.queries);
        let requested = Arc::clone(&wiki.requested);
        let policy = RetryPolicy::new(
            vec![Url::parse("https://overpass.example/api/interpreter").unwrap()],
            3,
            Duration::from_millis(100),
            Duration::ZERO,
            Duration::ZERO,
        )
        .unwrap();
        Harness {
            deps: PipelineDeps {
                analyzer: ThematicAnalyzer::new(wiki, None),
                fetcher: PoiFetcher::new(overpass, policy, Duration::ZERO),
            },
            queries,
            requested,
        }
    }

    fn run_config(categories: &[Category]) -> RunConfig {
        RunConfig {
            cluster_threshold_m: 500.0,
            poi_radius_m: 800,
            categories: categories.to_vec(),
            only: Vec::new(),
        }
    }

    /// Ueno + Okachimachi (~700 m apart, separate), Shibuya alone, and
    /// Ueno's JR/Metro/Keisei entries within a few hundred metres.
    fn tokyo() -> StationSet {
        let mut ueno = station("ueno", "上野", 35.7138, 139.7773);
        ueno.name.en = "Ueno".into();
        let mut shibuya = station("shibuya", "渋谷", 35.6580, 139.7016);
        shibuya.name.en = "Shibuya".into();
        shibuya.ward = "渋谷区".into();
        let mut narita = station("narita_t1", "成田空港", 35.7647, 140.3864);
        narita.skip_enrichment = true;

        let stations = vec![
            station("ueno_metro", "上野（銀座線）", 35.7114, 139.7768),
            ueno,
            station("keisei_ueno", "京成上野", 35.7113, 139.7735),
            station("okachimachi", "御徒町", 35.7075, 139.7748),
            shibuya,
            narita,
        ];
        let core_ids: HashSet<String> = ["ueno", "shibuya"].into_iter().map(String::from).collect();

        StationSet {
            stations,
            core_ids,
            profiles: HashMap::new(),
        }
    }

    fn ueno_profile() -> StationProfile {
        StationProfile {
            station_id: "ueno".into(),
            description: "芸術の玄関口。".into(),
            core_vibes: vec!["ミュージアムの杜".into()],
            mandatory_tags: vec!["art_museums".into()],
            priority_categories: vec![Category::Culture],
            quota_overrides: BTreeMap::from([(Category::Culture, 2)]),
            ..Default::default()
        }
    }

    // -- pure helpers --------------------------------------------------------

    #[test]
    fn categories_put_profile_priorities_first() {
        let profile = ueno_profile();
        let defaults = [Category::Dining, Category::Culture, Category::Nature];
        assert_eq!(
            categories_for(Some(&profile), &defaults),
            vec![Category::Culture, Category::Dining, Category::Nature]
        );
        assert_eq!(categories_for(None, &defaults), defaults.to_vec());
    }

    #[test]
    fn display_tags_lead_with_seasons_and_keep_top_five() {
        let analysis = ThematicAnalysis {
            seasonal_flags: vec![SeasonalFlag::Sakura],
            tags: vec![
                WeightedTag::new("history", 2),
                WeightedTag::new("art_museums", 10),
                WeightedTag::new("shopping", 2),
                WeightedTag::new("parks_nature", 3),
                WeightedTag::new("gourmet", 2),
                WeightedTag::new("nightlife", 2),
                WeightedTag::new("business", 1),
            ],
            ..Default::default()
        };
        assert_eq!(
            display_tags(&analysis),
            vec!["Sakura", "art_museums", "parks_nature", "history", "shopping", "gourmet"]
        );
    }

    #[test]
    fn poi_sample_is_bounded() {
        let entry = |i: usize, category: Category| PoiEntry {
            id: format!("node/{i}"),
            name: format!("poi {i}"),
            category,
            location: Coordinate::new(35.0, 139.0),
            tags: BTreeMap::new(),
            is_seasonal: false,
            seasonal_theme: None,
        };
        let results: Vec<CategoryResult> = Category::ALL
            .iter()
            .map(|&category| CategoryResult {
                category,
                total_count: 10,
                saved_count: 10,
                items: (0..10).map(|i| entry(i, category)).collect(),
            })
            .collect();

        let sample = poi_sample(&results);
        assert_eq!(sample.len(), SAMPLE_LIMIT);
        assert!(sample[..3].iter().all(|p| p.category == Category::ALL[0]));
        assert_eq!(sample[3].category, Category::ALL[1]);
    }

    #[test]
    fn reference_title_falls_back_to_station_name() {
        let mut record: StationRecord = station("ueno", "上野", 35.7138, 139.7773);
        let cluster = |r: &StationRecord| StationCluster::new(r.clone());
        assert_eq!(reference_title(&cluster(&record)), "上野駅");
        record.wiki_title = Some("上野駅 (東京都)".into());
        assert_eq!(reference_title(&cluster(&record)), "上野駅 (東京都)");
    }

    // -- runs ----------------------------------------------------------------

    #[tokio::test]
    async fn run_processes_each_cluster_once_in_order() {
        let stations = tokyo();
        let wiki = FakeWiki::default().with("上野駅", "上野は桜の名所。美術館と博物館、美術館。");
        let deps = harness(wiki, FakeOverpass::answering(&["一蘭", "松屋"]));
        let mut log = MemoryLog::new();

        let summary = run_pipeline(
            &run_config(&[Category::Dining]),
            &stations,
            &deps.deps,
            &mut log,
            &SilentProgress,
        )
        .await
        .unwrap();

        let ids: Vec<_> = log.records().iter().map(|r| r.cluster_id.as_str()).collect();
        // Core stations lead; the rest keep list order.
        assert_eq!(ids, vec!["ueno", "shibuya", "okachimachi", "narita_t1"]);
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.state.len(), 4);

        let ueno = &log.records()[0];
        assert_eq!(ueno.member_ids, vec!["ueno", "ueno_metro", "keisei_ueno"]);
        assert!(ueno.is_major_hub);
        assert_eq!(ueno.analysis.seasonal_flags, vec![SeasonalFlag::Sakura]);
        assert_eq!(ueno.display_tags, vec!["Sakura", "art_museums"]);
        assert_eq!(ueno.categories[0].saved_count, 2);
        assert_eq!(ueno.poi_sample.len(), 2);

        let shibuya = &log.records()[1];
        assert!(!shibuya.is_major_hub);
        // No article: empty but well-formed analysis.
        assert!(shibuya.analysis.tags.is_empty());
        assert!(!shibuya.analysis.title.ja.is_empty());
    }

    #[tokio::test]
    async fn skip_enrichment_cluster_makes_no_map_queries() {
        let mut stations = tokyo();
        stations.stations.retain(|s| s.id == "narita_t1");
        let deps = harness(FakeWiki::default(), FakeOverpass::answering(&["x"]));
        let mut log = MemoryLog::new();

        run_pipeline(&run_config(&[Category::Dining]), &stations, &deps.deps, &mut log, &SilentProgress)
            .await
            .unwrap();

        assert!(deps.fetcher_queries().is_empty());
        assert!(log.records()[0].categories.is_empty());
        assert_eq!(deps.analyzer_requests(), vec!["ja:成田空港駅"]);
    }

    #[tokio::test]
    async fn profile_drives_categories_quota_and_hub_status() {
        let mut stations = tokyo();
        stations.profiles.insert("ueno".into(), ueno_profile());
        let deps = harness(FakeWiki::default(), FakeOverpass::answering(&["a", "b", "c", "d"]));
        let mut config = run_config(&[Category::Dining]);
        config.only = vec!["上野".into()];
        let mut log = MemoryLog::new();

        run_pipeline(&config, &stations, &deps.deps, &mut log, &SilentProgress)
            .await
            .unwrap();

        let ueno = log
            .records()
            .iter()
            .find(|r| r.cluster_id == "ueno")
            .expect("ueno processed");
        let categories: Vec<_> = ueno.categories.iter().map(|c| c.category).collect();
        assert_eq!(categories, vec![Category::Culture, Category::Dining]);
        assert_eq!(ueno.categories[0].saved_count, 2);
        assert_eq!(ueno.categories[0].total_count, 4);
        // Degraded analysis still carries profile data.
        assert_eq!(ueno.analysis.summary.ja, "芸術の玄関口。");
        assert_eq!(ueno.display_tags, vec!["art_museums"]);
    }

    #[tokio::test]
    async fn allow_list_matches_ids_and_names() {
        let stations = tokyo();
        let deps = harness(FakeWiki::default(), FakeOverpass::answering(&[]));
        let mut config = run_config(&[Category::Dining]);
        config.only = vec!["shibuya".into(), "御徒".into()];
        let mut log = MemoryLog::new();

        let summary = run_pipeline(&config, &stations, &deps.deps, &mut log, &SilentProgress)
            .await
            .unwrap();

        let ids: Vec<_> = log.records().iter().map(|r| r.cluster_id.as_str()).collect();
        assert_eq!(ids, vec!["shibuya", "okachimachi"]);
        assert_eq!(summary.selected, 2);
        assert_eq!(summary.total_clusters, 4);
    }

    #[tokio::test]
    async fn failed_category_is_counted_and_omitted() {
        let stations = StationSet {
            stations: vec![station("ueno", "上野", 35.7138, 139.7773)],
            ..Default::default()
        };
        let mut overpass = FakeOverpass::answering(&["x"]);
        overpass.fail_marker = Some("museum");
        let deps = harness(FakeWiki::default(), overpass);
        let mut log = MemoryLog::new();

        let summary = run_pipeline(
            &run_config(&[Category::Culture, Category::Dining]),
            &stations,
            &deps.deps,
            &mut log,
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(summary.failed_categories, 1);
        let categories: Vec<_> = log.records()[0].categories.iter().map(|c| c.category).collect();
        assert_eq!(categories, vec![Category::Dining]);
    }

    /// Fails once `limit` records have been written.
    struct FlakyLog {
        inner: MemoryLog,
        limit: usize,
    }

    impl ProgressLog for FlakyLog {
        fn load(&self) -> Result<Vec<ClusterResult>> {
            self.inner.load()
        }

        fn append(&mut self, result: &ClusterResult) -> Result<()> {
            if self.inner.records().len() >= self.limit {
                return Err(EkimaeError::io(
                    "var/enrichment_log.json",
                    std::io::Error::other("disk full"),
                ));
            }
            self.inner.append(result)
        }
    }

    #[tokio::test]
    async fn interrupted_run_resumes_without_duplicates() {
        let stations = tokyo();
        let config = run_config(&[Category::Dining]);

        let first = harness(FakeWiki::default(), FakeOverpass::answering(&["x"]));
        let mut flaky = FlakyLog {
            inner: MemoryLog::new(),
            limit: 2,
        };
        let err = run_pipeline(&config, &stations, &first.deps, &mut flaky, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, EkimaeError::Io { .. }));
        assert_eq!(flaky.inner.records().len(), 2);

        let second = harness(FakeWiki::default(), FakeOverpass::answering(&["x"]));
        let mut log = MemoryLog::with_records(flaky.inner.records().to_vec());
        let summary = run_pipeline(&config, &stations, &second.deps, &mut log, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.already_processed, 2);
        assert_eq!(summary.processed, 2);
        let ids: Vec<_> = log.records().iter().map(|r| r.cluster_id.as_str()).collect();
        assert_eq!(ids, vec!["ueno", "shibuya", "okachimachi", "narita_t1"]);
        // Already-done clusters were not fetched again.
        assert_eq!(second.analyzer_requests(), vec!["ja:御徒町駅", "ja:成田空港駅"]);
    }

    #[test]
    fn plan_lists_pending_without_side_effects() {
        let mut stations = tokyo();
        stations.profiles.insert("ueno".into(), ueno_profile());
        let log = MemoryLog::with_records(vec![logged("shibuya")]);

        let plan = plan(&run_config(&[Category::Dining]), &stations, &log).unwrap();

        assert_eq!(plan.total_clusters, 4);
        assert_eq!(plan.selected, 4);
        assert_eq!(plan.already_processed, 1);
        let pending: Vec<_> = plan.pending.iter().map(|p| p.cluster_id.as_str()).collect();
        assert_eq!(pending, vec!["ueno", "okachimachi", "narita_t1"]);
        assert_eq!(plan.pending[0].categories, vec![Category::Culture, Category::Dining]);
        assert!(plan.pending[2].skips_enrichment);
        assert_eq!(log.records().len(), 1);
    }
}
