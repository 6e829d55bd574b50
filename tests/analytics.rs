//! End-to-end runs of the analytics pipeline over in-memory stores.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quarry::metrics::{dominant_share, purity};
use quarry::store::{InMemoryEventStore, InMemoryReportStore};
use quarry::{
    AnalyticsConfig, AnalyticsEngine, Error, EventStore, QueryEvent, Rating, Report, ReportStatus,
    ReportStore, Result, TextGenerator, UnavailableGenerator,
};

const TENANT: &str = "course-42";

/// `per_blob` events around each centre on the x axis, with a small spread.
fn blobs(centres: &[f32], per_blob: usize) -> Vec<QueryEvent> {
    let centres: Vec<(f32, f32)> = centres.iter().map(|&cx| (cx, 0.0)).collect();
    blobs_2d(&centres, per_blob)
}

/// `per_blob` events on a small grid around each 2-D centre.
fn blobs_2d(centres: &[(f32, f32)], per_blob: usize) -> Vec<QueryEvent> {
    let mut events = Vec::new();
    for (b, &(cx, cy)) in centres.iter().enumerate() {
        for i in 0..per_blob {
            events.push(
                QueryEvent::new(format!("b{b}-{i:02}"), format!("topic {b} question {i}"))
                    .with_tenant(TENANT)
                    .with_embedding(vec![
                        cx + (i % 5) as f32 * 0.05,
                        cy + (i / 5) as f32 * 0.05,
                    ]),
            );
        }
    }
    events
}

/// Blob index encoded in a `b{b}-{i}` member id.
fn blob_of(member: &str) -> usize {
    usize::from(member.as_bytes()[1] - b'0')
}

/// Cluster ordinal and true blob for every clustered member.
fn predicted_and_true(report: &quarry::AnalyticsReport) -> (Vec<usize>, Vec<usize>) {
    report
        .clusters
        .iter()
        .flat_map(|c| c.members.iter().map(move |m| (c.ordinal, blob_of(m))))
        .unzip()
}

struct Harness {
    events: Arc<InMemoryEventStore>,
    reports: Arc<InMemoryReportStore>,
    engine: AnalyticsEngine,
}

fn harness(events: Vec<QueryEvent>, generator: Arc<dyn TextGenerator>) -> Harness {
    let events = Arc::new(InMemoryEventStore::with_events(events));
    let reports = Arc::new(InMemoryReportStore::new());
    let engine = AnalyticsEngine::new(
        events.clone(),
        reports.clone(),
        generator,
        AnalyticsConfig::default(),
    );
    Harness {
        events,
        reports,
        engine,
    }
}

/// Generator that answers every prompt with the same label.
struct FixedGenerator(&'static str);

#[async_trait]
impl TextGenerator for FixedGenerator {
    async fn generate_text(&self, _prompt: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

/// Generator that names a cluster after the topic number in its prompt.
struct TopicGenerator;

#[async_trait]
impl TextGenerator for TopicGenerator {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let topic = prompt
            .split("topic ")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap_or("?");
        Ok(format!("\"Topic {topic}\""))
    }
}

#[tokio::test]
async fn test_four_events_is_insufficient_and_unsaved() {
    let h = harness(blobs(&[0.0], 4), Arc::new(UnavailableGenerator));

    let report = h.engine.run_analytics(TENANT, None).await.unwrap();
    assert_eq!(report.status, ReportStatus::InsufficientData);
    assert_eq!(report.total_queries, 4);
    assert_eq!(h.reports.saves(), 0);
    assert!(matches!(
        h.engine.get_report(TENANT).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_five_events_completes() {
    let h = harness(blobs(&[0.0], 5), Arc::new(UnavailableGenerator));

    let report = h.engine.run_analytics(TENANT, None).await.unwrap();
    assert!(report.is_complete());
    assert!(report.auto_detected);
    // n = 5: effective_max = 4, so k lies in [1, 4]
    assert!((1..=4).contains(&report.optimal_clusters));
    assert_eq!(report.clustered_queries(), 5);
    assert_eq!(h.reports.saves(), 1);
}

#[tokio::test]
async fn test_duplicates_form_one_dominant_cluster() {
    let events: Vec<QueryEvent> = (0..20)
        .map(|i| {
            QueryEvent::new(format!("d{i:02}"), format!("how do I submit homework {i}"))
                .with_tenant(TENANT)
                .with_embedding(vec![0.3, 0.7, 0.1])
        })
        .collect();
    let h = harness(events, Arc::new(UnavailableGenerator));

    let report = h.engine.run_analytics(TENANT, None).await.unwrap();
    assert!(report.optimal_clusters <= 3);
    assert_eq!(report.num_clusters(), 1);
    assert_eq!(report.clusters[0].members.len(), 20);
    let assignments: Vec<usize> = report
        .clusters
        .iter()
        .flat_map(|c| std::iter::repeat(c.ordinal).take(c.members.len()))
        .collect();
    assert_eq!(dominant_share(&assignments), 1.0);
    // 20 members hydrate in two batches of 10
    assert!(h.events.lookups() >= 2);
}

#[tokio::test]
async fn test_three_blobs_give_three_clusters_of_ten() {
    let h = harness(blobs(&[0.0, 10.0, 40.0], 10), Arc::new(TopicGenerator));

    let report = h.engine.run_analytics(TENANT, None).await.unwrap();
    assert_eq!(report.optimal_clusters, 3);
    assert_eq!(report.num_clusters(), 3);
    for cluster in &report.clusters {
        assert_eq!(cluster.members.len(), 10);
        // Every member of a cluster comes from the same blob
        let blob = &cluster.members[0][..2];
        assert!(cluster.members.iter().all(|m| m.starts_with(blob)));
    }

    let (pred, truth) = predicted_and_true(&report);
    assert_eq!(purity(&pred, &truth), 1.0);

    let wire = h.engine.get_report(TENANT).await.unwrap();
    let clusters = wire.clusters().unwrap();
    let mut labels: Vec<&String> = clusters.keys().collect();
    labels.sort();
    assert_eq!(labels, vec!["Topic 0", "Topic 1", "Topic 2"]);
    assert!(clusters.values().all(|c| c.count == 10));
}

#[tokio::test]
async fn test_near_duplicates_are_split_by_the_elbow() {
    // Twenty paraphrases of one question: one point plus up to 1e-3 of noise.
    // An elbow over three or more candidates never answers below k = 3, so
    // unlike exact copies these do not stay in one cluster.
    let events: Vec<QueryEvent> = (0..20)
        .map(|i| {
            let jitter = |axis: usize| ((i * 3 + axis) as f32 * 1.7).sin() * 1e-3;
            QueryEvent::new(format!("n{i:02}"), format!("how do I submit homework {i}"))
                .with_tenant(TENANT)
                .with_embedding(vec![0.3 + jitter(0), 0.7 + jitter(1), 0.1 + jitter(2)])
        })
        .collect();
    let h = harness(events, Arc::new(UnavailableGenerator));

    let report = h.engine.run_analytics(TENANT, None).await.unwrap();
    assert!(report.auto_detected);
    assert!(report.optimal_clusters >= 3, "k = {}", report.optimal_clusters);
    assert_eq!(report.clustered_queries(), 20);

    let assignments: Vec<usize> = report
        .clusters
        .iter()
        .flat_map(|c| std::iter::repeat(c.ordinal).take(c.members.len()))
        .collect();
    assert!(dominant_share(&assignments) < 1.0);
}

#[tokio::test]
async fn test_equally_spaced_blobs_keep_blobs_apart() {
    // Three blobs on an equilateral triangle: the bend at k = 3 is no sharper
    // than later ones, so the elbow may overshoot and split a blob. No cluster
    // ever mixes blobs, and split halves share a label in the saved map.
    let h = harness(
        blobs_2d(&[(0.0, 0.0), (10.0, 0.0), (5.0, 8.66)], 10),
        Arc::new(TopicGenerator),
    );

    let report = h.engine.run_analytics(TENANT, None).await.unwrap();
    assert!(report.optimal_clusters >= 3, "k = {}", report.optimal_clusters);
    assert!(report.num_clusters() >= 3);
    assert_eq!(report.clustered_queries(), 30);

    let (pred, truth) = predicted_and_true(&report);
    assert_eq!(purity(&pred, &truth), 1.0);

    match h.engine.get_report(TENANT).await.unwrap() {
        Report::Complete {
            num_clusters,
            clusters,
            ..
        } => {
            let labels: Vec<&String> = clusters.keys().collect();
            assert_eq!(labels, vec!["Topic 0", "Topic 1", "Topic 2"]);
            assert_eq!(num_clusters, 3);
        }
        other => panic!("unexpected report {other:?}"),
    }
}

#[tokio::test]
async fn test_failing_generator_still_completes_with_fallbacks() {
    let h = harness(blobs(&[0.0, 10.0, 40.0], 10), Arc::new(UnavailableGenerator));

    let report = h.engine.run_analytics(TENANT, None).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.num_clusters(), 3);
    for cluster in &report.clusters {
        assert!(cluster.label.is_fallback());
        assert!(cluster.label.text().starts_with("Questions about topic "));
        assert!(cluster.label.text().ends_with("..."));
    }
    assert_eq!(h.reports.saves(), 1);
}

#[tokio::test]
async fn test_same_label_collapses_to_one_entry() {
    let h = harness(blobs(&[0.0, 10.0, 40.0], 10), Arc::new(FixedGenerator("General")));

    let report = h.engine.run_analytics(TENANT, Some(3)).await.unwrap();
    assert_eq!(report.num_clusters(), 3);
    let last = report.clusters.last().unwrap().clone();

    match h.engine.get_report(TENANT).await.unwrap() {
        Report::Complete {
            num_clusters,
            clusters,
            ..
        } => {
            // The saved count follows the label-keyed map
            assert_eq!(num_clusters, 1);
            assert_eq!(clusters.len(), 1);
            // The highest ordinal is the one kept
            assert_eq!(clusters["General"].sample_queries, last.sample_queries);
        }
        other => panic!("unexpected report {other:?}"),
    }
}

#[tokio::test]
async fn test_members_and_ratings_cover_every_vectored_event() {
    let mut events = blobs(&[0.0, 10.0, 40.0], 10);
    for (i, event) in events.iter_mut().enumerate() {
        event.rating = match i % 3 {
            0 => Rating::Helpful,
            1 => Rating::NotHelpful,
            _ => Rating::Unrated,
        };
    }
    // Events without an embedding count toward total_queries only
    for i in 0..4 {
        events.push(QueryEvent::new(format!("plain-{i}"), "no vector").with_tenant(TENANT));
    }
    let h = harness(events, Arc::new(UnavailableGenerator));

    let report = h.engine.run_analytics(TENANT, None).await.unwrap();
    assert_eq!(report.total_queries, 34);
    assert_eq!(report.clustered_queries(), 30);

    let mut helpful = 0;
    for cluster in &report.clusters {
        assert_eq!(cluster.ratings.total(), cluster.members.len());
        helpful += cluster.ratings.helpful;
    }
    assert_eq!(helpful, 10);
}

#[tokio::test]
async fn test_samples_follow_centroid_distance() {
    let events = blobs(&[0.0, 10.0, 40.0], 10);
    let texts: HashMap<String, String> = events
        .iter()
        .map(|e| (e.doc_id.clone(), e.query_text.clone()))
        .collect();
    let vectors: HashMap<String, Vec<f32>> = events
        .iter()
        .map(|e| (e.doc_id.clone(), e.embedding.clone().unwrap()))
        .collect();
    let h = harness(events, Arc::new(UnavailableGenerator));

    let report = h.engine.run_analytics(TENANT, Some(3)).await.unwrap();
    for cluster in &report.clusters {
        assert_eq!(cluster.sample_queries.len(), 3);
        for (sample, member) in cluster.sample_queries.iter().zip(&cluster.members) {
            assert_eq!(sample, &texts[member]);
        }

        let distances: Vec<f32> = cluster
            .members
            .iter()
            .map(|m| {
                vectors[m]
                    .iter()
                    .zip(&cluster.centroid)
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f32>()
            })
            .collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]), "{distances:?}");
    }
}

#[tokio::test]
async fn test_same_input_same_report() {
    let first = harness(blobs(&[0.0, 10.0, 40.0], 10), Arc::new(UnavailableGenerator));
    let second = harness(blobs(&[0.0, 10.0, 40.0], 10), Arc::new(UnavailableGenerator));

    let a = first.engine.run_analytics(TENANT, None).await.unwrap();
    let b = second.engine.run_analytics(TENANT, None).await.unwrap();
    assert_eq!(a.optimal_clusters, b.optimal_clusters);
    assert_eq!(a.clusters, b.clusters);
}

#[tokio::test]
async fn test_no_vectors_is_complete_and_empty() {
    let events: Vec<QueryEvent> = (0..6)
        .map(|i| QueryEvent::new(format!("e{i}"), "no embedding yet").with_tenant(TENANT))
        .collect();
    let h = harness(events, Arc::new(UnavailableGenerator));

    let report = h.engine.run_analytics(TENANT, None).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.optimal_clusters, 0);
    assert_eq!(report.num_clusters(), 0);
    assert_eq!(report.total_queries, 6);
    assert_eq!(h.reports.saves(), 1);
}

#[tokio::test]
async fn test_other_tenants_are_ignored() {
    let mut events = blobs(&[0.0, 10.0], 5);
    events.extend((0..50).map(|i| {
        QueryEvent::new(format!("other-{i}"), "other tenant")
            .with_tenant("course-7")
            .with_embedding(vec![99.0, 99.0])
    }));
    let h = harness(events, Arc::new(UnavailableGenerator));

    let report = h.engine.run_analytics(TENANT, None).await.unwrap();
    assert_eq!(report.total_queries, 10);
    assert!(report
        .clusters
        .iter()
        .flat_map(|c| &c.members)
        .all(|m| m.starts_with('b')));
}

struct BrokenReportStore;

#[async_trait]
impl ReportStore for BrokenReportStore {
    async fn save_report(&self, _tenant_id: &str, _report: &Report) -> Result<()> {
        Err(Error::Store("permission denied".into()))
    }

    async fn get_report(&self, _tenant_id: &str) -> Result<Option<Report>> {
        Ok(None)
    }
}

#[tokio::test]
async fn test_save_failure_is_returned() {
    let engine = AnalyticsEngine::new(
        Arc::new(InMemoryEventStore::with_events(blobs(&[0.0, 10.0], 5))),
        Arc::new(BrokenReportStore),
        Arc::new(UnavailableGenerator),
        AnalyticsConfig::default(),
    );

    let err = engine.run_analytics(TENANT, None).await.unwrap_err();
    assert!(matches!(err, Error::Store(_)), "{err}");
}

struct StalledEventStore;

#[async_trait]
impl EventStore for StalledEventStore {
    async fn get_events(
        &self,
        _tenant_id: &str,
        _type_filter: Option<&str>,
    ) -> Result<Vec<QueryEvent>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }

    async fn get_events_by_ids(&self, _ids: &[String]) -> Result<Vec<QueryEvent>> {
        Ok(Vec::new())
    }
}

#[tokio::test(start_paused = true)]
async fn test_stalled_store_times_out() {
    let engine = AnalyticsEngine::new(
        Arc::new(StalledEventStore),
        Arc::new(InMemoryReportStore::new()),
        Arc::new(UnavailableGenerator),
        AnalyticsConfig::default().with_call_timeout(Duration::from_secs(2)),
    );

    let err = engine.run_analytics(TENANT, None).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Timeout {
            operation: "get_events",
            ..
        }
    ));
}
