use crate::test_config;
use std::sync::Arc;
use sumi_frontier::checkpoint::{self, Checkpointer};
use sumi_frontier::config::{Config, StoreKind};
use sumi_frontier::frontier::{FetchOutcome, Frontier, ManualClock};
use sumi_frontier::robots::HonoringKind;
use sumi_frontier::store::open_store;
use sumi_frontier::uri::CandidateUri;
use sumi_frontier::{FetchStatus, QueueState};
use tempfile::TempDir;
use url::Url;

fn seed(s: &str) -> CandidateUri {
    CandidateUri::seed(Url::parse(s).unwrap())
}

fn config_in(dir: &TempDir, store: StoreKind) -> Config {
    let mut config = test_config(HonoringKind::Classic);
    config.fingerprints.store = store;
    config.fingerprints.capacity_bits = 6;
    config.fingerprints.path = dir.path().join("fingerprints.fps");
    config.checkpoint.directory = dir.path().join("checkpoints");
    config.checkpoint.prefix = "cp".to_string();
    config.frontier.min_delay_ms = 1_000;
    config.frontier.max_delay_ms = 1_000;
    config
}

/// Builds a frontier with queues in every state
fn populated(config: &Config, clock: Arc<ManualClock>) -> Frontier {
    let frontier = Frontier::with_clock(config, open_store(&config.fingerprints).unwrap(), clock);
    for uri in [
        "http://a.test/1",
        "http://a.test/2",
        "http://b.test/1",
        "http://c.test/1",
        "http://c.test/2",
    ] {
        frontier.schedule(seed(uri)).unwrap();
    }

    // a.test: robots fetched, then one page in flight
    let robots = frontier.try_next_at(0).unwrap().unwrap();
    assert_eq!(robots.uri().path(), "/robots.txt");
    frontier
        .finished_at(
            robots,
            FetchOutcome::new(FetchStatus::Http(200)).with_body("User-agent: *\nDisallow: /x\n"),
            0,
        )
        .unwrap();

    // b.test and c.test get their robots.txt dispatched and finished as 404
    for _ in 0..2 {
        let robots = frontier.try_next_at(0).unwrap().unwrap();
        frontier
            .finished_at(robots, FetchOutcome::new(FetchStatus::Http(404)), 0)
            .unwrap();
    }
    frontier.retire_queue("c.test").unwrap();
    frontier
}

#[test]
fn test_checkpoint_series_roundtrip_with_disk_store() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, StoreKind::Disk);
    let clock = Arc::new(ManualClock::new(0));
    let original = populated(&config, clock.clone());

    let in_flight = original.try_next_at(1_000).unwrap().unwrap();
    let before = original.report();

    let mut checkpointer = Checkpointer::new(&config.checkpoint)
        .unwrap()
        .with_config_hash("hash-1");
    let written = checkpointer.checkpoint(&original).unwrap();
    let wake_a = original.queue_wake_time("a.test");
    drop(original);

    let latest = checkpointer.latest_valid().unwrap().unwrap();
    assert_eq!(latest, written);
    let recovered =
        checkpoint::recover_with_clock(&latest, &config, Some("hash-1"), clock).unwrap();

    let after = recovered.report();
    assert_eq!(after.queued, before.queued + 1);
    assert_eq!(after.in_flight, 0);
    assert_eq!(after.totals, before.totals);
    assert_eq!(after.fingerprints, before.fingerprints);
    assert_eq!(after.robots_cached, 3);
    assert_eq!(recovered.queue_state("c.test"), Some(QueueState::Retired));
    assert_eq!(recovered.queue_wake_time("a.test"), wake_a);

    // every fingerprint survived: rediscovery is suppressed
    for uri in ["http://a.test/1", "http://b.test/1", "http://c.test/2"] {
        assert!(!recovered.schedule(seed(uri)).unwrap());
    }

    // the interrupted URI is first in line on its queue
    let resumed = recovered
        .try_next_at(1_000)
        .unwrap()
        .into_iter()
        .chain(recovered.try_next_at(1_000).unwrap())
        .find(|curi| curi.class_key == in_flight.class_key)
        .unwrap();
    assert_eq!(resumed.uri(), in_flight.uri());
}

#[test]
fn test_recovered_frontier_keeps_crawling() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, StoreKind::Memory);
    let clock = Arc::new(ManualClock::new(0));
    let original = populated(&config, clock.clone());

    let cp = dir.path().join("manual");
    checkpoint::checkpoint(&original, &cp, None).unwrap();
    let recovered = checkpoint::recover_with_clock(&cp, &config, None, clock).unwrap();
    recovered.reinstate_queue("c.test", false).unwrap();

    let mut fetched = Vec::new();
    let mut now = 1_000;
    while !recovered.is_finished() {
        match recovered.try_next_at(now).unwrap() {
            Some(curi) => {
                fetched.push(curi.uri().to_string());
                recovered
                    .finished_at(curi, FetchOutcome::new(FetchStatus::Http(200)), now)
                    .unwrap();
            }
            None => now += 1_000,
        }
        assert!(now < 100_000, "frontier stalled");
    }
    fetched.sort();
    assert_eq!(
        fetched,
        vec![
            "http://a.test/1",
            "http://a.test/2",
            "http://b.test/1",
            "http://c.test/1",
            "http://c.test/2",
        ]
    );
}

#[test]
fn test_checkpoint_during_scheduling_keeps_every_admitted_uri() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(HonoringKind::Ignore);
    config.fingerprints.capacity_bits = 10;
    let frontier = Frontier::from_config(&config).unwrap();

    let mut checkpoints = Vec::new();
    std::thread::scope(|scope| {
        for t in 0..4 {
            let frontier = &frontier;
            scope.spawn(move || {
                for i in 0..3_000 {
                    let uri = Url::parse(&format!("http://h{t}.test/{i}")).unwrap();
                    frontier.schedule(CandidateUri::new(uri)).unwrap();
                }
            });
        }
        for round in 0..10 {
            let cp = dir.path().join(format!("during{round:02}"));
            checkpoint::checkpoint(&frontier, &cp, None).unwrap();
            checkpoints.push(cp);
        }
    });

    for cp in checkpoints {
        let recovered = checkpoint::recover(&cp, &config, None).unwrap();
        assert_eq!(
            recovered.filter().count(),
            recovered.queued_count() as u64,
            "{} lost URIs",
            cp.display()
        );
        assert_eq!(recovered.totals().admitted, recovered.filter().count());
    }
}
