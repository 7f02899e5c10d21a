use crate::test_config;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::thread;
use sumi_frontier::config::StoreKind;
use sumi_frontier::frontier::Frontier;
use sumi_frontier::robots::HonoringKind;
use sumi_frontier::uri::CandidateUri;
use tempfile::TempDir;
use url::Url;

const THREADS: u64 = 8;
const OFFERS_PER_THREAD: usize = 2_000;
const DISTINCT: u64 = 500;

fn stress(frontier: &Frontier) {
    thread::scope(|scope| {
        for t in 0..THREADS {
            scope.spawn(move || {
                let mut rng = StdRng::seed_from_u64(t);
                for _ in 0..OFFERS_PER_THREAD {
                    let n = rng.gen_range(0..DISTINCT);
                    let uri = Url::parse(&format!("http://h{}.test/p{}", n % 7, n)).unwrap();
                    frontier.schedule(CandidateUri::new(uri)).unwrap();
                }
                // make sure every URI is offered at least once
                for n in (t..DISTINCT).step_by(THREADS as usize) {
                    let uri = Url::parse(&format!("http://h{}.test/p{}", n % 7, n)).unwrap();
                    frontier.schedule(CandidateUri::new(uri)).unwrap();
                }
            });
        }
    });
}

#[test]
fn test_concurrent_discovery_admits_each_uri_once() {
    let config = test_config(HonoringKind::Ignore);
    let frontier = Frontier::from_config(&config).unwrap();
    stress(&frontier);

    assert_eq!(frontier.queued_count() as u64, DISTINCT);
    assert_eq!(frontier.totals().admitted, DISTINCT);
    let stats = frontier.filter().stats();
    assert_eq!(stats.added, DISTINCT);
    assert_eq!(
        stats.added + stats.duplicates,
        THREADS * OFFERS_PER_THREAD as u64 + DISTINCT
    );
}

#[test]
fn test_concurrent_discovery_with_disk_store() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(HonoringKind::Ignore);
    config.fingerprints.store = StoreKind::Disk;
    config.fingerprints.capacity_bits = 6;
    config.fingerprints.path = dir.path().join("fingerprints.fps");
    let frontier = Frontier::from_config(&config).unwrap();
    stress(&frontier);

    assert_eq!(frontier.filter().count(), DISTINCT);
    assert_eq!(frontier.totals().admitted, DISTINCT);
}

#[test]
fn test_forget_allows_rediscovery() {
    let config = test_config(HonoringKind::Ignore);
    let frontier = Frontier::from_config(&config).unwrap();
    let uri = Url::parse("http://ex.com/again").unwrap();

    assert!(frontier.schedule(CandidateUri::new(uri.clone())).unwrap());
    assert!(!frontier.schedule(CandidateUri::new(uri.clone())).unwrap());
    frontier.filter().forget(&uri).unwrap();
    assert!(frontier.schedule(CandidateUri::new(uri)).unwrap());
    assert_eq!(frontier.queued_count(), 2);
}
