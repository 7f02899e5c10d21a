use crate::test_config;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use sumi_frontier::frontier::{Disposition, FetchOutcome, Frontier, ManualClock};
use sumi_frontier::robots::HonoringKind;
use sumi_frontier::store::MemoryFingerprintStore;
use sumi_frontier::uri::{CandidateUri, CrawlUri, Hop};
use sumi_frontier::FetchStatus;
use url::Url;

const HOSTS: usize = 5;
const PAGES: usize = 10;

/// Links found on a synthetic page `http://h{host}.test/{page}`
fn links_of(curi: &CrawlUri) -> Vec<Url> {
    let uri = curi.uri();
    let host: usize = uri.host_str().unwrap()[1..].trim_end_matches(".test").parse().unwrap();
    let Ok(page) = uri.path()[1..].parse::<usize>() else {
        return Vec::new();
    };
    let url = |h: usize, path: String| Url::parse(&format!("http://h{h}.test/{path}")).unwrap();
    vec![
        url(host, ((page + 1) % PAGES).to_string()),
        url(host, ((page * 3) % PAGES).to_string()),
        url((host + 1) % HOSTS, page.to_string()),
        url(host, format!("private/{page}")),
    ]
}

#[derive(Default)]
struct Observed {
    fetched: Mutex<Vec<String>>,
    busy_queues: Mutex<HashSet<String>>,
}

async fn worker(frontier: Arc<Frontier>, observed: Arc<Observed>) {
    loop {
        let curi = match frontier.next().await.unwrap() {
            Some(curi) => curi,
            None if frontier.is_finished() => break,
            None => continue,
        };
        assert!(
            observed
                .busy_queues
                .lock()
                .unwrap()
                .insert(curi.class_key.clone()),
            "two URIs of {} in flight",
            curi.class_key
        );
        observed
            .fetched
            .lock()
            .unwrap()
            .push(curi.uri().to_string());

        let outcome = if curi.uri().path() == "/robots.txt" {
            FetchOutcome::new(FetchStatus::Http(200)).with_body("User-agent: *\nDisallow: /private\n")
        } else {
            for link in links_of(&curi) {
                frontier
                    .schedule(CandidateUri::discovered(link, &curi.candidate, Hop::Link))
                    .unwrap();
            }
            FetchOutcome::new(FetchStatus::Http(200)).with_size(512)
        };
        tokio::task::yield_now().await;

        observed.busy_queues.lock().unwrap().remove(&curi.class_key);
        frontier.finished(curi, outcome).unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_crawl_fetches_each_page_once() {
    let config = test_config(HonoringKind::Classic);
    let frontier = Arc::new(Frontier::new(&config, Box::new(MemoryFingerprintStore::new(10))));
    frontier.schedule_seeds(&["http://h0.test/0"]).unwrap();

    let observed = Arc::new(Observed::default());
    let handles: Vec<_> = (0..4)
        .map(|_| tokio::spawn(worker(frontier.clone(), observed.clone())))
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let fetched = observed.fetched.lock().unwrap();
    let unique: HashSet<&String> = fetched.iter().collect();
    assert_eq!(unique.len(), fetched.len(), "a URI was fetched twice");
    assert_eq!(fetched.len(), HOSTS * PAGES + HOSTS);
    assert!(fetched.iter().all(|uri| !uri.contains("/private/")));

    let disposed = frontier.take_disposed();
    assert_eq!(disposed.len(), HOSTS * PAGES);
    assert!(disposed
        .iter()
        .all(|curi| curi.fetch_status == FetchStatus::RobotsPrecluded));

    let totals = frontier.totals();
    assert_eq!(totals.succeeded, (HOSTS * PAGES + HOSTS) as u64);
    assert_eq!(totals.disregarded, (HOSTS * PAGES) as u64);
    assert!(frontier.is_finished());
}

#[test]
fn test_server_quota_blocks_eleventh_success() {
    let mut config = test_config(HonoringKind::Ignore);
    config.quotas.server_max_fetch_successes = 10;
    config.quotas.force_retire = true;
    let frontier = Frontier::with_clock(
        &config,
        Box::new(MemoryFingerprintStore::new(8)),
        Arc::new(ManualClock::new(0)),
    );
    for i in 0..12 {
        frontier
            .schedule(CandidateUri::seed(
                Url::parse(&format!("http://ex.com/{i}")).unwrap(),
            ))
            .unwrap();
    }

    for _ in 0..10 {
        let curi = frontier.try_next_at(0).unwrap().unwrap();
        let done = frontier
            .finished_at(curi, FetchOutcome::new(FetchStatus::Http(200)), 0)
            .unwrap();
        assert_eq!(done, Disposition::Succeeded);
    }

    assert!(frontier.try_next_at(0).unwrap().is_none());
    let blocked = frontier.take_disposed();
    assert_eq!(blocked.len(), 1);
    assert_eq!(blocked[0].uri().path(), "/10");
    assert_eq!(blocked[0].fetch_status, FetchStatus::BlockedByQuota);
    assert!(blocked[0].has_annotation("Q:server-fetchSuccesses"));
    assert_eq!(
        frontier.queue_state("ex.com"),
        Some(sumi_frontier::QueueState::Retired)
    );
}

#[test]
fn test_hostname_assignment_shares_queue_across_ports() {
    let mut config = test_config(HonoringKind::Ignore);
    config.frontier.queue_assignment = sumi_frontier::config::QueueAssignment::Hostname;
    let frontier = Frontier::with_clock(
        &config,
        Box::new(MemoryFingerprintStore::new(8)),
        Arc::new(ManualClock::new(0)),
    );
    frontier
        .schedule_seeds(&["http://ex.com/a", "http://ex.com:8080/b"])
        .unwrap();

    let first = frontier.try_next_at(0).unwrap().unwrap();
    assert_eq!(first.class_key, "ex.com");
    assert!(frontier.try_next_at(0).unwrap().is_none());
}
