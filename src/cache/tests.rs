//! Cache Module Tests
//!
//! Validates snapshot construction and the lock-free read path.
//!
//! ## Test Scopes
//! - **Convergence**: After a recompute every cached page equals a direct `select_range`.
//! - **Policy**: Staleness, page/window limits and `clear` turn lookups into misses.
//! - **Concurrency**: A recompute requested while another runs never starts a second pass.
//! - **Metrics**: Hit/miss accounting and snapshot statistics.

#[cfg(test)]
mod tests {
    use crate::cache::{CacheResult, PrecomputedCache, RecomputeOutcome, Snapshot};
    use crate::config::LeaderboardConfig;
    use crate::ranking::{RankEntry, RankedSet};
    use parking_lot::RwLock;
    use std::sync::Arc;
    use std::time::Duration;

    fn populated_set(count: u64) -> RwLock<RankedSet> {
        let mut set = RankedSet::new();
        for id in 1..=count {
            set.insert(RankEntry {
                subject_id: id,
                name: format!("user-{}", id),
                points: ((id * 7) % 23) as i64,
                registration_seq: id,
                activity_count: id % 3,
                baseline_rank: id,
            });
        }
        RwLock::new(set)
    }

    fn small_config() -> LeaderboardConfig {
        LeaderboardConfig {
            page_sizes: vec![10, 25],
            max_pages: 4,
            around_windows: vec![1, 3],
            around_me_subjects: 20,
            ..LeaderboardConfig::default()
        }
    }

    // ============================================================
    // CONVERGENCE TESTS
    // ============================================================

    #[test]
    fn test_pages_converge_with_ranked_set() {
        // ARRANGE
        let set = populated_set(87);
        let cache = PrecomputedCache::new(small_config());

        // ACT
        let outcome = cache.recompute(&set);

        // ASSERT
        assert!(!outcome.was_in_progress());
        let guard = set.read();
        for page_size in [10u64, 25] {
            let page_count = 87u64.div_ceil(page_size).min(4);
            for page in 1..=page_count {
                let start = (page - 1) * page_size + 1;
                let expected = guard.select_range(start, start + page_size - 1);
                match cache.get_page(page, page_size) {
                    CacheResult::Hit(rows) => assert_eq!(rows.to_vec(), expected),
                    CacheResult::Miss => panic!("page {} size {} should be cached", page, page_size),
                }
            }
        }
    }

    #[test]
    fn test_windows_and_ranks_converge_with_ranked_set() {
        let set = populated_set(50);
        let cache = PrecomputedCache::new(small_config());
        cache.recompute(&set);

        let guard = set.read();
        let top: Vec<u64> = guard.iter().take(20).map(|e| e.subject_id).collect();

        for subject_id in top {
            for window in [1u64, 3] {
                let expected = guard.around(subject_id, window).unwrap();
                let cached = cache.get_around_me(subject_id, window).hit().unwrap();
                assert_eq!(cached.to_vec(), expected);
            }
            assert_eq!(cache.get_rank(subject_id), CacheResult::Hit(guard.rank_of(subject_id).unwrap()));
        }
    }

    #[test]
    fn test_last_page_is_partial() {
        let set = populated_set(27);
        let cache = PrecomputedCache::new(small_config());
        cache.recompute(&set);

        let page = cache.get_page(3, 10).hit().unwrap();
        assert_eq!(page.len(), 7);
        assert_eq!(page.first().unwrap().rank, 21);
        assert!(cache.get_page(4, 10).is_miss());
    }

    // ============================================================
    // POLICY TESTS
    // ============================================================

    #[test]
    fn test_uncached_shapes_miss() {
        let set = populated_set(200);
        let cache = PrecomputedCache::new(small_config());
        cache.recompute(&set);

        // Beyond max_pages
        assert!(cache.get_page(5, 10).is_miss());
        // Page size not materialized
        assert!(cache.get_page(1, 7).is_miss());
        // Window radius not materialized
        let leader = set.read().entry_at(1).unwrap().entry.subject_id;
        assert!(cache.get_around_me(leader, 2).is_miss());
        // Subject outside the top `around_me_subjects`
        let tail = set.read().entry_at(150).unwrap().entry.subject_id;
        assert!(cache.get_around_me(tail, 1).is_miss());
        // Ranks cover every subject
        assert_eq!(cache.get_rank(tail), CacheResult::Hit(150));
    }

    #[test]
    fn test_stale_snapshot_is_a_miss() {
        let set = populated_set(30);
        let config = LeaderboardConfig {
            max_staleness_secs: 0,
            ..small_config()
        };
        let cache = PrecomputedCache::new(config);
        cache.recompute(&set);

        assert!(cache.get_page(1, 10).is_miss());
        assert!(cache.snapshot().page(1, 10).is_some(), "Data is there, only too old");
    }

    #[test]
    fn test_empty_cache_misses_before_first_recompute() {
        let cache = PrecomputedCache::new(small_config());

        assert!(cache.get_page(1, 10).is_miss());
        assert!(cache.get_rank(1).is_miss());
        assert_eq!(cache.metrics().last_recompute_at_ms, None);
    }

    #[test]
    fn test_clear_drops_everything() {
        let set = populated_set(30);
        let cache = PrecomputedCache::new(small_config());
        cache.recompute(&set);
        assert!(cache.get_page(1, 10).is_hit());

        cache.clear();

        assert!(cache.get_page(1, 10).is_miss());
        assert_eq!(cache.metrics().cached_pages, 0);
    }

    #[test]
    fn test_old_snapshot_stays_valid_after_swap() {
        // ARRANGE
        let set = populated_set(30);
        let cache = PrecomputedCache::new(small_config());
        cache.recompute(&set);
        let old: Arc<Snapshot> = cache.snapshot();
        let old_leader = old.page(1, 10).unwrap()[0].clone();

        // ACT: a new leader appears and a new generation is published
        set.write().insert(RankEntry {
            subject_id: 999,
            name: "newcomer".to_string(),
            points: 1_000,
            registration_seq: 999,
            activity_count: 0,
            baseline_rank: 31,
        });
        cache.recompute(&set);

        // ASSERT
        assert_eq!(old.page(1, 10).unwrap()[0], old_leader, "Readers holding the old generation see it unchanged");
        let fresh = cache.get_page(1, 10).hit().unwrap();
        assert_eq!(fresh[0].entry.subject_id, 999);
        assert_eq!(cache.snapshot().generation(), old.generation() + 1);
    }

    // ============================================================
    // CONCURRENCY TESTS
    // ============================================================

    #[test]
    fn test_concurrent_recompute_joins_in_flight_pass() {
        // ARRANGE: block the first pass on the tree read lock
        let set = Arc::new(populated_set(40));
        let cache = Arc::new(PrecomputedCache::new(small_config()));
        let writer = set.write();

        let first = {
            let (set, cache) = (set.clone(), cache.clone());
            std::thread::spawn(move || cache.recompute(&set))
        };
        while !cache.metrics().recompute_in_progress {
            std::thread::sleep(Duration::from_millis(1));
        }

        // ACT
        assert!(cache.try_refresh(&set).is_none(), "Scheduler refresh must skip while busy");

        let second = {
            let (set, cache) = (set.clone(), cache.clone());
            std::thread::spawn(move || cache.recompute(&set))
        };
        std::thread::sleep(Duration::from_millis(100));
        drop(writer);

        let first = first.join().unwrap();
        let second = second.join().unwrap();

        // ASSERT
        assert!(matches!(first, RecomputeOutcome::Completed(_)));
        assert!(second.was_in_progress());
        assert_eq!(first.snapshot().generation(), second.snapshot().generation());
        assert_eq!(cache.metrics().computations, 1);
    }

    #[test]
    fn test_clear_during_pass_never_hands_out_empty_generation() {
        // ARRANGE: a pass blocked on the tree read lock
        let set = Arc::new(populated_set(40));
        let cache = Arc::new(PrecomputedCache::new(small_config()));
        let writer = set.write();

        let first = {
            let (set, cache) = (set.clone(), cache.clone());
            std::thread::spawn(move || cache.recompute(&set))
        };
        while !cache.metrics().recompute_in_progress {
            std::thread::sleep(Duration::from_millis(1));
        }

        // ACT: clear returns without waiting for the pass
        cache.clear();
        let second = {
            let (set, cache) = (set.clone(), cache.clone());
            std::thread::spawn(move || cache.recompute(&set))
        };
        std::thread::sleep(Duration::from_millis(100));
        drop(writer);

        let first = first.join().unwrap();
        let second = second.join().unwrap();

        // ASSERT
        assert!(matches!(first, RecomputeOutcome::Completed(_)));
        assert!(second.was_in_progress());
        assert_eq!(second.snapshot().generation(), 1);
        assert_eq!(second.snapshot().total_entries(), 40);
        assert!(cache.get_page(1, 10).is_hit());
    }

    #[test]
    fn test_recompute_after_clear_runs_a_pass() {
        let set = populated_set(30);
        let cache = PrecomputedCache::new(small_config());
        cache.recompute(&set);
        cache.clear();

        let outcome = cache.recompute(&set);

        assert!(matches!(outcome, RecomputeOutcome::Completed(_)));
        assert_eq!(outcome.snapshot().generation(), 2);
        assert_eq!(cache.metrics().computations, 2);
    }

    // ============================================================
    // METRICS TESTS
    // ============================================================

    #[test]
    fn test_metrics_track_hits_and_misses() {
        let set = populated_set(30);
        let cache = PrecomputedCache::new(small_config());
        cache.recompute(&set);

        cache.get_page(1, 10); // hit
        cache.get_page(2, 10); // hit
        cache.get_page(3, 10); // hit
        cache.get_page(9, 10); // miss

        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 3);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.total_requests, 4);
        assert_eq!(metrics.hit_rate, 75.0);
        assert_eq!(metrics.computations, 1);
        assert_eq!(metrics.total_entries, 30);
        assert_eq!(metrics.cached_ranks, 30);
        assert!(metrics.last_recompute_at_ms.is_some());
        assert!(!metrics.recompute_in_progress);
    }
}
