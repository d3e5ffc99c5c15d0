#[cfg(test)]
mod tests {
    use crate::algorithms::{RateLimitAlgorithm, SlidingWindow};
    use crate::config::RateLimitWindow;

    const START: u64 = 1_700_000_000_000;
    const POLICY: &str = "GET:/api/v1/todos";

    #[test]
    fn test_blocks_after_limit() {
        let algorithm = SlidingWindow::new();
        let windows = [RateLimitWindow::new(2, 10)];

        let first = algorithm.check_and_record(POLICY, "user:a", &windows, START);
        assert!(first.allowed, "First request should be allowed");
        assert_eq!(first.windows[0].remaining, 1);

        let second = algorithm.check_and_record(POLICY, "user:a", &windows, START + 1);
        assert!(second.allowed, "Second request should be allowed");
        assert_eq!(second.windows[0].remaining, 0);

        let third = algorithm.check_and_record(POLICY, "user:a", &windows, START + 2);
        assert!(!third.allowed, "Third request should be denied");
        assert_eq!(third.windows[0].remaining, 0);
    }

    #[test]
    fn test_first_exhausted_window_rejects_even_if_second_has_room() {
        let algorithm = SlidingWindow::new();
        let windows = [RateLimitWindow::new(10, 1), RateLimitWindow::new(200, 60)];

        for i in 0..10 {
            let verdict = algorithm.check_and_record(POLICY, "user:a", &windows, START + i * 50);
            assert!(verdict.allowed, "Request {} should be allowed", i);
        }

        let verdict = algorithm.check_and_record(POLICY, "user:a", &windows, START + 900);
        assert!(!verdict.allowed, "11th request inside one second should be denied");
        assert_eq!(verdict.windows[0].remaining, 0);
        assert_eq!(verdict.windows[1].remaining, 190);
    }

    #[test]
    fn test_rejections_are_not_recorded() {
        let algorithm = SlidingWindow::new();
        let window = RateLimitWindow::new(5, 60);

        let admitted = (0..10)
            .filter(|i| {
                algorithm
                    .check_and_record(POLICY, "ip:10.0.0.1", &[window], START + i)
                    .allowed
            })
            .count();

        assert_eq!(admitted, 5);
        assert_eq!(
            algorithm.recorded(POLICY, "ip:10.0.0.1", 0, &window, START + 10),
            5
        );
    }

    #[test]
    fn test_window_slides() {
        let algorithm = SlidingWindow::new();
        let windows = [RateLimitWindow::new(2, 1)];

        assert!(algorithm.check_and_record(POLICY, "k", &windows, START).allowed);
        assert!(algorithm.check_and_record(POLICY, "k", &windows, START + 600).allowed);
        assert!(!algorithm.check_and_record(POLICY, "k", &windows, START + 900).allowed);

        // The entry at START is still live exactly at the boundary
        assert!(!algorithm.check_and_record(POLICY, "k", &windows, START + 1_000).allowed);

        // One millisecond later it has expired, the one at START + 600 has not
        let verdict = algorithm.check_and_record(POLICY, "k", &windows, START + 1_001);
        assert!(verdict.allowed);
        assert_eq!(verdict.windows[0].remaining, 0);
    }

    #[test]
    fn test_reset_at_tracks_oldest_entry() {
        let algorithm = SlidingWindow::new();
        let windows = [RateLimitWindow::new(3, 60)];

        let verdict = algorithm.check_and_record(POLICY, "k", &windows, START + 250);
        // First whole second after START + 250 + 60_000
        assert_eq!(verdict.windows[0].reset_at, (START + 60_250) / 1_000 + 1);

        let later = algorithm.check_and_record(POLICY, "k", &windows, START + 5_000);
        assert_eq!(later.windows[0].reset_at, verdict.windows[0].reset_at);
    }

    #[test]
    fn test_identities_and_policies_are_isolated() {
        let algorithm = SlidingWindow::new();
        let windows = [RateLimitWindow::new(1, 60)];

        assert!(algorithm.check_and_record(POLICY, "user:a", &windows, START).allowed);
        assert!(!algorithm.check_and_record(POLICY, "user:a", &windows, START).allowed);

        assert!(algorithm.check_and_record(POLICY, "user:b", &windows, START).allowed);
        assert!(
            algorithm
                .check_and_record("POST:/api/v1/todos", "user:a", &windows, START)
                .allowed
        );
    }

    #[test]
    fn test_empty_window_list_always_allows() {
        let algorithm = SlidingWindow::new();
        for i in 0..100 {
            let verdict = algorithm.check_and_record(POLICY, "k", &[], START + i);
            assert!(verdict.allowed);
            assert!(verdict.windows.is_empty());
            assert!(verdict.most_restrictive().is_none());
        }
        assert_eq!(algorithm.counter_count(), 0);
    }

    #[test]
    fn test_expired_counters_are_dropped() {
        let algorithm = SlidingWindow::new();
        let windows = [RateLimitWindow::new(1, 1)];

        assert!(algorithm.check_and_record(POLICY, "k", &windows, START).allowed);
        assert_eq!(algorithm.counter_count(), 1);

        // Rejections leave the counter map unchanged
        assert!(algorithm.check_and_record(POLICY, "other", &windows, START).allowed);
        assert!(!algorithm.check_and_record(POLICY, "other", &windows, START).allowed);
        assert_eq!(algorithm.counter_count(), 2);

        let verdict = algorithm.check_and_record(POLICY, "k", &windows, START + 5_000);
        assert!(verdict.allowed);
        assert_eq!(algorithm.counter_count(), 2);
    }

    #[test]
    fn test_reset_all_clears_everything() {
        let algorithm = SlidingWindow::new();
        let windows = [RateLimitWindow::new(1, 60)];

        assert!(algorithm.check_and_record(POLICY, "k", &windows, START).allowed);
        assert!(!algorithm.check_and_record(POLICY, "k", &windows, START).allowed);

        algorithm.reset_all();
        assert_eq!(algorithm.counter_count(), 0);
        assert!(algorithm.check_and_record(POLICY, "k", &windows, START).allowed);
    }

    #[test]
    fn test_most_restrictive_prefers_first_on_tie() {
        let algorithm = SlidingWindow::new();
        let windows = [RateLimitWindow::new(3, 1), RateLimitWindow::new(3, 60)];

        let verdict = algorithm.check_and_record(POLICY, "k", &windows, START);
        let picked = verdict.most_restrictive().unwrap();
        assert_eq!(picked.window_seconds, 1);
        assert_eq!(picked.remaining, 2);
    }

    #[test]
    fn test_reset_is_after_the_boundary_entry() {
        let algorithm = SlidingWindow::new();
        let windows = [RateLimitWindow::new(1, 60)];

        // START is a whole second, so the entry is live through START + 60_000
        assert!(algorithm.check_and_record(POLICY, "k", &windows, START).allowed);
        let verdict = algorithm.check_and_record(POLICY, "k", &windows, START + 10);
        assert!(!verdict.allowed);
        assert_eq!(verdict.windows[0].reset_at, (START + 60_000) / 1_000 + 1);

        let at_reset = verdict.windows[0].reset_at * 1_000;
        assert!(!algorithm.check_and_record(POLICY, "k", &windows, START + 60_000).allowed);
        assert!(algorithm.check_and_record(POLICY, "k", &windows, at_reset).allowed);
    }

    #[test]
    fn test_most_restrictive_prefers_latest_reset_when_exhausted() {
        let algorithm = SlidingWindow::new();
        let windows = [RateLimitWindow::new(2, 60), RateLimitWindow::new(2, 3_600)];

        assert!(algorithm.check_and_record(POLICY, "k", &windows, START).allowed);
        assert!(algorithm.check_and_record(POLICY, "k", &windows, START + 30_000).allowed);

        let verdict = algorithm.check_and_record(POLICY, "k", &windows, START + 31_000);
        assert!(!verdict.allowed);
        assert!(verdict.windows.iter().all(|w| w.remaining == 0));

        let picked = verdict.most_restrictive().unwrap();
        assert_eq!(picked.window_seconds, 3_600);
        assert_eq!(picked.reset_at, (START + 3_600_000) / 1_000 + 1);
    }

    #[test]
    fn test_concurrent_callers_never_exceed_limit() {
        use std::sync::Arc;

        let algorithm = Arc::new(SlidingWindow::new());
        let windows = [RateLimitWindow::new(50, 60)];

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let algorithm = Arc::clone(&algorithm);
                std::thread::spawn(move || {
                    (0..20)
                        .filter(|_| {
                            algorithm
                                .check_and_record(POLICY, "shared", &windows, START)
                                .allowed
                        })
                        .count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }
}
