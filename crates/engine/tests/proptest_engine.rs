mod support;

use proptest::prelude::*;

use common::AdvisorConfig;
use engine::{RollingHistory, TickEngine};
use strategy::Providers;

use support::{calls, candle, checked_ids, Call, GatedProvider, Probe};

proptest! {
    /// The rolling history keeps exactly the newest `capacity` candles.
    #[test]
    fn history_keeps_newest_rows(capacity in 1usize..64, pushes in 0u64..200) {
        let mut history = RollingHistory::new(capacity);
        for i in 1..=pushes {
            history.push(&candle(i));
        }
        let expected = (pushes as usize).min(capacity);
        prop_assert_eq!(history.len(), expected);

        let snapshot = history.snapshot();
        if expected > 0 {
            let oldest = pushes - expected as u64 + 1;
            prop_assert_eq!(snapshot.close[0], oldest as f64);
            prop_assert_eq!(*snapshot.close.last().unwrap(), pushes as f64);
        }
    }

    /// Without async indicators every candle is admitted inline and `check`
    /// runs once per candle from the warmup point onwards.
    #[test]
    fn sync_only_accounting(n in 0u64..60, required in 0u64..20) {
        let (probe, log) = Probe::new();
        let cfg = AdvisorConfig { required_history: required, ..AdvisorConfig::default() };
        let mut engine = TickEngine::new(
            Box::new(probe.with_sync("ma", "sma", 3)),
            &cfg,
            Providers::default(),
        ).unwrap();

        for i in 1..=n {
            let mut done = engine.tick(candle(i));
            prop_assert!(done.is_done());
        }

        let first = required.max(1);
        let expected: Vec<u64> = (first..=n).collect();
        prop_assert_eq!(engine.age(), n);
        prop_assert_eq!(engine.processed_ticks(), n);
        prop_assert_eq!(checked_ids(&log), expected);
    }

    /// However candle delivery interleaves with async completions, every
    /// candle is checked exactly once, in order, with sync and async
    /// indicators describing the same candle.
    #[test]
    fn mixed_indicators_stay_in_lockstep(
        drain_after in prop::collection::vec(any::<bool>(), 1..40),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let (alpha, _gate) = GatedProvider::open("alpha");
            let mut providers = Providers::empty();
            providers.install(alpha);

            let (probe, log) = Probe::new();
            let probe = probe.with_sync("ma", "sma", 1).with_async("alpha", "a");
            let mut engine = TickEngine::new(Box::new(probe), &AdvisorConfig::default(), providers)
                .unwrap();

            let n = drain_after.len() as u64;
            for (i, drain) in (1..=n).zip(&drain_after) {
                engine.tick(candle(i));
                if *drain {
                    engine.drain().await.unwrap();
                }
            }
            engine.drain().await.unwrap();
            let mut finished = engine.finish().unwrap();
            assert!(finished.is_done());

            let checks: Vec<_> = calls(&log)
                .into_iter()
                .filter(|c| matches!(c, Call::Check { .. }))
                .collect();
            let expected: Vec<_> = (1..=n)
                .map(|i| Call::Check {
                    id: i,
                    sync: vec![Some(i as f64)],
                    asynchronous: vec![Some(i as f64)],
                })
                .collect();
            assert_eq!(checks, expected);
            assert_eq!(engine.deferred_len(), 0);
        });
    }
}
