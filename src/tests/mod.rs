//! Scheduler scenarios driven by a scripted transport and a manual clock

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod scheduler_scenarios {
    use crate::monitor::clock::{Clock, ManualClock};
    use crate::monitor::{HostSource, MonitorConfig, MonitorError, ProbeScheduler, SchedulerState};
    use crate::probe::{ProbeOutcome, ProbeRequest, ProbeTransport};
    use std::cell::Cell;
    use std::collections::{HashMap, HashSet};
    use std::rc::Rc;
    use std::time::Duration;

    /// Transport whose replies arrive after a per-host latency on a shared clock
    struct ScriptedTransport {
        clock: Rc<ManualClock>,
        latency: HashMap<String, Duration>,
        default_latency: Duration,
        down: HashSet<String>,
        unreachable: HashSet<String>,
        issued: Vec<String>,
        pending: Option<(Duration, ProbeOutcome)>,
    }

    impl ScriptedTransport {
        fn new(clock: Rc<ManualClock>) -> Self {
            Self {
                clock,
                latency: HashMap::new(),
                default_latency: Duration::from_millis(10),
                down: HashSet::new(),
                unreachable: HashSet::new(),
                issued: Vec::new(),
                pending: None,
            }
        }

        fn slow(mut self, host: &str, latency: Duration) -> Self {
            self.latency.insert(host.to_string(), latency);
            self
        }

        fn down(mut self, host: &str) -> Self {
            self.down.insert(host.to_string());
            self
        }

        fn unreachable(mut self, host: &str) -> Self {
            self.unreachable.insert(host.to_string());
            self
        }
    }

    impl ProbeTransport for ScriptedTransport {
        fn issue(&mut self, host: &str, request: &ProbeRequest) -> anyhow::Result<()> {
            if self.unreachable.contains(host) {
                anyhow::bail!("network is unreachable");
            }
            self.issued.push(host.to_string());

            let now = self.clock.now();
            let pending = if self.down.contains(host) {
                (now + request.timeout, ProbeOutcome::TimedOut)
            } else {
                let latency = self
                    .latency
                    .get(host)
                    .copied()
                    .unwrap_or(self.default_latency);
                (
                    now + latency,
                    ProbeOutcome::Reply {
                        rtt_ms: latency.as_millis() as u32,
                        ttl: Some(60),
                    },
                )
            };
            self.pending = Some(pending);
            Ok(())
        }

        fn poll(&mut self) -> Option<ProbeOutcome> {
            match self.pending {
                Some((ready_at, outcome)) if self.clock.now() >= ready_at => {
                    self.pending = None;
                    Some(outcome)
                }
                _ => None,
            }
        }
    }

    type Scheduler = ProbeScheduler<ScriptedTransport, Rc<ManualClock>>;

    fn config(tick_budget_ms: u64) -> MonitorConfig {
        MonitorConfig::builder()
            .tick_budget(Duration::from_millis(tick_budget_ms))
            .probe_timeout(Duration::from_millis(1000))
            .burst_spacing(Duration::from_secs(1))
            .sweep_period(Duration::from_secs(120))
            .poll_interval(Duration::from_millis(10))
            .build()
            .unwrap()
    }

    fn scheduler_with(
        transport: impl FnOnce(Rc<ManualClock>) -> ScriptedTransport,
        tick_budget_ms: u64,
        hosts: &[&'static str],
    ) -> (Scheduler, Rc<ManualClock>) {
        let clock = Rc::new(ManualClock::new());
        let mut scheduler = ProbeScheduler::new(
            transport(Rc::clone(&clock)),
            Rc::clone(&clock),
            config(tick_budget_ms),
        );
        for host in hosts {
            scheduler.add_target(*host, *host).unwrap();
        }
        (scheduler, clock)
    }

    fn issued(scheduler: &Scheduler) -> &[String] {
        &scheduler.probe_line().transport().issued
    }

    #[test]
    fn test_budget_cut_and_resume() {
        let (mut scheduler, _clock) = scheduler_with(
            |clock| ScriptedTransport::new(clock).slow("b", Duration::from_millis(600)),
            500,
            &["a", "b", "c"],
        );

        let report = scheduler.tick().unwrap();
        assert_eq!(report.visited, 2);
        assert!(!report.completed_round);
        assert_eq!(issued(&scheduler), ["a", "b"]);
        assert_eq!(scheduler.cursor(), 2);

        // The next tick starts with the target that was skipped
        let report = scheduler.tick().unwrap();
        assert_eq!(issued(&scheduler), ["a", "b", "c"]);
        assert_eq!(report.probed, 1);
        assert!(report.completed_round);
        assert_eq!(scheduler.cursor(), 2);
    }

    #[test]
    fn test_overshoot_is_bounded_by_one_probe() {
        let (mut scheduler, clock) = scheduler_with(
            |clock| {
                ScriptedTransport::new(clock)
                    .slow("a", Duration::from_millis(400))
                    .down("b")
            },
            500,
            &["a", "b", "c"],
        );

        let started = clock.now();
        let report = scheduler.tick().unwrap();
        let elapsed = clock.now() - started;

        assert_eq!(report.visited, 2);
        assert!(elapsed > Duration::from_millis(500));
        assert!(elapsed <= Duration::from_millis(1500));
    }

    #[test]
    fn test_no_target_starves() {
        let (mut scheduler, clock) = scheduler_with(
            |clock| ScriptedTransport::new(clock).slow("a", Duration::from_millis(900)),
            500,
            &["a", "b", "c", "d"],
        );

        for _ in 0..12 {
            scheduler.tick().unwrap();
            clock.advance(Duration::from_secs(1));
        }

        for target in scheduler.targets() {
            assert!(
                target.total_responses() >= 3,
                "{} only probed {} times",
                target.id(),
                target.total_responses()
            );
        }
    }

    #[test]
    fn test_cut_short_round_never_publishes() {
        let (mut scheduler, clock) = scheduler_with(ScriptedTransport::new, 0, &["a", "b"]);
        let publishes = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&publishes);
        scheduler.on_publish(move || counter.set(counter.get() + 1));

        let mut rounds = Vec::new();
        for _ in 0..7 {
            let report = scheduler.tick().unwrap();
            rounds.push((report.completed_round, report.published));

            if report.visited == 1 && scheduler.target(0).unwrap().total_responses() == 3 {
                // Only "a" was visited: it is ready and a publish is pending,
                // but "b" was never reached in this tick
                assert!(scheduler.target(0).unwrap().is_ready());
                assert!(scheduler.publish_pending());
            }
            clock.advance(Duration::from_secs(1));
        }

        assert_eq!(
            rounds,
            vec![
                (false, false),
                (false, false),
                (false, false),
                (false, false),
                (false, false),
                (false, false),
                (true, true),
            ]
        );
        assert_eq!(publishes.get(), 1);
        assert!(!scheduler.publish_pending());
    }

    #[test]
    fn test_publish_once_per_burst_cycle() {
        let (mut scheduler, clock) = scheduler_with(ScriptedTransport::new, 500, &["a", "b", "c"]);
        let publishes = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&publishes);
        scheduler.on_publish(move || counter.set(counter.get() + 1));

        // Two full sweep periods
        for _ in 0..250 {
            let report = scheduler.tick().unwrap();
            if report.published {
                assert!(report.completed_round);
                assert!(scheduler.targets().all(|t| t.is_ready()));
            }
            clock.advance(Duration::from_secs(1));
        }

        // Bursts at t=0 and after each sweep period
        assert_eq!(publishes.get(), 3);
        for target in scheduler.targets() {
            assert_eq!(target.total_responses(), 9);
        }
    }

    #[test]
    fn test_partial_burst_does_not_publish() {
        let (mut scheduler, _clock) = scheduler_with(ScriptedTransport::new, 500, &["a"]);
        let published = Rc::new(Cell::new(false));
        let flag = Rc::clone(&published);
        scheduler.on_publish(move || flag.set(true));

        assert_eq!(scheduler.state(), SchedulerState::Sweeping);
        let report = scheduler.tick().unwrap();
        assert_eq!(report.probed, 1);
        assert!(!report.published);
        assert!(!published.get());
    }

    #[test]
    fn test_state_transitions() {
        let (mut scheduler, clock) = scheduler_with(ScriptedTransport::new, 0, &[]);
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        scheduler.add_target("a", "a").unwrap();
        scheduler.add_target("b", "b").unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Sweeping);

        // With a budget of zero each tick probes one target
        let mut saw_round_complete = false;
        for _ in 0..7 {
            scheduler.tick().unwrap();
            if scheduler.state() == SchedulerState::RoundComplete {
                saw_round_complete = true;
            }
            clock.advance(Duration::from_secs(1));
        }
        assert!(saw_round_complete);
        assert_eq!(scheduler.state(), SchedulerState::Sweeping);
    }

    #[test]
    fn test_timeouts_and_stats() {
        let (mut scheduler, clock) = scheduler_with(
            |clock| {
                ScriptedTransport::new(clock)
                    .down("down")
                    .slow("up", Duration::from_millis(20))
            },
            5000,
            &["up", "down"],
        );

        for _ in 0..3 {
            scheduler.tick().unwrap();
            clock.advance(Duration::from_secs(1));
        }

        let up = scheduler.stats(0).unwrap();
        assert_eq!(up.sent, 3);
        assert_eq!(up.lost, 0);
        assert_eq!(up.avg_rtt_ms, 20);
        assert_eq!(up.avg_ttl, 60);

        let down = scheduler.stats(1).unwrap();
        assert_eq!(down.sent, 3);
        assert_eq!(down.lost, 3);
        assert_eq!(down.loss_percent, 100.0);
        assert_eq!(down.avg_rtt_ms, 999);
    }

    #[test]
    fn test_transport_failure_is_not_fatal() {
        let (mut scheduler, _clock) = scheduler_with(
            |clock| ScriptedTransport::new(clock).unreachable("a"),
            500,
            &["a", "b"],
        );

        let report = scheduler.tick().unwrap();
        assert_eq!(report.visited, 2);
        assert_eq!(report.probed, 2);
        assert_eq!(issued(&scheduler), ["b"]);
        assert_eq!(scheduler.target(0).unwrap().total_responses(), 1);
        assert_eq!(scheduler.stats(0).unwrap().sent, 0);
        assert!(!scheduler.probe_line().is_busy());
    }

    #[test]
    fn test_probe_in_flight_is_flagged() {
        let (mut scheduler, clock) = scheduler_with(ScriptedTransport::new, 500, &["a", "b"]);

        let ticket = scheduler
            .probe_line_mut()
            .start("manual", "x", ProbeRequest::single(Duration::from_secs(1)), clock.now())
            .unwrap();

        let err = scheduler.tick().unwrap_err();
        assert!(matches!(err, MonitorError::ProbeInFlight { ref target } if target == "a"));
        assert_eq!(scheduler.cursor(), 0);
        assert_eq!(scheduler.target(0).unwrap().total_responses(), 0);

        scheduler
            .probe_line_mut()
            .wait(ticket, &clock, Duration::from_millis(10));
        let report = scheduler.tick().unwrap();
        assert_eq!(report.probed, 2);
    }

    #[test]
    fn test_dynamic_host_resolved_per_probe() {
        let (mut scheduler, clock) = scheduler_with(ScriptedTransport::new, 500, &[]);
        let generation = Rc::new(Cell::new(0u32));
        let source = Rc::clone(&generation);
        scheduler
            .add_target(
                "wan",
                HostSource::resolver(move || {
                    source.set(source.get() + 1);
                    format!("203.0.113.{}", source.get())
                }),
            )
            .unwrap();

        for _ in 0..3 {
            scheduler.tick().unwrap();
            clock.advance(Duration::from_secs(1));
        }
        assert_eq!(issued(&scheduler), ["203.0.113.1", "203.0.113.2", "203.0.113.3"]);

        // Skipped updates do not resolve
        scheduler.tick().unwrap();
        assert_eq!(generation.get(), 3);
    }
}
