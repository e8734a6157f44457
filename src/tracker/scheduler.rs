use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::error::TrackerError;
use super::frame::{compute_frame, CachedFrame, FrameSettings, NextPassCache};
use crate::predict::{Ephemeris, Observer, Satellite};

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSettings {
    pub frame_refresh: StdDuration,
    pub next_pass_refresh: StdDuration,
    pub frame: FrameSettings,
}

#[derive(Debug, Default)]
struct Shared {
    latest: Option<Arc<CachedFrame>>,
    computations: u64,
}

struct Request {
    satellites: Arc<[Satellite]>,
    observer: Observer,
    now: DateTime<Utc>,
}

#[derive(Debug)]
struct WorkerHandle {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Runs frame computations off the control loop, one at a time.
///
/// The control loop calls [`ComputeScheduler::maybe_refresh`] every tick; it never
/// waits on a computation and always gets the last published frame back.
pub struct ComputeScheduler {
    ephemeris: Arc<dyn Ephemeris>,
    settings: SchedulerSettings,
    refresh: Duration,
    shared: Arc<StdMutex<Shared>>,
    busy: Arc<AtomicBool>,
    request_tx: Option<mpsc::Sender<Request>>,
    worker: Option<WorkerHandle>,
}

impl ComputeScheduler {
    pub fn new(ephemeris: Arc<dyn Ephemeris>, settings: SchedulerSettings) -> Self {
        let refresh = Duration::from_std(settings.frame_refresh).unwrap_or(Duration::MAX);
        Self {
            ephemeris,
            settings,
            refresh,
            shared: Arc::new(StdMutex::new(Shared::default())),
            busy: Arc::new(AtomicBool::new(false)),
            request_tx: None,
            worker: None,
        }
    }

    /// Spawns the worker task. Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<(), TrackerError> {
        if self.worker.is_some() {
            return Err(TrackerError::AlreadyRunning);
        }

        let (request_tx, request_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = oneshot::channel();
        let join = tokio::spawn(run_worker(
            self.ephemeris.clone(),
            self.settings.clone(),
            self.shared.clone(),
            self.busy.clone(),
            request_rx,
            stop_rx,
        ));

        self.request_tx = Some(request_tx);
        self.worker = Some(WorkerHandle { stop_tx, join });
        log::debug!("Compute worker started");
        Ok(())
    }

    /// Requests a new frame when the latest one is missing or stale and the worker
    /// is idle, then returns the latest published frame.
    pub fn maybe_refresh(
        &self,
        satellites: &Arc<[Satellite]>,
        observer: &Observer,
        now: DateTime<Utc>,
    ) -> Option<Arc<CachedFrame>> {
        let latest = self.latest();
        let stale = latest
            .as_ref()
            .map(|frame| frame.age(now) >= self.refresh)
            .unwrap_or(true);

        if stale {
            if let Some(request_tx) = &self.request_tx {
                if self
                    .busy
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    let request = Request {
                        satellites: satellites.clone(),
                        observer: *observer,
                        now,
                    };
                    if request_tx.try_send(request).is_err() {
                        self.busy.store(false, Ordering::Release);
                    }
                }
            }
        }

        latest
    }

    pub fn latest(&self) -> Option<Arc<CachedFrame>> {
        self.shared.lock().unwrap().latest.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Number of frames published so far.
    pub fn computations(&self) -> u64 {
        self.shared.lock().unwrap().computations
    }

    /// Stops the worker. A computation already running finishes first.
    pub async fn shutdown(&mut self) {
        self.request_tx = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            if let Err(e) = worker.join.await {
                log::error!("Compute worker ended abnormally: {}", e);
            }
            log::debug!("Compute worker stopped");
        }
    }
}

async fn run_worker(
    ephemeris: Arc<dyn Ephemeris>,
    settings: SchedulerSettings,
    shared: Arc<StdMutex<Shared>>,
    busy: Arc<AtomicBool>,
    mut request_rx: mpsc::Receiver<Request>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut passes = NextPassCache::new(settings.next_pass_refresh);

    loop {
        // A request already accepted by `maybe_refresh` counts as in flight.
        let request = tokio::select! {
            biased;
            request = request_rx.recv() => match request {
                Some(request) => request,
                None => break,
            },
            _ = &mut stop_rx => break,
        };

        let ephemeris = ephemeris.clone();
        let frame_settings = settings.frame.clone();
        let job = tokio::task::spawn_blocking(move || {
            let mut passes = passes;
            let frame = compute_frame(
                ephemeris.as_ref(),
                &request.satellites,
                &request.observer,
                request.now,
                &frame_settings,
                &mut passes,
            );
            (frame, passes)
        });

        match job.await {
            Ok((frame, returned)) => {
                passes = returned;
                log::debug!(
                    "Frame for {} satellites published, best {:?}",
                    frame.telemetry.len(),
                    frame.scores.best
                );
                let mut locked = shared.lock().unwrap();
                locked.latest = Some(Arc::new(frame));
                locked.computations += 1;
            }
            Err(e) => {
                log::error!("Frame computation failed: {}", e);
                passes = NextPassCache::new(settings.next_pass_refresh);
            }
        }
        busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ScoringParams;
    use crate::test_support::{epoch, FakeEphemeris, FakeTrack};

    fn settings() -> SchedulerSettings {
        SchedulerSettings {
            frame_refresh: StdDuration::from_millis(500),
            next_pass_refresh: StdDuration::from_secs(60),
            frame: FrameSettings {
                scoring: ScoringParams::default(),
                min_pass_elevation_deg: 20.0,
            },
        }
    }

    fn observer() -> Observer {
        Observer::new(-31.9505, 115.8605, 0.0)
    }

    async fn wait_for_computations(scheduler: &ComputeScheduler, count: u64) {
        for _ in 0..1_000 {
            if scheduler.computations() >= count && !scheduler.is_busy() {
                return;
            }
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
        panic!("worker never published frame {}", count);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn first_call_returns_nothing_then_publishes() {
        let (ephemeris, sats) =
            FakeEphemeris::with_tracks(vec![FakeTrack::fixed("UP", 10.0, 50.0, 700.0)]);
        let sats: Arc<[Satellite]> = sats.into();
        let mut scheduler = ComputeScheduler::new(Arc::new(ephemeris), settings());
        scheduler.start().unwrap();

        assert!(scheduler.maybe_refresh(&sats, &observer(), epoch()).is_none());
        wait_for_computations(&scheduler, 1).await;

        let frame = scheduler.maybe_refresh(&sats, &observer(), epoch()).unwrap();
        assert_eq!(frame.computed_at, epoch());
        assert_eq!(frame.scores.best, Some(0));
        scheduler.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn same_frame_is_returned_within_the_refresh_interval() {
        let (ephemeris, sats) =
            FakeEphemeris::with_tracks(vec![FakeTrack::fixed("UP", 10.0, 50.0, 700.0)]);
        let sats: Arc<[Satellite]> = sats.into();
        let mut scheduler = ComputeScheduler::new(Arc::new(ephemeris), settings());
        scheduler.start().unwrap();

        scheduler.maybe_refresh(&sats, &observer(), epoch());
        wait_for_computations(&scheduler, 1).await;

        let first = scheduler.maybe_refresh(&sats, &observer(), epoch()).unwrap();
        for ms in [100, 250, 499] {
            let now = epoch() + Duration::milliseconds(ms);
            let again = scheduler.maybe_refresh(&sats, &observer(), now).unwrap();
            assert!(Arc::ptr_eq(&first, &again));
        }
        assert!(!scheduler.is_busy());
        assert_eq!(scheduler.computations(), 1);

        let stale = scheduler
            .maybe_refresh(&sats, &observer(), epoch() + Duration::milliseconds(500))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &stale));
        wait_for_computations(&scheduler, 2).await;
        let fresh = scheduler.latest().unwrap();
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert_eq!(fresh.computed_at, epoch() + Duration::milliseconds(500));
        scheduler.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn never_two_computations_in_flight() {
        let (ephemeris, sats) = FakeEphemeris::with_tracks(vec![
            FakeTrack::fixed("A", 10.0, 50.0, 700.0),
            FakeTrack::fixed("B", 200.0, 60.0, 900.0),
        ]);
        let ephemeris = Arc::new(ephemeris.with_delay(StdDuration::from_millis(3)));
        let sats: Arc<[Satellite]> = sats.into();
        let mut scheduler = ComputeScheduler::new(ephemeris.clone(), settings());
        scheduler.start().unwrap();

        // Every call is past the refresh interval, but the first computation is
        // still running for all of them.
        for i in 0..50 {
            let now = epoch() + Duration::seconds(i);
            scheduler.maybe_refresh(&sats, &observer(), now);
        }
        wait_for_computations(&scheduler, 1).await;
        assert_eq!(scheduler.computations(), 1);
        assert_eq!(scheduler.latest().unwrap().computed_at, epoch());

        scheduler.maybe_refresh(&sats, &observer(), epoch() + Duration::minutes(5));
        wait_for_computations(&scheduler, 2).await;
        assert_eq!(ephemeris.max_in_flight(), 1);
        scheduler.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_lets_the_running_computation_finish() {
        let (ephemeris, sats) =
            FakeEphemeris::with_tracks(vec![FakeTrack::fixed("A", 10.0, 50.0, 700.0)]);
        let ephemeris = Arc::new(ephemeris.with_delay(StdDuration::from_millis(5)));
        let sats: Arc<[Satellite]> = sats.into();
        let mut scheduler = ComputeScheduler::new(ephemeris, settings());
        scheduler.start().unwrap();

        scheduler.maybe_refresh(&sats, &observer(), epoch());
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        scheduler.shutdown().await;

        let frame = scheduler.latest().unwrap();
        assert_eq!(frame.telemetry.len(), 1);
        assert!(frame.telemetry[0].is_some());
        assert!(!scheduler.is_busy());
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let (ephemeris, _) = FakeEphemeris::with_tracks(vec![]);
        let mut scheduler = ComputeScheduler::new(Arc::new(ephemeris), settings());
        scheduler.start().unwrap();
        assert!(matches!(scheduler.start(), Err(TrackerError::AlreadyRunning)));
        scheduler.shutdown().await;
    }

    #[test]
    fn without_a_worker_nothing_is_requested() {
        let (ephemeris, sats) =
            FakeEphemeris::with_tracks(vec![FakeTrack::fixed("A", 10.0, 50.0, 700.0)]);
        let sats: Arc<[Satellite]> = sats.into();
        let scheduler = ComputeScheduler::new(Arc::new(ephemeris), settings());
        assert!(scheduler.maybe_refresh(&sats, &observer(), epoch()).is_none());
        assert!(!scheduler.is_busy());
    }
}
