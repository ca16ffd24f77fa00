//! Trip status polling loop.
//!
//! The second assignment channel: a timer-driven loop asking the backend
//! for the trip's search status. It feeds the reconciler exactly like the
//! push channel and carries its own wall-clock bound, independent of the
//! matcher's ladder, so the tighter of the two bounds decides when an
//! unresolved search fails.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::types::ServerTripStatus;
use crate::api::RideApi;
use crate::domain::TripId;

use super::event::{AssignmentEvent, SessionId};
use super::reconciler::{AssignmentReconciler, Resolution};

/// Why the polling loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// An assignment resolved, through this loop or any other channel.
    Resolved,
    /// The wall-clock bound fired with nothing resolved.
    TimedOut,
    /// The stop token fired without a resolution (cancellation).
    Stopped,
    /// The server reports the trip is over.
    Terminal(ServerTripStatus),
}

/// Poll the search status until resolution, cancellation, a terminal
/// server status, or the wall-clock timeout.
///
/// Fetch failures are logged and the loop keeps going; an unreliable
/// channel is expected, not fatal. The first tick fires immediately.
pub(crate) async fn poll_search_status<A: RideApi>(
    api: Arc<A>,
    trip: TripId,
    session: SessionId,
    reconciler: Arc<AssignmentReconciler>,
    interval: Duration,
    timeout: Duration,
    stop: CancellationToken,
) -> PollOutcome {
    let deadline = Instant::now() + timeout;
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = stop.cancelled() => {
                return if reconciler.is_resolved() {
                    PollOutcome::Resolved
                } else {
                    PollOutcome::Stopped
                };
            }
            _ = tokio::time::sleep_until(deadline) => {
                warn!(trip = %trip, "search poll timed out");
                return PollOutcome::TimedOut;
            }
            _ = ticker.tick() => {}
        }

        let status = tokio::select! {
            _ = stop.cancelled() => {
                return if reconciler.is_resolved() {
                    PollOutcome::Resolved
                } else {
                    PollOutcome::Stopped
                };
            }
            _ = tokio::time::sleep_until(deadline) => return PollOutcome::TimedOut,
            result = api.search_status(&trip) => result,
        };

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                warn!(trip = %trip, error = %e, "status poll failed, will retry");
                continue;
            }
        };

        if status.driver_assigned {
            match status.driver {
                Some(driver) => {
                    match reconciler.resolve(AssignmentEvent::from_poll(session, driver)) {
                        Resolution::Applied | Resolution::Duplicate => {
                            return PollOutcome::Resolved;
                        }
                        Resolution::Stale => return PollOutcome::Stopped,
                    }
                }
                None => {
                    // Assigned but no driver payload yet: pick it up next tick.
                    debug!(trip = %trip, "assignment reported without driver payload");
                    continue;
                }
            }
        }

        if status.trip_status.is_terminal() {
            debug!(trip = %trip, status = ?status.trip_status, "trip reached terminal status");
            return PollOutcome::Terminal(status.trip_status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{
        MockRideApi, assigned_status, driver_record, searching_status, terminal_status,
    };
    use crate::domain::{GeoPoint, LatLng, LocationSource, PaymentMethod, TripRequest, VehicleClass};
    use crate::trip::{MemoryStore, TripState, TripStateStore};

    fn searching_store() -> Arc<TripStateStore> {
        let store = Arc::new(TripStateStore::new(Arc::new(MemoryStore::new())));
        let request = TripRequest::new(
            GeoPoint::new(LatLng::new(18.4861, -69.9312), "origin", LocationSource::Gps),
            GeoPoint::new(
                LatLng::new(18.4734, -69.8849),
                "destination",
                LocationSource::Manual,
            ),
            VehicleClass::Economy,
            PaymentMethod::Card,
            175.0,
        );
        store.begin_search(&request).unwrap();
        store
    }

    struct Fixture {
        api: Arc<MockRideApi>,
        store: Arc<TripStateStore>,
        session: SessionId,
        reconciler: Arc<AssignmentReconciler>,
        stop: CancellationToken,
    }

    fn fixture(api: MockRideApi) -> Fixture {
        let store = searching_store();
        let session = SessionId::generate();
        let stop = CancellationToken::new();
        let reconciler = Arc::new(AssignmentReconciler::new(
            session,
            store.clone(),
            stop.clone(),
        ));
        Fixture {
            api: Arc::new(api),
            store,
            session,
            reconciler,
            stop,
        }
    }

    fn run(
        f: &Fixture,
        interval: Duration,
        timeout: Duration,
    ) -> impl Future<Output = PollOutcome> + use<> {
        poll_search_status(
            f.api.clone(),
            TripId("trip-1".into()),
            f.session,
            f.reconciler.clone(),
            interval,
            timeout,
            f.stop.clone(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_when_server_reports_assignment() {
        let api = MockRideApi::new();
        api.push_status(searching_status());
        api.push_status(assigned_status(driver_record("d-1", "Luis", 18.49, -69.93)));
        let f = fixture(api);

        let outcome = run(&f, Duration::from_secs(3), Duration::from_secs(120)).await;

        assert_eq!(outcome, PollOutcome::Resolved);
        assert_eq!(f.store.state(), TripState::DriverAssigned);
        assert_eq!(f.api.status_calls(), 2);
        assert!(f.stop.is_cancelled(), "winner must stop the other channels");
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_wall_clock_bound() {
        let f = fixture(MockRideApi::new());

        let outcome = run(&f, Duration::from_secs(3), Duration::from_secs(120)).await;

        assert_eq!(outcome, PollOutcome::TimedOut);
        assert_eq!(f.store.state(), TripState::Searching);
        // First tick immediate, then every 3 s until the 120 s bound.
        assert!(f.api.status_calls() >= 39, "got {}", f.api.status_calls());
        assert!(f.api.status_calls() <= 41, "got {}", f.api.status_calls());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_terminal_server_status() {
        let api = MockRideApi::new();
        api.push_status(terminal_status(ServerTripStatus::Cancelled));
        let f = fixture(api);

        let outcome = run(&f, Duration::from_secs(3), Duration::from_secs(120)).await;
        assert_eq!(outcome, PollOutcome::Terminal(ServerTripStatus::Cancelled));
        assert_eq!(f.store.state(), TripState::Searching);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_token_ends_the_loop() {
        let f = fixture(MockRideApi::new());
        let task = tokio::spawn(run(&f, Duration::from_secs(3), Duration::from_secs(120)));

        tokio::time::sleep(Duration::from_secs(7)).await;
        f.stop.cancel();

        assert_eq!(task.await.unwrap(), PollOutcome::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn prior_resolution_short_circuits_the_loop() {
        let api = MockRideApi::new();
        api.push_status(searching_status());
        let f = fixture(api);
        // Another channel already won; the stopped loop reports Resolved
        // even though its own fetches never saw the driver.
        let won = f.reconciler.resolve(AssignmentEvent::from_search(
            f.session,
            driver_record("d-9", "Ana", 18.49, -69.93).into_candidate(),
        ));
        assert_eq!(won, Resolution::Applied);

        let outcome = run(&f, Duration::from_secs(3), Duration::from_secs(120)).await;
        assert_eq!(outcome, PollOutcome::Resolved);
        assert_eq!(f.store.state(), TripState::DriverAssigned);
    }
}
