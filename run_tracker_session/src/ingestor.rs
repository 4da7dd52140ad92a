use std::{sync::Arc, time::Duration};

use run_tracker_lib::{geo_point::GeoPoint, location_fix::LocationFix};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{ConversionError, CoordinateConverter, FixEpoch, SessionState};

pub const DEFAULT_CONVERSION_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, PartialEq)]
pub enum FixRejection {
    /// The location source reported an error instead of a position.
    SourceError { code: i32, info: String },
    /// Arrived while nothing is being recorded.
    NotTracking(SessionState),
}

impl FixRejection {
    pub(crate) fn log(&self) {
        match self {
            FixRejection::SourceError { code, info } => {
                tracing::warn!("Location error, code: {}, info: {}", code, info);
            }
            FixRejection::NotTracking(state) => {
                tracing::debug!("Dropping fix received while {:?}", state);
            }
        }
    }
}

pub(crate) struct PendingFix {
    point: GeoPoint,
    epoch: FixEpoch,
}

#[derive(Debug)]
pub(crate) struct ConvertedFix {
    pub point: GeoPoint,
    pub epoch: FixEpoch,
}

/// Screens raw fixes and hands the accepted ones to a conversion worker.
///
/// The worker converts one fix at a time, so converted fixes come back in the
/// order they were received. Results are re-enqueued on the session executor,
/// which decides whether they still belong to the running lap.
pub struct LocationIngestor {
    pending: mpsc::Sender<PendingFix>,
}

impl LocationIngestor {
    /// Decides at receipt whether a fix is worth converting, and for which lap.
    pub fn screen(fix: &LocationFix, state: SessionState, epoch: Option<FixEpoch>) -> Result<(GeoPoint, FixEpoch), FixRejection> {
        if fix.is_error() {
            return Err(FixRejection::SourceError {
                code: fix.error_code,
                info: fix.error_info.clone(),
            });
        }

        match epoch {
            Some(epoch) if state == SessionState::Tracking => Ok((fix.point(), epoch)),
            _ => Err(FixRejection::NotTracking(state)),
        }
    }

    pub(crate) fn spawn(
        converter: Arc<dyn CoordinateConverter>,
        timeout: Duration,
        capacity: usize,
        converted: mpsc::Sender<ConvertedFix>,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (pending, pending_rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(conversion_worker(converter, timeout, pending_rx, converted, cancel));
        (Self { pending }, worker)
    }

    /// Never waits. A full conversion queue drops the fix.
    pub(crate) fn dispatch(&self, point: GeoPoint, epoch: FixEpoch) -> bool {
        match self.pending.try_send(PendingFix { point, epoch }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Conversion queue full, dropping fix");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::error!("Conversion worker is gone, dropping fix");
                false
            }
        }
    }
}

async fn convert_with_timeout(converter: &dyn CoordinateConverter, point: GeoPoint, timeout: Duration) -> Result<GeoPoint, ConversionError> {
    match tokio::time::timeout(timeout, converter.convert(point)).await {
        Ok(result) => result,
        Err(_) => Err(ConversionError::Timeout(timeout.as_millis() as u64)),
    }
}

async fn conversion_worker(
    converter: Arc<dyn CoordinateConverter>,
    timeout: Duration,
    mut pending: mpsc::Receiver<PendingFix>,
    converted: mpsc::Sender<ConvertedFix>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = pending.recv() => next,
        };
        let Some(PendingFix { point, epoch }) = next else {
            break;
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = convert_with_timeout(converter.as_ref(), point, timeout) => result,
        };

        match result {
            Ok(point) => {
                if converted.send(ConvertedFix { point, epoch }).await.is_err() {
                    break;
                }
            }
            Err(err) => tracing::warn!("Dropping fix, {}", err),
        }
    }

    tracing::debug!("Conversion worker stopped");
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::PassThroughConverter;

    const EPOCH: FixEpoch = FixEpoch { session: 1, lap: 0 };

    struct SlowConverter(Duration);

    #[async_trait::async_trait]
    impl CoordinateConverter for SlowConverter {
        async fn convert(&self, point: GeoPoint) -> Result<GeoPoint, ConversionError> {
            tokio::time::sleep(self.0).await;
            Ok(point)
        }
    }

    #[test]
    fn error_fixes_are_rejected_first() {
        let fix = LocationFix::error(12, "no permission");
        assert_eq!(
            LocationIngestor::screen(&fix, SessionState::Tracking, Some(EPOCH)),
            Err(FixRejection::SourceError { code: 12, info: "no permission".into() })
        );
    }

    #[test]
    fn fixes_outside_tracking_are_rejected() {
        let fix = LocationFix::new(1.0, 2.0);
        for state in [SessionState::Idle, SessionState::Paused, SessionState::Stopped] {
            assert_eq!(LocationIngestor::screen(&fix, state, None), Err(FixRejection::NotTracking(state)));
        }
        assert_eq!(
            LocationIngestor::screen(&fix, SessionState::Tracking, Some(EPOCH)),
            Ok((GeoPoint::new(1.0, 2.0), EPOCH))
        );
    }

    proptest! {
        #[test]
        fn nonzero_error_code_is_never_accepted(code in any::<i32>().prop_filter("error", |c| *c != 0), lat in -90.0f64..90.0, lon in -180.0f64..180.0) {
            let fix = LocationFix { latitude: lat, longitude: lon, error_code: code, error_info: String::new() };
            for state in [SessionState::Idle, SessionState::Tracking, SessionState::Paused, SessionState::Stopped] {
                let accepted = LocationIngestor::screen(&fix, state, Some(EPOCH)).is_ok();
                prop_assert!(!accepted);
            }
        }
    }

    #[tokio::test]
    async fn worker_keeps_submission_order() {
        let (converted_tx, mut converted_rx) = mpsc::channel(16);
        let (ingestor, _worker) = LocationIngestor::spawn(Arc::new(PassThroughConverter), DEFAULT_CONVERSION_TIMEOUT, 16, converted_tx, CancellationToken::new());

        for i in 0..5 {
            assert!(ingestor.dispatch(GeoPoint::new(i as f64, 0.0), EPOCH));
        }
        for i in 0..5 {
            let converted = converted_rx.recv().await.unwrap();
            assert_eq!(converted.point.latitude, i as f64);
            assert_eq!(converted.epoch, EPOCH);
        }
    }

    #[tokio::test]
    async fn failed_conversions_are_dropped() {
        let (converted_tx, mut converted_rx) = mpsc::channel(16);
        let (ingestor, _worker) = LocationIngestor::spawn(Arc::new(PassThroughConverter), DEFAULT_CONVERSION_TIMEOUT, 16, converted_tx, CancellationToken::new());

        ingestor.dispatch(GeoPoint::new(123.0, 0.0), EPOCH);
        ingestor.dispatch(GeoPoint::new(1.0, 0.0), EPOCH);

        assert_eq!(converted_rx.recv().await.unwrap().point, GeoPoint::new(1.0, 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_conversions_time_out() {
        let (converted_tx, mut converted_rx) = mpsc::channel(16);
        let (ingestor, _worker) = LocationIngestor::spawn(Arc::new(SlowConverter(Duration::from_secs(5))), Duration::from_millis(100), 16, converted_tx, CancellationToken::new());

        ingestor.dispatch(GeoPoint::new(1.0, 0.0), EPOCH);

        let waited = tokio::time::timeout(Duration::from_secs(1), converted_rx.recv()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn cancelled_worker_stops() {
        let (converted_tx, _converted_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let (ingestor, worker) = LocationIngestor::spawn(Arc::new(PassThroughConverter), DEFAULT_CONVERSION_TIMEOUT, 16, converted_tx, cancel.clone());

        cancel.cancel();
        worker.await.unwrap();
        assert!(!ingestor.dispatch(GeoPoint::new(1.0, 0.0), EPOCH));
    }
}
