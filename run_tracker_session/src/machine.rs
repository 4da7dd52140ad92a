use run_tracker_lib::{geo_path::GeoPath, geo_point::GeoPoint};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::{ClockTick, SessionClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Tracking,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    StartOrResume,
    Pause,
    Stop,
}

/// Identifies the lap a fix was received in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixEpoch {
    pub session: u64,
    pub lap: u32,
}

#[derive(Debug)]
pub struct Session {
    id: u64,
    lap: u32,
    path: GeoPath,
    clock: SessionClock,
}

impl Session {
    fn new(id: u64) -> Self {
        Self {
            id,
            lap: 0,
            path: GeoPath::new(),
            clock: SessionClock::new(),
        }
    }

    fn begin_lap(&mut self, now: Instant) {
        self.path.open_segment();
        self.clock.start_lap(now);
    }

    pub fn path(&self) -> &GeoPath {
        &self.path
    }

    pub fn epoch(&self) -> FixEpoch {
        FixEpoch {
            session: self.id,
            lap: self.lap,
        }
    }
}

/// What is left of a session once it is stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedSession {
    pub id: u64,
    pub path: GeoPath,
    pub elapsed_millis: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Started(FixEpoch),
    Resumed(FixEpoch),
    Paused { elapsed_millis: i64 },
    Stopped(FinishedSession),
    Ignored,
}

enum Phase {
    Idle,
    Tracking(Session),
    Paused(Session),
    Stopped,
}

/// Owns the session and decides what every command does to it.
///
/// Commands that make no sense in the current state are ignored.
pub struct SessionStateMachine {
    phase: Phase,
    sessions_started: u64,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            sessions_started: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Idle => SessionState::Idle,
            Phase::Tracking(_) => SessionState::Tracking,
            Phase::Paused(_) => SessionState::Paused,
            Phase::Stopped => SessionState::Stopped,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.phase {
            Phase::Tracking(session) | Phase::Paused(session) => Some(session),
            Phase::Idle | Phase::Stopped => None,
        }
    }

    /// Only set while tracking, fixes are accepted for this epoch alone.
    pub fn epoch(&self) -> Option<FixEpoch> {
        match &self.phase {
            Phase::Tracking(session) => Some(session.epoch()),
            _ => None,
        }
    }

    pub fn elapsed_millis(&self) -> i64 {
        self.session().map_or(0, |session| session.clock.elapsed_millis())
    }

    pub fn handle(&mut self, command: Command, now: Instant) -> Transition {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);

        let (phase, transition) = match (phase, command) {
            (Phase::Idle | Phase::Stopped, Command::StartOrResume) => {
                self.sessions_started += 1;
                let mut session = Session::new(self.sessions_started);
                session.begin_lap(now);
                let epoch = session.epoch();
                (Phase::Tracking(session), Transition::Started(epoch))
            }
            (Phase::Paused(mut session), Command::StartOrResume) => {
                session.lap += 1;
                session.begin_lap(now);
                let epoch = session.epoch();
                (Phase::Tracking(session), Transition::Resumed(epoch))
            }
            (Phase::Tracking(mut session), Command::Pause) => {
                let elapsed_millis = session.clock.stop_lap();
                (Phase::Paused(session), Transition::Paused { elapsed_millis })
            }
            (Phase::Tracking(mut session) | Phase::Paused(mut session), Command::Stop) => {
                let elapsed_millis = session.clock.stop_lap();
                let finished = FinishedSession {
                    id: session.id,
                    path: session.path,
                    elapsed_millis,
                };
                (Phase::Stopped, Transition::Stopped(finished))
            }
            (phase, _) => (phase, Transition::Ignored),
        };

        self.phase = phase;
        transition
    }

    /// Appends a converted point if the session is still tracking in the lap the fix came from.
    pub fn apply_fix(&mut self, point: GeoPoint, epoch: FixEpoch) -> bool {
        match &mut self.phase {
            Phase::Tracking(session) if session.epoch() == epoch => session.path.push_point(point),
            _ => false,
        }
    }

    pub fn tick(&mut self, now: Instant) -> Option<ClockTick> {
        match &mut self.phase {
            Phase::Tracking(session) => session.clock.tick(now),
            _ => None,
        }
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use proptest::prelude::*;

    use super::*;
    use Command::*;

    fn p(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint::new(latitude, longitude)
    }

    /// Applies a fix the way the executor does: screened against the epoch at receipt.
    fn fix(machine: &mut SessionStateMachine, point: GeoPoint) -> bool {
        match machine.epoch() {
            Some(epoch) => machine.apply_fix(point, epoch),
            None => false,
        }
    }

    #[test]
    fn pause_and_resume_open_a_new_segment() {
        let now = Instant::now();
        let mut machine = SessionStateMachine::new();

        machine.handle(StartOrResume, now);
        assert!(fix(&mut machine, p(1.0, 1.0)));
        assert!(fix(&mut machine, p(2.0, 2.0)));
        machine.handle(Pause, now);
        assert!(!fix(&mut machine, p(3.0, 3.0)));
        machine.handle(StartOrResume, now);
        assert!(fix(&mut machine, p(4.0, 4.0)));

        let path = machine.session().unwrap().path();
        assert_eq!(path, &GeoPath::from(vec![vec![p(1.0, 1.0), p(2.0, 2.0)], vec![p(4.0, 4.0)]]));
    }

    #[test]
    fn repeated_pause_resume_counts_segments() {
        let now = Instant::now();
        let mut machine = SessionStateMachine::new();
        for command in [StartOrResume, Pause, StartOrResume, Pause, StartOrResume] {
            machine.handle(command, now);
        }

        assert_eq!(machine.state(), SessionState::Tracking);
        assert_eq!(machine.session().unwrap().path().segment_count(), 3);
        assert_eq!(machine.session().unwrap().path().point_count(), 0);
    }

    #[test]
    fn invalid_commands_are_ignored() {
        let now = Instant::now();
        let mut machine = SessionStateMachine::new();

        assert_eq!(machine.handle(Pause, now), Transition::Ignored);
        assert_eq!(machine.handle(Stop, now), Transition::Ignored);
        assert_eq!(machine.state(), SessionState::Idle);

        assert!(matches!(machine.handle(StartOrResume, now), Transition::Started(_)));
        assert_eq!(machine.handle(StartOrResume, now), Transition::Ignored);
        assert_eq!(machine.session().unwrap().path().segment_count(), 1);

        machine.handle(Pause, now);
        assert_eq!(machine.handle(Pause, now), Transition::Ignored);
    }

    #[test]
    fn stop_hands_over_session_and_resets() {
        let t0 = Instant::now();
        let mut machine = SessionStateMachine::new();

        machine.handle(StartOrResume, t0);
        fix(&mut machine, p(0.0, 0.0));
        machine.tick(t0 + Duration::from_millis(1500));

        let Transition::Stopped(finished) = machine.handle(Stop, t0 + Duration::from_millis(1520)) else {
            panic!("expected a stop");
        };
        assert_eq!(finished.id, 1);
        assert_eq!(finished.elapsed_millis, 1500);
        assert_eq!(finished.path, GeoPath::from(vec![vec![p(0.0, 0.0)]]));

        assert_eq!(machine.state(), SessionState::Stopped);
        assert!(machine.session().is_none());
        assert_eq!(machine.elapsed_millis(), 0);
        assert_eq!(machine.handle(Stop, t0), Transition::Ignored);

        // The next start is a fresh session.
        let Transition::Started(epoch) = machine.handle(StartOrResume, t0) else {
            panic!("expected a start");
        };
        assert_eq!(epoch, FixEpoch { session: 2, lap: 0 });
        assert_eq!(machine.session().unwrap().path().segment_count(), 1);
    }

    #[test]
    fn stop_from_pause_finishes_session() {
        let now = Instant::now();
        let mut machine = SessionStateMachine::new();
        machine.handle(StartOrResume, now);
        machine.handle(Pause, now);
        assert!(matches!(machine.handle(Stop, now), Transition::Stopped(_)));
    }

    #[test]
    fn fixes_from_an_old_lap_are_rejected() {
        let now = Instant::now();
        let mut machine = SessionStateMachine::new();
        machine.handle(StartOrResume, now);
        let first_lap = machine.epoch().unwrap();

        machine.handle(Pause, now);
        machine.handle(StartOrResume, now);

        assert!(!machine.apply_fix(p(1.0, 1.0), first_lap));
        assert!(machine.apply_fix(p(1.0, 1.0), FixEpoch { session: 1, lap: 1 }));
    }

    #[test]
    fn clock_only_runs_while_tracking() {
        let t0 = Instant::now();
        let mut machine = SessionStateMachine::new();
        assert_eq!(machine.tick(t0), None);

        machine.handle(StartOrResume, t0);
        machine.tick(t0 + Duration::from_millis(800));
        machine.handle(Pause, t0 + Duration::from_millis(820));
        assert_eq!(machine.tick(t0 + Duration::from_millis(5000)), None);
        assert_eq!(machine.elapsed_millis(), 800);
    }

    fn command() -> impl Strategy<Value = Command> {
        prop_oneof![Just(StartOrResume), Just(Pause), Just(Stop)]
    }

    proptest! {
        #[test]
        fn one_segment_per_entry_into_tracking(commands in proptest::collection::vec(command(), 0..60)) {
            let now = Instant::now();
            let mut machine = SessionStateMachine::new();
            let mut entries = 0;

            for command in commands {
                let was_tracking = machine.state() == SessionState::Tracking;
                machine.handle(command, now);
                let is_tracking = machine.state() == SessionState::Tracking;

                if machine.state() == SessionState::Stopped {
                    entries = 0;
                }
                if !was_tracking && is_tracking {
                    entries += 1;
                }

                let segments = machine.session().map_or(0, |session| session.path().segment_count());
                prop_assert_eq!(segments, entries);
            }
        }
    }
}
