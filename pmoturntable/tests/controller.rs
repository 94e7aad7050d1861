use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pmoturntable::sim::{SimulatedArm, SimulatedTagReader};
use pmoturntable::{
    ArmSensor, BackendError, HardwareError, MediaRef, Motor, MotorState, PlaybackBackend,
    PlaybackSnapshot, TagId, TagRegistry, TonearmController, TonearmState,
};

#[derive(Clone, Debug, PartialEq)]
enum Event {
    MotorStart,
    MotorStop,
    MotorShutdown,
    Play(MediaRef),
    Pause,
    /// Context the resume continued from, `None` when nothing was paused.
    Resume(Option<MediaRef>),
}

type Log = Arc<Mutex<Vec<Event>>>;

struct RecordingMotor {
    log: Log,
    state: MotorState,
}

impl Motor for RecordingMotor {
    fn start(&mut self) {
        if self.state == MotorState::Stopped {
            self.state = MotorState::Running;
            self.log.lock().unwrap().push(Event::MotorStart);
        }
    }

    fn stop(&mut self) {
        if self.state == MotorState::Running {
            self.state = MotorState::Stopped;
            self.log.lock().unwrap().push(Event::MotorStop);
        }
    }

    fn state(&self) -> MotorState {
        self.state
    }

    fn shutdown(&mut self) {
        self.stop();
        self.log.lock().unwrap().push(Event::MotorShutdown);
    }
}

/// Backend keeping a snapshot the way the real ones do, minus the network.
struct RecordingBackend {
    log: Log,
    playing: Option<MediaRef>,
    snapshot: PlaybackSnapshot,
    fail: bool,
}

impl PlaybackBackend for RecordingBackend {
    fn play(&mut self, media: &MediaRef) -> Result<(), BackendError> {
        self.log.lock().unwrap().push(Event::Play(media.clone()));
        if self.fail {
            return Err(BackendError::Transport("unreachable".into()));
        }
        self.playing = Some(media.clone());
        Ok(())
    }

    fn pause(&mut self) -> Result<(), BackendError> {
        self.log.lock().unwrap().push(Event::Pause);
        if let Some(media) = self.playing.take() {
            self.snapshot = PlaybackSnapshot {
                context: Some(media),
                track: Some("t1".into()),
                position_ms: 53_000,
            };
        }
        if self.fail {
            return Err(BackendError::Transport("unreachable".into()));
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<(), BackendError> {
        let context = self.snapshot.context.clone();
        self.log.lock().unwrap().push(Event::Resume(context.clone()));
        if self.fail {
            return Err(BackendError::Transport("unreachable".into()));
        }
        if self.playing.is_none() {
            self.playing = context;
        }
        Ok(())
    }
}

struct Rig {
    arm: SimulatedArm,
    tags: SimulatedTagReader,
    log: Log,
    controller:
        TonearmController<SimulatedArm, SimulatedTagReader, RecordingMotor, RecordingBackend>,
}

impl Rig {
    fn new() -> Self {
        Self::with_backend_failure(false)
    }

    fn with_backend_failure(fail: bool) -> Self {
        let arm = SimulatedArm::new();
        let tags = SimulatedTagReader::new();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let registry = TagRegistry::from_entries([
            (TagId::new("A"), MediaRef::album("subsonic", "100")),
            (TagId::new("B"), MediaRef::playlist("subsonic", "42")),
        ]);
        let controller = TonearmController::new(
            arm.clone(),
            tags.clone(),
            RecordingMotor {
                log: Arc::clone(&log),
                state: MotorState::Stopped,
            },
            RecordingBackend {
                log: Arc::clone(&log),
                playing: None,
                snapshot: PlaybackSnapshot::default(),
                fail,
            },
            registry,
        );
        Self {
            arm,
            tags,
            log,
            controller,
        }
    }

    fn poll(&mut self, cycles: usize) {
        for _ in 0..cycles {
            self.controller.poll();
        }
    }

    fn take_events(&self) -> Vec<Event> {
        std::mem::take(&mut *self.log.lock().unwrap())
    }
}

fn album_100() -> MediaRef {
    MediaRef::album("subsonic", "100")
}

#[test]
fn test_starts_idle() {
    let mut rig = Rig::new();
    assert_eq!(rig.controller.state(), TonearmState::Idle);
    rig.poll(3);
    assert_eq!(rig.controller.state(), TonearmState::Idle);
    assert!(rig.take_events().is_empty());
}

#[test]
fn test_motor_called_once_per_transition() {
    let mut rig = Rig::new();

    rig.arm.lower();
    rig.poll(5);
    rig.arm.lift();
    rig.poll(5);
    rig.arm.lower();
    rig.poll(2);

    let motor_events: Vec<Event> = rig
        .take_events()
        .into_iter()
        .filter(|e| matches!(e, Event::MotorStart | Event::MotorStop))
        .collect();
    assert_eq!(
        motor_events,
        vec![Event::MotorStart, Event::MotorStop, Event::MotorStart]
    );
    assert_eq!(rig.controller.motor().state(), MotorState::Running);
}

#[test]
fn test_arm_down_resumes_before_any_play() {
    let mut rig = Rig::new();
    rig.tags.present(TagId::new("A"));

    rig.arm.lower();
    rig.poll(1);
    assert_eq!(
        rig.take_events(),
        vec![Event::MotorStart, Event::Resume(None)],
        "the arm-down cycle itself never plays"
    );

    rig.poll(1);
    assert_eq!(rig.take_events(), vec![Event::Play(album_100())]);
}

#[test]
fn test_same_tag_plays_once() {
    let mut rig = Rig::new();
    rig.arm.lower();
    rig.poll(1);
    rig.take_events();

    rig.tags.present(TagId::new("A"));
    rig.poll(10);
    assert_eq!(rig.take_events(), vec![Event::Play(album_100())]);
    assert_eq!(rig.controller.last_seen_tag(), Some(&TagId::new("A")));
}

#[test]
fn test_tag_change_plays_new_media() {
    let mut rig = Rig::new();
    rig.arm.lower();
    rig.tags.present(TagId::new("A"));
    rig.poll(2);
    rig.take_events();

    rig.tags.present(TagId::new("B"));
    rig.poll(2);
    assert_eq!(
        rig.take_events(),
        vec![Event::Play(MediaRef::playlist("subsonic", "42"))]
    );
}

#[test]
fn test_unknown_tag_is_not_looked_up_again() {
    let mut rig = Rig::new();
    rig.arm.lower();
    rig.poll(1);
    rig.take_events();

    rig.tags.present(TagId::new("unregistered-id"));
    rig.poll(5);

    assert!(rig.take_events().is_empty());
    assert_eq!(
        rig.controller.last_seen_tag(),
        Some(&TagId::new("unregistered-id"))
    );
}

#[test]
fn test_tag_removal_does_not_pause() {
    let mut rig = Rig::new();
    rig.arm.lower();
    rig.tags.present(TagId::new("A"));
    rig.poll(2);
    rig.take_events();

    rig.tags.remove();
    rig.poll(5);
    assert!(rig.take_events().is_empty());
    assert_eq!(rig.controller.state(), TonearmState::Spinning);

    // Same record back on: still the same tag, nothing to do
    rig.tags.present(TagId::new("A"));
    rig.poll(2);
    assert!(rig.take_events().is_empty());
}

#[test]
fn test_tags_ignored_while_idle() {
    let mut rig = Rig::new();
    rig.tags.present(TagId::new("A"));
    rig.poll(5);
    assert!(rig.take_events().is_empty());
    assert_eq!(rig.controller.last_seen_tag(), None);
}

#[test]
fn test_album_session_end_to_end() {
    let mut rig = Rig::new();

    // Arm down on an empty platter: motor on, resume has nothing to continue
    rig.arm.lower();
    rig.poll(1);
    assert_eq!(
        rig.take_events(),
        vec![Event::MotorStart, Event::Resume(None)]
    );

    // Record placed: cold start of the album
    rig.tags.present(TagId::new("A"));
    rig.poll(1);
    assert_eq!(rig.take_events(), vec![Event::Play(album_100())]);

    // Arm lifted: motor off, then the position is captured by pause
    rig.arm.lift();
    rig.poll(1);
    assert_eq!(rig.take_events(), vec![Event::MotorStop, Event::Pause]);
    assert_eq!(rig.controller.last_seen_tag(), None);

    // Arm down again, record unchanged: resume continues the album
    rig.arm.lower();
    rig.poll(1);
    assert_eq!(
        rig.take_events(),
        vec![Event::MotorStart, Event::Resume(Some(album_100()))]
    );
}

#[test]
fn test_relowering_with_same_tag_plays_again() {
    let mut rig = Rig::new();
    rig.arm.lower();
    rig.tags.present(TagId::new("A"));
    rig.poll(2);
    rig.arm.lift();
    rig.poll(1);
    rig.take_events();

    rig.arm.lower();
    rig.poll(2);
    assert_eq!(
        rig.take_events(),
        vec![
            Event::MotorStart,
            Event::Resume(Some(album_100())),
            Event::Play(album_100()),
        ]
    );
}

#[test]
fn test_backend_errors_do_not_roll_back_motor() {
    let mut rig = Rig::with_backend_failure(true);
    rig.arm.lower();
    rig.tags.present(TagId::new("A"));
    rig.poll(3);
    assert_eq!(rig.controller.state(), TonearmState::Spinning);
    assert_eq!(rig.controller.motor().state(), MotorState::Running);
    assert_eq!(
        rig.take_events(),
        vec![Event::MotorStart, Event::Resume(None), Event::Play(album_100())]
    );

    rig.arm.lift();
    rig.poll(1);
    assert_eq!(rig.controller.state(), TonearmState::Idle);
    assert_eq!(rig.controller.motor().state(), MotorState::Stopped);
}

struct FlakySensor {
    readings: Vec<Result<bool, HardwareError>>,
}

impl ArmSensor for FlakySensor {
    fn is_arm_down(&mut self) -> Result<bool, HardwareError> {
        if self.readings.is_empty() {
            Ok(true)
        } else {
            self.readings.remove(0)
        }
    }
}

#[test]
fn test_sensor_error_skips_cycle() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let tags = SimulatedTagReader::new();
    tags.present(TagId::new("A"));
    let mut controller = TonearmController::new(
        FlakySensor {
            readings: vec![
                Ok(true),
                Err(HardwareError::Sensor("glitch".into())),
                Ok(true),
            ],
        },
        tags,
        RecordingMotor {
            log: Arc::clone(&log),
            state: MotorState::Stopped,
        },
        RecordingBackend {
            log: Arc::clone(&log),
            playing: None,
            snapshot: PlaybackSnapshot::default(),
            fail: false,
        },
        TagRegistry::from_entries([(TagId::new("A"), album_100())]),
    );

    controller.poll();
    controller.poll();
    assert_eq!(controller.state(), TonearmState::Spinning);
    assert_eq!(
        *log.lock().unwrap(),
        vec![Event::MotorStart, Event::Resume(None)],
        "no tag scan during the failed cycle"
    );

    controller.poll();
    assert_eq!(log.lock().unwrap().last(), Some(&Event::Play(album_100())));
}

#[test]
fn test_run_until_shutdown_flag() {
    let rig = Rig::new();
    let Rig {
        arm,
        tags,
        log,
        mut controller,
    } = rig;
    arm.lower();
    tags.present(TagId::new("A"));

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    let handle = thread::spawn(move || {
        controller.run(Duration::from_millis(5), &flag);
        controller
    });

    thread::sleep(Duration::from_millis(100));
    shutdown.store(true, Ordering::Release);
    let controller = handle.join().unwrap();

    assert_eq!(controller.state(), TonearmState::Idle);
    assert_eq!(controller.last_seen_tag(), None);
    assert_eq!(controller.motor().state(), MotorState::Stopped);

    let events = log.lock().unwrap().clone();
    assert_eq!(events.first(), Some(&Event::MotorStart));
    assert!(events.contains(&Event::Play(album_100())));
    assert_eq!(
        &events[events.len() - 2..],
        &[Event::MotorStop, Event::MotorShutdown]
    );
    assert!(!events.contains(&Event::Pause), "shutdown leaves playback alone");
}
