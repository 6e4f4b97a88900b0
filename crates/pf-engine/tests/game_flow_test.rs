//! Game Flow Integration Tests
//!
//! Lifecycle-driven mode changes across reset, game start, ball changes and
//! game over, plus per-player state surviving ball changes.

use std::cell::RefCell;
use std::rc::Rc;

use pf_core::{GameplaySettings, MachineConfig, PfResult, RecordingHardware};
use pf_engine::{
    Event, Flow, HandlerResult, HandlerTable, Lifecycle, Machine, Mode, ModeCx, ModeId,
    ModeSettings, events,
};

type Journal = Rc<RefCell<Vec<String>>>;

/// Logs lifecycle hooks and every engine event
struct Watcher {
    tag: &'static str,
    journal: Journal,
}

impl Mode for Watcher {
    fn handlers(&self) -> HandlerTable<Self> {
        [
            events::GAME_STARTED,
            events::PLAYER_ADDED,
            events::BALL_STARTING,
            events::BALL_ENDING,
            events::GAME_ENDED,
        ]
        .into_iter()
        .fold(HandlerTable::new(), |table, name| table.on_event(name, Self::seen))
    }

    fn mode_started(&mut self, _cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        self.log("+");
        Ok(())
    }

    fn mode_stopped(&mut self, _cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        self.log("-");
        Ok(())
    }
}

impl Watcher {
    fn log(&self, what: &str) {
        self.journal.borrow_mut().push(format!("{}{}", self.tag, what));
    }

    fn seen(&mut self, _cx: &mut ModeCx<'_, Self>, event: &Event) -> HandlerResult {
        self.log(&format!(":{}", event.key));
        Ok(Flow::Continue)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct BallsPlayed(u32);

/// Counts each player's balls in player state, ends the ball on request
struct BallCounter;

impl Mode for BallCounter {
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new().on_event("evt_drain", Self::drain)
    }

    fn mode_started(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        cx.update_player_state(|played: &mut BallsPlayed| played.0 += 1)
    }
}

impl BallCounter {
    fn drain(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.end_ball()?;
        Ok(Flow::Stop)
    }
}

fn machine(balls: u32) -> Machine {
    let config = MachineConfig {
        gameplay: GameplaySettings {
            balls_per_game: balls,
            ..GameplaySettings::default()
        },
        ..MachineConfig::default()
    };
    Machine::new(config, Box::new(RecordingHardware::new())).unwrap()
}

fn register(machine: &mut Machine, tag: &'static str, lifecycle: Lifecycle, journal: &Journal) -> ModeId {
    machine
        .register(
            ModeSettings::new(tag, 10).with_lifecycle(lifecycle),
            Watcher {
                tag,
                journal: journal.clone(),
            },
        )
        .unwrap()
}

fn drain(journal: &Journal) -> Vec<String> {
    journal.borrow_mut().drain(..).collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIFECYCLES
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_reset_brings_up_system_and_attract() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut machine = machine(3);
    let system = register(&mut machine, "S", Lifecycle::System, &log);
    let attract = register(&mut machine, "A", Lifecycle::Attract, &log);
    let game = register(&mut machine, "G", Lifecycle::Game, &log);
    let manual = register(&mut machine, "M", Lifecycle::Manual, &log);

    machine.reset();
    assert!(machine.is_active(system));
    assert!(machine.is_active(attract));
    assert!(!machine.is_active(game));
    assert!(!machine.is_active(manual));
    assert_eq!(drain(&log), vec!["S+", "A+"]);

    machine.reset();
    assert_eq!(drain(&log), vec!["A-", "S-", "S+", "A+"]);
}

#[test]
fn test_single_player_game_runs_to_game_over() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut machine = machine(2);
    register(&mut machine, "A", Lifecycle::Attract, &log);
    register(&mut machine, "G", Lifecycle::Game, &log);
    register(&mut machine, "B", Lifecycle::Ball, &log);
    machine.reset();
    drain(&log);

    machine.start_game().unwrap();
    assert_eq!(
        drain(&log),
        vec![
            "A-",
            "G+",
            "G:evt_game_started",
            "G:evt_player_added",
            "B+",
            "G:evt_ball_starting",
            "B:evt_ball_starting",
        ]
    );
    assert_eq!(machine.game().ball(), 1);
    assert!(machine.start_game().is_err());

    machine.end_ball().unwrap();
    assert_eq!(
        drain(&log),
        vec![
            "G:evt_ball_ending",
            "B:evt_ball_ending",
            "B-",
            "B+",
            "G:evt_ball_starting",
            "B:evt_ball_starting",
        ]
    );
    assert_eq!(machine.game().ball(), 2);

    machine.end_ball().unwrap();
    assert_eq!(
        drain(&log),
        vec![
            "G:evt_ball_ending",
            "B:evt_ball_ending",
            "B-",
            "G-",
            "A+",
            "A:evt_game_ended",
        ]
    );
    assert!(!machine.game().is_in_progress());
    assert!(machine.end_ball().is_err());
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLAYER STATE
// ═══════════════════════════════════════════════════════════════════════════════

fn counting_machine(balls: u32) -> (Machine, ModeId) {
    let mut machine = machine(balls);
    let counter = machine
        .register(
            ModeSettings::new("counter", 10).with_lifecycle(Lifecycle::Ball),
            BallCounter,
        )
        .unwrap();
    machine.reset();
    (machine, counter)
}

#[test]
fn test_player_state_survives_ball_changes() {
    let (mut machine, counter) = counting_machine(3);
    machine.start_game().unwrap();
    assert_eq!(machine.add_player().unwrap(), 1);

    for drained in 1..=6 {
        assert_eq!(machine.send_event("evt_drain"), Flow::Stop);
        if drained < 6 {
            assert!(machine.is_active(counter), "ball {} not started", drained + 1);
        }
    }

    assert!(!machine.game().is_in_progress());
    assert!(!machine.is_active(counter));
    for player in machine.game().players() {
        assert_eq!(player.state.get::<BallsPlayed>(), BallsPlayed(3));
    }
}

#[test]
fn test_extra_ball_replays_same_player() {
    let (mut machine, counter) = counting_machine(1);
    machine.start_game().unwrap();
    machine.game_mut().award_extra_ball().unwrap();

    machine.send_event("evt_drain");
    assert!(machine.game().is_in_progress());
    assert!(machine.is_active(counter));
    assert_eq!(machine.game().current_index(), 0);

    machine.send_event("evt_drain");
    assert!(!machine.game().is_in_progress());
    let played = machine.game().players()[0].state.get::<BallsPlayed>();
    assert_eq!(played, BallsPlayed(2));
}

#[test]
fn test_end_game_from_outside() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut machine = machine(3);
    let attract = register(&mut machine, "A", Lifecycle::Attract, &log);
    let ball = register(&mut machine, "B", Lifecycle::Ball, &log);
    machine.reset();
    machine.start_game().unwrap();
    machine.end_game().unwrap();

    assert!(machine.is_active(attract));
    assert!(!machine.is_active(ball));
    assert!(machine.end_game().is_err());
}
