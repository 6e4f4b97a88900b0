//! Rules Integration Tests
//!
//! Whole games on the Judge Dredd playfield, driven only through switch
//! events and ticks: regular balls from plunge to bonus, ball save, skill
//! shot, extra balls, ball search and the supergame Ultimate Challenge.

use pf_core::{LampCommand, RecordingHardware, SwitchState, Timestamp};
use pf_engine::Machine;
use pf_rules::challenge::{Celebration, Death, Fear, FearState, Fire, Mortis, Ramp};
use pf_rules::playfield::{coil, lamp, sw};
use pf_rules::{
    AttractMode, BallSaver, BallSearchMode, BonusCounters, BonusMode, BonusMultiplier,
    ChallengeProgress, ExtraBallState, GameOptions, LIGHT_EXTRA_BALL, RuleSet, SkillShotMode,
    Stage, Supergame, Trough, UltimateChallenge, machine_config,
};

const TICK_MS: u64 = 10;

/// A machine with the rules installed, plus a simulated clock
struct Rig {
    machine: Machine,
    hw: RecordingHardware,
    rules: RuleSet,
    now: u64,
}

impl Rig {
    fn new() -> Self {
        let hw = RecordingHardware::new();
        let mut machine = Machine::new(machine_config(), Box::new(hw.clone())).unwrap();
        let rules = pf_rules::install(&mut machine).unwrap();
        machine.reset();
        let mut rig = Self {
            machine,
            hw,
            rules,
            now: 1_000,
        };
        rig.run_for(TICK_MS);
        rig
    }

    fn at(&self) -> Timestamp {
        Timestamp(self.now)
    }

    fn run_for(&mut self, ms: u64) {
        let end = self.now + ms;
        while self.now < end {
            self.now = (self.now + TICK_MS).min(end);
            self.machine.tick(Timestamp(self.now));
        }
    }

    fn set(&mut self, switch: &str, state: SwitchState) {
        self.machine
            .on_switch_event(switch, state, Timestamp(self.now))
            .unwrap();
    }

    fn hold(&mut self, switch: &str, ms: u64) {
        self.set(switch, SwitchState::Active);
        self.run_for(ms);
        self.set(switch, SwitchState::Inactive);
        self.run_for(20);
    }

    fn hit(&mut self, switch: &str) {
        self.hold(switch, 20);
    }

    fn drain(&mut self) {
        self.hit(sw::OUTHOLE);
    }

    /// Ball into the shooter lane, fire button, ball gone for a second.
    /// The ball-save countdown starts 1.1 s before this returns.
    fn plunge(&mut self) {
        self.run_for(50);
        self.set(sw::SHOOTER_R, SwitchState::Active);
        self.run_for(200);
        self.hit(sw::FIRE_R);
        self.set(sw::SHOOTER_R, SwitchState::Inactive);
        self.run_for(1_100);
    }

    /// Plunge and wait out the start-of-ball save
    fn plunge_unsaved(&mut self) {
        self.plunge();
        self.run_for(7_000);
    }

    fn active(&self, id: pf_engine::ModeId) -> bool {
        self.machine.is_active(id)
    }

    fn player(&self) -> &pf_engine::Player {
        self.machine.game().current_player().unwrap()
    }

    fn score(&self) -> u64 {
        self.player().score
    }

    fn state<T: Clone + Default + 'static>(&self) -> T {
        self.player().state.get::<T>()
    }

    fn set_state<T: 'static>(&mut self, value: T) {
        self.machine
            .game_mut()
            .current_player_mut()
            .unwrap()
            .state
            .set(value);
    }

    fn trough(&self) -> &Trough {
        self.machine.service::<Trough>().unwrap()
    }

    fn challenge(&self) -> &UltimateChallenge {
        self.machine
            .mode::<UltimateChallenge>(self.rules.challenge)
            .unwrap()
    }

    /// Supergame straight into `stage`, intro skipped, balls out
    fn jump_to(&mut self, stage: Stage) {
        self.hit(sw::SUPER_GAME);
        self.machine.remove_mode(self.rules.challenge).unwrap();
        self.set_state(ChallengeProgress { stage });
        self.machine.add_mode(self.rules.challenge).unwrap();
        self.hit(sw::FLIPPER_R);
        assert!(self.active(self.rules.stage(stage)));
        self.run_for(2_500);
    }

    /// Run with a sling hit every 5 s so ball search stays quiet
    fn play_for(&mut self, ms: u64) {
        let end = self.now + ms;
        while self.now + 5_000 < end {
            self.run_for(5_000);
            self.hit(sw::SLING_L);
        }
        let rest = end.saturating_sub(self.now);
        self.run_for(rest);
    }

    fn lamp(&self, name: &str) -> Option<LampCommand> {
        self.machine.outputs().lamp_state(name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATTRACT & GAME START
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_reset_runs_attract() {
    let rig = Rig::new();
    assert!(rig.active(rig.rules.attract));
    assert!(rig.active(rig.rules.trough));
    assert!(rig.active(rig.rules.ball_save));
    assert!(rig.active(rig.rules.stall_search));
    assert!(!rig.active(rig.rules.base_play));

    let attract = rig.machine.mode::<AttractMode>(rig.rules.attract).unwrap();
    assert!(attract.lamp_show().is_some());
    assert!(matches!(
        rig.lamp(lamp::START_BUTTON),
        Some(LampCommand::Schedule { .. })
    ));
    assert_eq!(rig.lamp(lamp::GI[0]), Some(LampCommand::On));
}

#[test]
fn test_start_button_starts_regular_game() {
    let mut rig = Rig::new();
    rig.hit(sw::START_BUTTON);

    assert!(rig.machine.game().is_in_progress());
    assert_eq!(rig.machine.game().ball(), 1);
    assert_eq!(rig.machine.game().players().len(), 1);
    assert!(!rig.machine.service::<GameOptions>().unwrap().supergame);
    assert!(!rig.active(rig.rules.attract));
    assert!(rig.active(rig.rules.base_play));
    assert!(rig.active(rig.rules.ball_search));
    assert!(!rig.active(rig.rules.challenge));
    assert_eq!(rig.hw.flippers_enabled(), Some(true));

    // First ball leaves the trough on the next tick
    assert_eq!(rig.hw.pulse_count(coil::TROUGH), 1);
    assert_eq!(rig.trough().balls_in_play(), 1);

    // Start again during ball 1 adds a player
    rig.hit(sw::START_BUTTON);
    assert_eq!(rig.machine.game().players().len(), 2);
}

#[test]
fn test_game_over_returns_to_attract() {
    let mut rig = Rig::new();
    rig.hit(sw::START_BUTTON);
    for ball in 1..=3 {
        assert_eq!(rig.machine.game().ball(), ball);
        rig.plunge_unsaved();
        rig.drain();
        rig.run_for(3_200);
    }

    assert!(!rig.machine.game().is_in_progress());
    assert!(rig.active(rig.rules.attract));
    assert!(!rig.active(rig.rules.base_play));
    assert!(!rig.active(rig.rules.ball_search));
    assert_eq!(rig.hw.flippers_enabled(), Some(false));
}

// ═══════════════════════════════════════════════════════════════════════════════
// BALL SAVE & BONUS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_ball_save_relaunches_early_drain() {
    let mut rig = Rig::new();
    rig.hit(sw::START_BUTTON);
    rig.plunge();
    {
        let now = rig.at();
        let saver = rig.machine.service::<BallSaver>().unwrap();
        assert!(saver.is_active(now));
        // 5 s save plus 2 s grace, counted from the plunge
        let remaining = saver.remaining_ms(now).unwrap() as f64 / 1000.0;
        approx::assert_abs_diff_eq!(remaining, 5.9, epsilon = 1e-9);
    }

    rig.run_for(3_000);
    assert_eq!(rig.lamp(lamp::DRAIN_SHIELD), Some(LampCommand::On));

    // Grace period: lamp dark, save still honoured
    rig.run_for(1_500);
    assert_eq!(rig.lamp(lamp::DRAIN_SHIELD), Some(LampCommand::Off));
    rig.drain();
    assert_eq!(rig.machine.game().ball(), 1);
    assert!(rig.hw.sounds().contains(&"ball saved".to_string()));
    assert_eq!(rig.trough().balls_requested(), 1);
    assert!(!rig.active(rig.rules.bonus));
    assert!(!rig.active(rig.rules.skill_shot));

    // One save per ball
    rig.run_for(1_100);
    rig.drain();
    assert!(rig.active(rig.rules.bonus));
    assert_eq!(rig.hw.flippers_enabled(), Some(false));
}

#[test]
fn test_drain_counts_bonus_then_next_ball() {
    let mut rig = Rig::new();
    rig.hit(sw::START_BUTTON);
    rig.plunge_unsaved();
    rig.drain();
    assert!(rig.active(rig.rules.bonus));
    assert!(!rig.active(rig.rules.ball_search));

    rig.run_for(3_200);
    assert!(!rig.active(rig.rules.bonus));
    assert_eq!(rig.machine.game().ball(), 2);
    assert!(rig.active(rig.rules.base_play));
    assert!(rig.active(rig.rules.ball_search));
    assert_eq!(rig.hw.flippers_enabled(), Some(true));
    assert_eq!(rig.trough().balls_requested(), 1);
}

#[test]
fn test_flipper_skips_bonus_to_total() {
    let mut rig = Rig::new();
    rig.hit(sw::START_BUTTON);
    rig.plunge_unsaved();
    rig.set_state(BonusCounters {
        chain_features: 1,
        blocks: 2,
        ..BonusCounters::default()
    });
    rig.set_state(BonusMultiplier { x: 2, hold: false });

    let before = rig.score();
    rig.drain();
    rig.run_for(200);
    assert_eq!(rig.score(), before);

    rig.hit(sw::FLIPPER_L);
    assert_eq!(rig.score(), before + 16_000);
    {
        let bonus = rig.machine.mode::<BonusMode>(rig.rules.bonus).unwrap();
        let texts: Vec<&str> = bonus.items().iter().map(|item| item.text.as_str()).collect();
        assert_eq!(texts, ["1 Chain Feature", "2 Blocks", "2X", "Total"]);
        assert_eq!(bonus.total(), 16_000);
    }

    // Only one skip, and the total is not scored twice
    rig.hit(sw::FLIPPER_R);
    assert_eq!(rig.score(), before + 16_000);
    rig.run_for(1_600);
    assert_eq!(rig.machine.game().ball(), 2);
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLAYFIELD AWARDS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_skill_shot_scores_each_loop() {
    let mut rig = Rig::new();
    rig.hit(sw::START_BUTTON);
    rig.plunge();
    assert!(rig.active(rig.rules.skill_shot));

    let before = rig.score();
    rig.hit(sw::TOP_RIGHT_OPTO);
    rig.hit(sw::LEFT_ROLLOVER);
    assert_eq!(rig.score(), before + 5_000);
    rig.hit(sw::TOP_RIGHT_OPTO);
    rig.hit(sw::LEFT_ROLLOVER);
    assert_eq!(rig.score(), before + 15_000);
    let shot = rig
        .machine
        .mode::<SkillShotMode>(rig.rules.skill_shot)
        .unwrap();
    assert_eq!(shot.shots_hit(), 2);

    // Rollover alone is not a loop
    rig.run_for(1_100);
    rig.hit(sw::LEFT_ROLLOVER);
    assert_eq!(rig.score(), before + 15_000);

    rig.run_for(3_000);
    assert!(!rig.active(rig.rules.skill_shot));
}

#[test]
fn test_extra_ball_shoots_again() {
    let mut rig = Rig::new();
    rig.hit(sw::START_BUTTON);
    rig.plunge();

    rig.machine.send_event(LIGHT_EXTRA_BALL);
    assert_eq!(rig.state::<ExtraBallState>().lit, 1);
    assert!(matches!(
        rig.lamp(lamp::EXTRA_BALL),
        Some(LampCommand::Schedule { .. })
    ));

    rig.hit(sw::LEFT_SCORE_POST);
    assert_eq!(rig.state::<ExtraBallState>(), ExtraBallState { lit: 0, total: 1 });
    assert_eq!(rig.player().extra_balls, 1);
    assert_eq!(rig.lamp(lamp::JUDGE_AGAIN), Some(LampCommand::On));

    // At most two lit at once
    for _ in 0..3 {
        rig.machine.send_event(LIGHT_EXTRA_BALL);
    }
    assert_eq!(rig.state::<ExtraBallState>().lit, 2);

    rig.run_for(7_000);
    rig.drain();
    rig.run_for(3_200);
    assert_eq!(rig.machine.game().ball(), 1);
    assert_eq!(rig.player().extra_balls, 0);
    assert!(rig.active(rig.rules.base_play));
    assert_eq!(rig.lamp(lamp::JUDGE_AGAIN), Some(LampCommand::Off));
}

#[test]
fn test_left_shooter_kicks_held_ball() {
    let mut rig = Rig::new();
    rig.hit(sw::START_BUTTON);
    rig.plunge();
    rig.hold(sw::SHOOTER_L, 550);
    assert_eq!(rig.hw.pulse_count(coil::SHOOTER_L), 1);
}

// ═══════════════════════════════════════════════════════════════════════════════
// BALL SEARCH
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_ball_search_pulses_until_activity() {
    let mut rig = Rig::new();
    rig.hit(sw::START_BUTTON);
    rig.plunge();

    // 20 s of silence since the ball left the shooter lane
    rig.run_for(18_800);
    assert_eq!(rig.hw.pulse_count(coil::POPPER_L), 0);
    rig.run_for(600);
    for name in coil::SEARCH {
        assert_eq!(rig.hw.pulse_count(name), 1, "{}", name);
    }
    let round = |rig: &Rig| {
        rig.machine
            .mode::<BallSearchMode>(rig.rules.ball_search)
            .unwrap()
            .round()
    };
    assert_eq!(round(&rig), 1);

    rig.hit(sw::SLING_L);
    assert_eq!(round(&rig), 0);
    rig.run_for(19_000);
    assert_eq!(rig.hw.pulse_count(coil::POPPER_L), 1);
}

// ═══════════════════════════════════════════════════════════════════════════════
// ULTIMATE CHALLENGE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_supergame_clears_fire_then_introduces_mortis() {
    let mut rig = Rig::new();
    rig.hit(sw::SUPER_GAME);
    assert!(rig.machine.service::<GameOptions>().unwrap().supergame);
    assert!(rig.active(rig.rules.challenge));
    assert!(rig.active(rig.rules.intro));
    assert!(!rig.active(rig.rules.skill_shot));
    assert_eq!(rig.challenge().stage(), Stage::Fire);
    assert_eq!(rig.hw.flippers_enabled(), Some(false));

    // A flipper cuts the intro short
    rig.hit(sw::FLIPPER_L);
    assert!(!rig.active(rig.rules.intro));
    assert!(rig.active(rig.rules.fire));
    assert_eq!(rig.hw.flippers_enabled(), Some(true));
    rig.run_for(5_000);
    assert_eq!(rig.trough().balls_in_play(), 4);

    rig.hit(sw::RIGHT_RAMP_EXIT);
    rig.hold(sw::POPPER_R, 350);
    rig.hit(sw::LEFT_ROLLOVER);
    rig.hit(sw::TOP_RIGHT_OPTO);
    rig.hit(sw::LEFT_ROLLOVER);
    assert_eq!(rig.machine.mode::<Fire>(rig.rules.fire).unwrap().targets_lit(), 1);

    // Inner loop: center rollover into the opto
    rig.run_for(1_100);
    rig.hit(sw::TOP_CENTER_ROLLOVER);
    rig.hit(sw::TOP_RIGHT_OPTO);
    assert_eq!(rig.machine.mode::<Fire>(rig.rules.fire).unwrap().targets_lit(), 0);
    assert!(rig.challenge().is_level_complete());
    assert_eq!(rig.hw.flippers_enabled(), Some(false));
    assert_eq!(rig.state::<BonusCounters>().dark_judges, 1);

    // The stage ends once every ball has drained
    for _ in 0..3 {
        rig.drain();
        assert!(rig.active(rig.rules.fire));
    }
    rig.drain();
    assert!(!rig.active(rig.rules.fire));
    assert!(rig.active(rig.rules.intro));
    assert_eq!(rig.challenge().stage(), Stage::Mortis);
    assert_eq!(rig.state::<ChallengeProgress>().stage, Stage::Mortis);
    assert_eq!(rig.machine.game().ball(), 1);
    assert!(!rig.active(rig.rules.bonus));
}

#[test]
fn test_celebration_returns_to_regular_play() {
    let mut rig = Rig::new();
    rig.hit(sw::SUPER_GAME);

    // Jump the player ahead to the last stage
    rig.machine.remove_mode(rig.rules.challenge).unwrap();
    rig.set_state(ChallengeProgress {
        stage: Stage::Celebration,
    });
    rig.machine.add_mode(rig.rules.challenge).unwrap();
    assert!(rig.active(rig.rules.intro));

    rig.hit(sw::FLIPPER_R);
    assert!(rig.active(rig.rules.celebration));
    assert!(rig.challenge().is_level_complete());
    assert_eq!(rig.state::<Supergame>(), Supergame(Some(false)));
    assert!(rig.machine.mode::<Celebration>(rig.rules.celebration).is_some());

    rig.run_for(7_000);
    assert_eq!(rig.trough().balls_in_play(), 7);

    // Start the held save and let it run out
    rig.hit(sw::SHOOTER_R);
    rig.run_for(22_100);
    let now = rig.at();
    assert!(!rig.machine.service::<BallSaver>().unwrap().is_active(now));

    let before = rig.score();
    rig.hit(sw::MYSTERY);
    assert_eq!(rig.score(), before + 5_000);

    for _ in 0..5 {
        rig.drain();
        assert!(rig.active(rig.rules.celebration));
    }
    rig.drain();
    assert!(!rig.active(rig.rules.celebration));
    assert!(!rig.active(rig.rules.challenge));
    assert!(!rig.active(rig.rules.bonus));
    assert_eq!(rig.machine.game().ball(), 1);
    assert_eq!(rig.trough().balls_in_play(), 1);
    assert_eq!(rig.hw.flippers_enabled(), Some(true));
    assert_eq!(rig.state::<ChallengeProgress>().stage, Stage::Fire);
}

#[test]
fn test_mortis_needs_every_shot_twice() {
    let mut rig = Rig::new();
    rig.jump_to(Stage::Mortis);
    assert_eq!(rig.trough().balls_requested(), 3);
    let mortis = |rig: &Rig| rig.machine.mode::<Mortis>(rig.rules.mortis).unwrap().shots_required();
    assert_eq!(mortis(&rig), [2; 5]);

    for round in 0..2 {
        rig.hit(sw::MYSTERY);
        rig.hit(sw::LEFT_ROLLOVER);
        rig.hit(sw::TOP_RIGHT_OPTO);
        rig.hold(sw::POPPER_R, 350);
        rig.hit(sw::RIGHT_RAMP_EXIT);
        if round == 0 {
            assert_eq!(mortis(&rig), [1, 1, 1, 1, 2]);
            assert!(!rig.challenge().is_level_complete());
        }
        rig.hit(sw::CAPTIVE_BALL_3);
    }
    assert_eq!(mortis(&rig), [0; 5]);
    assert!(rig.challenge().is_level_complete());
    assert_eq!(rig.hw.flippers_enabled(), Some(false));
    assert_eq!(rig.state::<BonusCounters>().dark_judges, 1);

    for _ in 0..2 {
        rig.drain();
        assert!(rig.active(rig.rules.mortis));
    }
    rig.drain();
    assert!(!rig.active(rig.rules.mortis));
    assert!(rig.active(rig.rules.intro));
    assert_eq!(rig.challenge().stage(), Stage::Fear);
    assert_eq!(rig.state::<ChallengeProgress>().stage, Stage::Fear);
    assert_eq!(rig.machine.game().ball(), 1);
}

#[test]
fn test_fear_ramps_then_subway_advances_to_death() {
    let mut rig = Rig::new();
    rig.jump_to(Stage::Fear);
    assert_eq!(rig.trough().balls_requested(), 2);
    let fear = |rig: &Rig| {
        let fear = rig.machine.mode::<Fear>(rig.rules.fear).unwrap();
        (fear.state(), fear.active_ramp())
    };
    assert_eq!(fear(&rig), (FearState::Ramps, Ramp::Left));

    // Only the lit ramp counts
    rig.hit(sw::RIGHT_RAMP_EXIT);
    assert_eq!(fear(&rig), (FearState::Ramps, Ramp::Left));
    for ramp in [sw::LEFT_RAMP_EXIT, sw::RIGHT_RAMP_EXIT, sw::LEFT_RAMP_EXIT] {
        rig.hit(ramp);
    }
    assert_eq!(fear(&rig), (FearState::Ramps, Ramp::Right));
    rig.hit(sw::RIGHT_RAMP_EXIT);
    assert_eq!(fear(&rig).0, FearState::Subway);

    rig.hit(sw::SUBWAY_ENTER_1);
    assert_eq!(fear(&rig).0, FearState::Finished);
    assert!(rig.challenge().is_level_complete());
    assert_eq!(rig.state::<BonusCounters>().dark_judges, 1);

    rig.drain();
    assert!(rig.active(rig.rules.fear));
    rig.drain();
    assert!(!rig.active(rig.rules.fear));
    assert!(rig.active(rig.rules.intro));
    assert_eq!(rig.challenge().stage(), Stage::Death);
    assert_eq!(rig.state::<ChallengeProgress>().stage, Stage::Death);
}

#[test]
fn test_fear_timeout_loses_the_ball_and_keeps_the_stage() {
    let mut rig = Rig::new();
    rig.jump_to(Stage::Fear);
    // Plunge releases the held save; it is long gone when the clock runs out
    rig.hit(sw::SHOOTER_R);
    rig.hit(sw::LEFT_RAMP_EXIT);

    rig.play_for(15_000);
    {
        let fear = rig.machine.mode::<Fear>(rig.rules.fear).unwrap();
        assert_eq!(fear.state(), FearState::Ramps);
        assert!(fear.timer() > 0);
    }
    rig.play_for(7_000);
    {
        let fear = rig.machine.mode::<Fear>(rig.rules.fear).unwrap();
        assert_eq!(fear.state(), FearState::Finished);
        assert_eq!(fear.timer(), 0);
    }
    assert!(!rig.challenge().is_level_complete());
    assert_eq!(rig.hw.flippers_enabled(), Some(false));
    assert_eq!(rig.state::<BonusCounters>().dark_judges, 0);

    rig.drain();
    rig.drain();
    rig.run_for(5_000);
    assert_eq!(rig.machine.game().ball(), 2);
    assert_eq!(rig.state::<ChallengeProgress>().stage, Stage::Fear);
}

#[test]
fn test_death_relights_shots_then_times_out() {
    let mut rig = Rig::new();
    rig.jump_to(Stage::Death);
    let death = |rig: &Rig| {
        let death = rig.machine.mode::<Death>(rig.rules.death).unwrap();
        (death.active_shots(), death.total_timer())
    };
    assert_eq!(death(&rig).0, [true; 5]);

    // Each hit adds 10 s to the shot timer
    rig.hit(sw::RIGHT_RAMP_EXIT);
    rig.hold(sw::POPPER_R, 350);
    assert_eq!(death(&rig).0, [true, true, false, true, false]);
    assert_eq!(rig.machine.mode::<Death>(rig.rules.death).unwrap().timer(), 28);

    // Dry shot timer: the right ramp comes back first, then the popper
    rig.play_for(33_000);
    assert_eq!(death(&rig).0, [true, true, false, true, true]);
    rig.play_for(10_000);
    let (shots, total) = death(&rig);
    assert_eq!(shots, [true; 5]);
    assert!(total > 0 && total < 180);

    rig.play_for(170_000);
    let (shots, total) = death(&rig);
    assert_eq!(total, 0);
    assert_eq!(shots, [false; 5]);
    assert!(!rig.challenge().is_level_complete());
    assert_eq!(rig.hw.flippers_enabled(), Some(false));
}
