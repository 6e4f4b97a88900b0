//! Game and player state
//!
//! Each player owns a [`PlayerState`] store keyed by Rust type: a feature
//! persists its own struct (bonus counters, challenge progress, ...) and
//! gets it back when the player's next ball starts.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use pf_core::{MAX_PLAYERS, PfError, PfResult};

// ═══════════════════════════════════════════════════════════════════════════════
// PLAYER STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Typed per-player store
#[derive(Default)]
pub struct PlayerState {
    values: HashMap<TypeId, Box<dyn Any>>,
}

impl fmt::Debug for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerState")
            .field("entries", &self.values.len())
            .finish()
    }
}

impl PlayerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored value, or `T::default()` if never set
    pub fn get<T: Clone + Default + 'static>(&self) -> T {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
            .unwrap_or_default()
    }

    pub fn set<T: 'static>(&mut self, value: T) {
        self.values.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Mutate in place, starting from `T::default()` if absent
    pub fn update<T: Default + 'static, R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        let entry = self
            .values
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()));
        if !entry.is::<T>() {
            *entry = Box::new(T::default());
        }
        match entry.downcast_mut::<T>() {
            Some(value) => f(value),
            None => f(&mut T::default()),
        }
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    pub fn remove<T: 'static>(&mut self) -> bool {
        self.values.remove(&TypeId::of::<T>()).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug)]
pub struct Player {
    pub name: String,
    pub score: u64,
    /// Extra balls earned and not yet played
    pub extra_balls: u32,
    pub extra_balls_awarded: u32,
    pub state: PlayerState,
}

impl Player {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            score: 0,
            extra_balls: 0,
            extra_balls_awarded: 0,
            state: PlayerState::new(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GAME
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of ending the current ball
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallEnd {
    /// Same player plays again
    ShootAgain,
    NextBall { player: usize, ball: u32 },
    GameOver,
}

#[derive(Debug)]
pub struct Game {
    players: Vec<Player>,
    current: usize,
    /// 1-based; 0 when no game is running
    ball: u32,
    balls_per_game: u32,
    in_progress: bool,
}

impl Game {
    pub fn new(balls_per_game: u32) -> Self {
        Self {
            players: Vec::new(),
            current: 0,
            ball: 0,
            balls_per_game: balls_per_game.max(1),
            in_progress: false,
        }
    }

    #[inline]
    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    #[inline]
    pub fn ball(&self) -> u32 {
        self.ball
    }

    #[inline]
    pub fn balls_per_game(&self) -> u32 {
        self.balls_per_game
    }

    pub fn is_last_ball(&self) -> bool {
        self.in_progress && self.ball == self.balls_per_game
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    #[inline]
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_player(&self) -> Option<&Player> {
        if self.in_progress {
            self.players.get(self.current)
        } else {
            None
        }
    }

    pub fn current_player_mut(&mut self) -> Option<&mut Player> {
        if self.in_progress {
            self.players.get_mut(self.current)
        } else {
            None
        }
    }

    pub fn current_player_or_err(&mut self) -> PfResult<&mut Player> {
        self.current_player_mut()
            .ok_or_else(|| PfError::Game("no game in progress".into()))
    }

    /// Clear players and start at ball 1
    pub fn begin(&mut self) -> PfResult<()> {
        if self.in_progress {
            return Err(PfError::Game("a game is already in progress".into()));
        }
        self.players.clear();
        self.current = 0;
        self.ball = 1;
        self.in_progress = true;
        Ok(())
    }

    /// Players may join during ball 1 only
    pub fn add_player(&mut self) -> PfResult<usize> {
        if !self.in_progress {
            return Err(PfError::Game("no game in progress".into()));
        }
        if self.ball > 1 {
            return Err(PfError::Game("players can only join on ball 1".into()));
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(PfError::Game(format!("at most {} players", MAX_PLAYERS)));
        }
        let index = self.players.len();
        self.players.push(Player::new(format!("Player {}", index + 1)));
        Ok(index)
    }

    pub fn award_extra_ball(&mut self) -> PfResult<u32> {
        let player = self.current_player_or_err()?;
        player.extra_balls += 1;
        player.extra_balls_awarded += 1;
        Ok(player.extra_balls)
    }

    /// Advance to the next ball, player or game over
    pub fn end_ball(&mut self) -> PfResult<BallEnd> {
        let player = self.current_player_or_err()?;
        if player.extra_balls > 0 {
            player.extra_balls -= 1;
            return Ok(BallEnd::ShootAgain);
        }
        self.current += 1;
        if self.current >= self.players.len() {
            self.current = 0;
            self.ball += 1;
        }
        if self.ball > self.balls_per_game {
            self.in_progress = false;
            return Ok(BallEnd::GameOver);
        }
        Ok(BallEnd::NextBall {
            player: self.current,
            ball: self.ball,
        })
    }

    pub fn end(&mut self) {
        self.in_progress = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Progress(u32);

    #[test]
    fn test_player_state_defaults_and_updates() {
        let mut state = PlayerState::new();
        assert_eq!(state.get::<Progress>(), Progress(0));
        state.set(Progress(2));
        assert_eq!(state.get::<Progress>(), Progress(2));
        let after = state.update(|p: &mut Progress| {
            p.0 += 1;
            p.0
        });
        assert_eq!(after, 3);
        assert!(state.remove::<Progress>());
        assert!(!state.contains::<Progress>());
    }

    #[test]
    fn test_two_player_rotation() {
        let mut game = Game::new(2);
        game.begin().unwrap();
        game.add_player().unwrap();
        game.add_player().unwrap();
        assert_eq!(game.end_ball().unwrap(), BallEnd::NextBall { player: 1, ball: 1 });
        assert!(game.add_player().is_ok());
        assert_eq!(game.end_ball().unwrap(), BallEnd::NextBall { player: 2, ball: 1 });
        assert_eq!(game.end_ball().unwrap(), BallEnd::NextBall { player: 0, ball: 2 });
        assert!(game.add_player().is_err());
        game.end_ball().unwrap();
        game.end_ball().unwrap();
        assert_eq!(game.end_ball().unwrap(), BallEnd::GameOver);
        assert!(!game.is_in_progress());
    }

    #[test]
    fn test_extra_ball_shoots_again() {
        let mut game = Game::new(1);
        game.begin().unwrap();
        game.add_player().unwrap();
        game.award_extra_ball().unwrap();
        assert_eq!(game.end_ball().unwrap(), BallEnd::ShootAgain);
        assert_eq!(game.end_ball().unwrap(), BallEnd::GameOver);
    }

    #[test]
    fn test_player_limit() {
        let mut game = Game::new(3);
        game.begin().unwrap();
        for _ in 0..MAX_PLAYERS {
            game.add_player().unwrap();
        }
        assert!(matches!(game.add_player(), Err(PfError::Game(_))));
        assert!(game.begin().is_err());
    }

    #[test]
    fn test_state_is_per_player() {
        let mut game = Game::new(3);
        game.begin().unwrap();
        game.add_player().unwrap();
        game.add_player().unwrap();
        game.current_player_mut().unwrap().state.set(Progress(4));
        game.end_ball().unwrap();
        assert_eq!(game.current_player().unwrap().state.get::<Progress>(), Progress(0));
        game.end_ball().unwrap();
        assert_eq!(game.current_player().unwrap().state.get::<Progress>(), Progress(4));
    }
}
