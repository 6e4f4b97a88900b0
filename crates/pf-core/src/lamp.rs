//! Lamp and coil schedules
//!
//! A schedule is a 32-bit pattern played one bit per 1/32 s, LSB first,
//! repeating. Named styles map to the patterns configured for the machine.

use serde::{Deserialize, Serialize};

/// Steps in one schedule cycle
pub const SCHEDULE_STEPS: u32 = 32;

/// Repeating on/off bit pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Schedule(pub u32);

impl Schedule {
    pub const ON: Self = Self(0xffff_ffff);
    pub const OFF: Self = Self(0);

    /// Lit state at a given step; steps wrap every cycle
    #[inline]
    pub fn is_lit_at(self, step: u64) -> bool {
        let bit = (step % SCHEDULE_STEPS as u64) as u32;
        self.0 & (1 << bit) != 0
    }

    /// Fraction of the cycle the output is on
    pub fn duty(self) -> f32 {
        self.0.count_ones() as f32 / SCHEDULE_STEPS as f32
    }
}

/// Named lamp drive style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LampStyle {
    On,
    #[default]
    Off,
    Slow,
    Medium,
    Fast,
}

impl LampStyle {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::On => "On",
            Self::Off => "Off",
            Self::Slow => "Slow",
            Self::Medium => "Medium",
            Self::Fast => "Fast",
        }
    }
}

/// Bit patterns for the blinking styles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LampStyles {
    pub slow: u32,
    pub medium: u32,
    pub fast: u32,
}

impl Default for LampStyles {
    fn default() -> Self {
        Self {
            slow: 0x00ff_00ff,
            medium: 0x0f0f_0f0f,
            fast: 0x5555_5555,
        }
    }
}

impl LampStyles {
    pub fn schedule_for(&self, style: LampStyle) -> Schedule {
        match style {
            LampStyle::On => Schedule::ON,
            LampStyle::Off => Schedule::OFF,
            LampStyle::Slow => Schedule(self.slow),
            LampStyle::Medium => Schedule(self.medium),
            LampStyle::Fast => Schedule(self.fast),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_bits() {
        let fast = Schedule(0x5555_5555);
        assert!(fast.is_lit_at(0));
        assert!(!fast.is_lit_at(1));
        assert!(fast.is_lit_at(32));
        assert!((fast.duty() - 0.5).abs() < f32::EPSILON);
        assert!(!Schedule::OFF.is_lit_at(7));
    }

    #[test]
    fn test_styles_map_to_schedules() {
        let styles = LampStyles::default();
        assert_eq!(styles.schedule_for(LampStyle::Slow), Schedule(0x00ff_00ff));
        assert_eq!(styles.schedule_for(LampStyle::On), Schedule::ON);
        assert_eq!(styles.schedule_for(LampStyle::Off), Schedule::OFF);
    }
}
