//! End-of-ball bonus
//!
//! Counts up what the player collected during the ball, one item every
//! 1.5 s, then the multiplier and the total. The total is scored when it is
//! shown. A flipper press skips straight to the total, once.

use pf_core::PfResult;
use pf_dmd::Layer;
use pf_engine::{Event, Flow, HandlerResult, HandlerTable, Mode, ModeCx};
use serde::{Deserialize, Serialize};

use crate::display;
use crate::{BONUS_FINISHED, StatusBoard};

/// Seconds each item stays on the display
pub const ITEM_SECS: f64 = 1.5;

const SHOW: &str = "show_bonus";

/// Bonus items collected by the current player during the ball
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusCounters {
    pub chain_features: u32,
    pub hurry_ups: u32,
    pub blocks: u32,
    pub dark_judges: u32,
}

/// Bonus multiplier of the current player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusMultiplier {
    pub x: u32,
    /// Carried over to the next ball instead of resetting
    pub hold: bool,
}

impl Default for BonusMultiplier {
    fn default() -> Self {
        Self { x: 1, hold: false }
    }
}

/// One line of the bonus count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BonusItem {
    pub text: String,
    pub points: Option<u64>,
}

/// Items to show, ending with the total, and the total itself.
/// Items worth nothing are left out.
pub fn bonus_items(counters: &BonusCounters, multiplier: u32) -> (Vec<BonusItem>, u64) {
    let mut items: Vec<BonusItem> = [
        (counters.chain_features, "Chain Feature", 4_000),
        (counters.hurry_ups, "Hurry Up", 12_000),
        (counters.blocks, "Block", 2_000),
        (counters.dark_judges, "Dark Judge", 15_000),
    ]
    .into_iter()
    .filter(|(count, _, _)| *count > 0)
    .map(|(count, title, value)| BonusItem {
        text: format!("{} {}{}", count, title, if count > 1 { "s" } else { "" }),
        points: Some(u64::from(count) * value),
    })
    .collect();

    let mut total: u64 = items.iter().filter_map(|item| item.points).sum();
    if total > 0 && multiplier > 1 {
        items.push(BonusItem {
            text: format!("{}X", multiplier),
            points: None,
        });
        total *= u64::from(multiplier);
    }
    items.push(BonusItem {
        text: "Total".to_string(),
        points: Some(total),
    });
    (items, total)
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct BonusMode {
    items: Vec<BonusItem>,
    total: u64,
    /// Item on the display, `None` before the first one
    index: Option<usize>,
    layer: Option<Layer>,
}

impl BonusMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[BonusItem] {
        &self.items
    }

    #[inline]
    pub fn total(&self) -> u64 {
        self.total
    }

    fn show(&mut self, cx: &mut ModeCx<'_, Self>, index: usize) -> PfResult<()> {
        self.index = Some(index);
        let Some(item) = self.items.get(index) else {
            self.layer = None;
            cx.remove_self()?;
            cx.send_event(BONUS_FINISHED);
            return Ok(());
        };

        cx.outputs().play_sound("bonus");
        self.layer = Some(match item.points {
            Some(points) => display::caption_card(&item.text, &display::format_points(points)),
            None => display::caption_card(&item.text, ""),
        });
        if index + 1 == self.items.len() {
            log::info!("Bonus total {}", self.total);
            cx.score(self.total);
        }
        cx.delay(SHOW, ITEM_SECS, move |mode, cx| mode.show(cx, index + 1));
        Ok(())
    }

    fn flipper(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        let last = self.items.len().saturating_sub(1);
        if self.index.is_none_or(|index| index < last) {
            cx.cancel_delayed(SHOW);
            self.show(cx, last)?;
        }
        Ok(Flow::Continue)
    }
}

impl Mode for BonusMode {
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new()
            .on("sw_flipperLwL_active", Self::flipper)
            .on("sw_flipperLwR_active", Self::flipper)
    }

    fn mode_started(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        cx.outputs().enable_flippers(false);
        cx.outputs().fadeout_music(500);
        cx.outputs().stop_all_sounds();
        cx.outputs().play_voice("drain");
        cx.service::<StatusBoard>()?.clear();

        let counters: BonusCounters = cx.player_state();
        let multiplier: BonusMultiplier = cx.player_state();
        let (items, total) = bonus_items(&counters, multiplier.x);
        self.items = items;
        self.total = total;
        self.index = None;
        self.layer = Some(display::caption_card("Bonus", ""));
        cx.delay(SHOW, ITEM_SECS, |mode, cx| mode.show(cx, 0));
        Ok(())
    }

    fn mode_stopped(&mut self, _cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        self.layer = None;
        Ok(())
    }

    fn layer(&mut self) -> Option<&mut Layer> {
        self.layer.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bonus_shows_only_total() {
        let (items, total) = bonus_items(&BonusCounters::default(), 3);
        assert_eq!(total, 0);
        assert_eq!(
            items,
            vec![BonusItem {
                text: "Total".into(),
                points: Some(0)
            }]
        );
    }

    #[test]
    fn test_items_are_pluralised_and_multiplied() {
        let counters = BonusCounters {
            chain_features: 2,
            hurry_ups: 0,
            blocks: 1,
            dark_judges: 1,
        };
        let (items, total) = bonus_items(&counters, 2);
        let texts: Vec<&str> = items.iter().map(|item| item.text.as_str()).collect();
        assert_eq!(texts, ["2 Chain Features", "1 Block", "1 Dark Judge", "2X", "Total"]);
        assert_eq!(items[0].points, Some(8_000));
        assert_eq!(items[3].points, None);
        assert_eq!(total, (8_000 + 2_000 + 15_000) * 2);
    }

    #[test]
    fn test_multiplier_of_one_is_not_listed() {
        let counters = BonusCounters {
            hurry_ups: 1,
            ..BonusCounters::default()
        };
        let (items, total) = bonus_items(&counters, 1);
        assert_eq!(items.len(), 2);
        assert_eq!(total, 12_000);
    }
}
