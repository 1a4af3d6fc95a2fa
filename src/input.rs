//! Input intents
//!
//! Host input handlers never touch the world. They translate each user action
//! into at most one `Intent` and queue it; the next tick drains the queue.

use std::collections::VecDeque;

use glam::Vec2;

use crate::sim::ruleset::{MovementModel, PrimaryAction, Ruleset};

/// Maximum queued intents between two ticks
pub const MAX_PENDING_INTENTS: usize = 32;

/// Horizontal/vertical step for keyboard steering
const NUDGE_STEP: f32 = 60.0;

/// A not-yet-applied request to affect player state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    Jump,
    LiftStart,
    LiftStop,
    /// Steer toward a playfield point
    SteerTo(Vec2),
    /// Steer relative to the current position
    Nudge(Vec2),
    CycleColor,
    Exit,
}

/// Raw host input, already converted to playfield coordinates
#[derive(Debug, Clone, PartialEq)]
pub enum InputAction {
    PointerDown { pos: Vec2 },
    PointerMove { pos: Vec2 },
    PointerUp,
    KeyDown { key: String, repeat: bool },
    KeyUp { key: String },
}

/// FIFO of intents, drained once per tick
#[derive(Debug, Clone, Default)]
pub struct IntentQueue {
    pending: VecDeque<Intent>,
}

impl IntentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an intent. Drops it if the queue is full, except `Exit`.
    pub fn push(&mut self, intent: Intent) -> bool {
        if self.pending.len() >= MAX_PENDING_INTENTS && !matches!(intent, Intent::Exit) {
            log::debug!("Intent queue full, dropping {:?}", intent);
            return false;
        }
        // Pointer moves supersede each other
        if let (Intent::SteerTo(_), Some(Intent::SteerTo(_))) = (intent, self.pending.back()) {
            self.pending.pop_back();
        }
        self.pending.push_back(intent);
        true
    }

    /// Take every pending intent in arrival order
    pub fn drain(&mut self) -> impl Iterator<Item = Intent> + '_ {
        self.pending.drain(..)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn is_primary_key(key: &str) -> bool {
    matches!(key, " " | "Enter" | "ArrowUp" | "w" | "W")
}

/// Intent the primary action starts for this ruleset
fn primary_press(rules: &Ruleset, pos: Option<Vec2>) -> Option<Intent> {
    if rules.primary == PrimaryAction::CycleColor {
        return Some(Intent::CycleColor);
    }
    match rules.movement {
        MovementModel::Jump { .. } | MovementModel::WallJump { .. } => Some(Intent::Jump),
        MovementModel::Flight { .. } => Some(Intent::LiftStart),
        MovementModel::Steer { .. } => pos.map(Intent::SteerTo),
    }
}

fn primary_release(rules: &Ruleset) -> Option<Intent> {
    match (rules.primary, rules.movement) {
        (PrimaryAction::Move, MovementModel::Flight { .. }) => Some(Intent::LiftStop),
        _ => None,
    }
}

/// Map one host input action to at most one intent
pub fn map_input(rules: &Ruleset, action: &InputAction) -> Option<Intent> {
    let steering = matches!(rules.movement, MovementModel::Steer { .. });
    match action {
        InputAction::PointerDown { pos } => primary_press(rules, Some(*pos)),
        InputAction::PointerMove { pos } if steering => Some(Intent::SteerTo(*pos)),
        InputAction::PointerMove { .. } => None,
        InputAction::PointerUp => primary_release(rules),
        // Edge-triggered: auto-repeat never produces another intent
        InputAction::KeyDown { repeat: true, .. } => None,
        InputAction::KeyDown { key, .. } => match key.as_str() {
            "Escape" => Some(Intent::Exit),
            "c" | "C" | "Shift" if rules.matching => Some(Intent::CycleColor),
            "ArrowUp" | "w" | "W" if rules.primary == PrimaryAction::CycleColor => {
                Some(Intent::Jump)
            }
            "ArrowLeft" | "a" | "A" if steering => Some(Intent::Nudge(Vec2::new(-NUDGE_STEP, 0.0))),
            "ArrowRight" | "d" | "D" if steering => Some(Intent::Nudge(Vec2::new(NUDGE_STEP, 0.0))),
            "ArrowUp" | "w" | "W" if steering => Some(Intent::Nudge(Vec2::new(0.0, -NUDGE_STEP))),
            "ArrowDown" | "s" | "S" if steering => Some(Intent::Nudge(Vec2::new(0.0, NUDGE_STEP))),
            k if is_primary_key(k) && !steering => primary_press(rules, None),
            _ => None,
        },
        InputAction::KeyUp { key } if is_primary_key(key) => primary_release(rules),
        InputAction::KeyUp { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(k: &str) -> InputAction {
        InputAction::KeyDown {
            key: k.to_string(),
            repeat: false,
        }
    }

    #[test]
    fn test_primary_maps_per_movement_model() {
        let tap = InputAction::PointerDown {
            pos: Vec2::new(10.0, 20.0),
        };
        assert_eq!(map_input(&Ruleset::runner(), &tap), Some(Intent::Jump));
        assert_eq!(map_input(&Ruleset::flyer(), &tap), Some(Intent::LiftStart));
        assert_eq!(
            map_input(&Ruleset::flyer(), &InputAction::PointerUp),
            Some(Intent::LiftStop)
        );
        assert_eq!(
            map_input(&Ruleset::catcher(), &tap),
            Some(Intent::SteerTo(Vec2::new(10.0, 20.0)))
        );
        assert_eq!(map_input(&Ruleset::color_switch(), &tap), Some(Intent::CycleColor));
    }

    #[test]
    fn test_key_repeat_is_ignored() {
        let held = InputAction::KeyDown {
            key: " ".to_string(),
            repeat: true,
        };
        assert_eq!(map_input(&Ruleset::runner(), &held), None);
        assert_eq!(map_input(&Ruleset::runner(), &key(" ")), Some(Intent::Jump));
    }

    #[test]
    fn test_keys() {
        assert_eq!(map_input(&Ruleset::runner(), &key("Escape")), Some(Intent::Exit));
        assert_eq!(map_input(&Ruleset::color_switch(), &key("ArrowUp")), Some(Intent::Jump));
        assert_eq!(map_input(&Ruleset::color_switch(), &key("c")), Some(Intent::CycleColor));
        assert_eq!(map_input(&Ruleset::runner(), &key("c")), None);
        assert_eq!(
            map_input(&Ruleset::orbit(), &key("ArrowUp")),
            Some(Intent::Nudge(Vec2::new(0.0, -NUDGE_STEP)))
        );
        assert_eq!(map_input(&Ruleset::runner(), &key("ArrowLeft")), None);
    }

    #[test]
    fn test_queue_is_fifo_and_bounded() {
        let mut queue = IntentQueue::new();
        queue.push(Intent::Jump);
        queue.push(Intent::CycleColor);
        assert_eq!(queue.drain().collect::<Vec<_>>(), vec![Intent::Jump, Intent::CycleColor]);
        assert!(queue.is_empty());

        for _ in 0..MAX_PENDING_INTENTS {
            assert!(queue.push(Intent::Jump));
        }
        assert!(!queue.push(Intent::Jump));
        assert_eq!(queue.len(), MAX_PENDING_INTENTS);
    }

    #[test]
    fn test_exit_accepted_when_full() {
        let mut queue = IntentQueue::new();
        for _ in 0..MAX_PENDING_INTENTS {
            queue.push(Intent::Jump);
        }
        assert!(queue.push(Intent::Exit));
        assert_eq!(queue.drain().last(), Some(Intent::Exit));
    }

    #[test]
    fn test_pointer_moves_coalesce() {
        let mut queue = IntentQueue::new();
        queue.push(Intent::SteerTo(Vec2::new(1.0, 0.0)));
        queue.push(Intent::SteerTo(Vec2::new(2.0, 0.0)));
        assert_eq!(queue.len(), 1);
        assert_eq!(
            queue.drain().next(),
            Some(Intent::SteerTo(Vec2::new(2.0, 0.0)))
        );
    }
}
