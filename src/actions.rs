use bevy::prelude::*;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerAction {
    MoveForward,
    MoveBackward,
    MoveLeft,
    MoveRight,
    Sprint,
    Rebuild,
}

/// Frame snapshot of bound actions. `just_pressed` holds only on the first frame.
#[derive(Default, Resource)]
pub struct ActionState {
    held: HashSet<PlayerAction>,
    fresh: HashSet<PlayerAction>,
}

impl ActionState {
    pub fn set(&mut self, action: PlayerAction, held: bool, fresh: bool) {
        toggle(&mut self.held, action, held);
        toggle(&mut self.fresh, action, fresh);
    }

    pub fn pressed(&self, action: PlayerAction) -> bool { self.held.contains(&action) }

    pub fn just_pressed(&self, action: PlayerAction) -> bool { self.fresh.contains(&action) }
}

fn toggle(set: &mut HashSet<PlayerAction>, action: PlayerAction, on: bool) {
    if on {
        set.insert(action);
    } else {
        set.remove(&action);
    }
}
