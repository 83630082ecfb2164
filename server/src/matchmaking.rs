use std::collections::VecDeque;

use common::PlayerId;

use crate::timers::{TimerHandle, TimerId};

#[derive(Debug)]
pub struct WaitingEntry {
    pub player: PlayerId,
    pub timer: TimerHandle,
}

/// First come, first paired.
#[derive(Debug, Default)]
pub struct WaitingQueue {
    entries: VecDeque<WaitingEntry>,
}

impl WaitingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: WaitingEntry) {
        self.entries.push_back(entry);
    }

    pub fn pop_front(&mut self) -> Option<WaitingEntry> {
        self.entries.pop_front()
    }

    pub fn contains(&self, player: &PlayerId) -> bool {
        self.entries.iter().any(|entry| &entry.player == player)
    }

    pub fn remove(&mut self, player: &PlayerId) -> Option<WaitingEntry> {
        let index = self.entries.iter().position(|entry| &entry.player == player)?;
        self.entries.remove(index)
    }

    /// Removes the entry only if it is still guarded by `timer_id`.
    pub fn take_if_timer(&mut self, player: &PlayerId, timer_id: TimerId) -> Option<WaitingEntry> {
        let index = self
            .entries
            .iter()
            .position(|entry| &entry.player == player && entry.timer.id() == timer_id)?;
        self.entries.remove(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
