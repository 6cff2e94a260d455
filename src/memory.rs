//! Bounded per-user conversation memory.
//!
//! Each user id maps to a FIFO of at most `capacity` turns. Appending past
//! capacity evicts the oldest turn. Users are independent: the map is a
//! [`DashMap`], so operations on different users never contend and
//! operations on the same user are serialized by the shard lock. No lock is
//! ever held across an `.await`.
//!
//! State is in-process only and lost on restart.

use std::collections::VecDeque;

use dashmap::DashMap;

use crate::models::Turn;

pub struct ConversationMemory {
    capacity: usize,
    turns: DashMap<String, VecDeque<Turn>>,
}

impl ConversationMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            turns: DashMap::new(),
        }
    }

    /// Append one turn, evicting the oldest if the user is at capacity.
    pub fn add_turn(&self, user_id: &str, turn: Turn) {
        self.add_turns(user_id, [turn]);
    }

    /// Append several turns as one step. Another call for the same user
    /// cannot interleave between them.
    pub fn add_turns(&self, user_id: &str, turns: impl IntoIterator<Item = Turn>) {
        let mut entry = self.turns.entry(user_id.to_string()).or_default();
        for turn in turns {
            if entry.len() == self.capacity {
                entry.pop_front();
            }
            entry.push_back(turn);
        }
    }

    /// Chronological copy of the user's turns. Unknown users get an empty
    /// history.
    pub fn get_history(&self, user_id: &str) -> Vec<Turn> {
        self.turns
            .get(user_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Forget a user's history. Unknown users are a no-op.
    pub fn clear(&self, user_id: &str) {
        self.turns.remove(user_id);
    }

    /// Number of users with stored history.
    pub fn user_count(&self) -> usize {
        self.turns.len()
    }
}
