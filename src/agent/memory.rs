use serde::Serialize;
use std::collections::VecDeque;

/// What the agent remembers about one executed action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryEntry {
    pub step_number: usize,
    pub action: String,
    pub success: bool,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planner_note: Option<String>,
}

/// Fixed-capacity FIFO of recent actions; the oldest entry is evicted first
#[derive(Debug, Clone)]
pub struct AgentMemory {
    entries: VecDeque<MemoryEntry>,
    capacity: usize,
}

impl AgentMemory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: MemoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first
    pub fn entries(&self) -> impl Iterator<Item = &MemoryEntry> + '_ {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Memory as prompt text, one line per entry
    pub fn context(&self) -> String {
        self.entries
            .iter()
            .map(|entry| {
                let status = if entry.success { "ok" } else { "failed" };
                let mut line = format!("Step {} {} [{}]: {}", entry.step_number, entry.action, status, entry.summary);
                if let Some(note) = &entry.planner_note {
                    line.push_str(&format!(" (plan: {})", note));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
