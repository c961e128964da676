use serde::{Deserialize, Serialize};

use crate::dom::{Document, Mutation, NodeId};

/// Timing and class names for the typing reveal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingConfig {
    pub chars_per_tick: usize,
    pub tick_interval_ms: u64,
    pub post_complete_delay_ms: u64,
    /// Delay between the ready signal and the start of the reveal
    pub start_delay_ms: u64,
    pub in_progress_class: String,
    pub complete_class: String,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            chars_per_tick: 1,
            tick_interval_ms: 20,
            post_complete_delay_ms: 500,
            start_delay_ms: 500,
            in_progress_class: "typing".to_string(),
            complete_class: "typing-done".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingState {
    Idle,
    Typing,
    Done,
}

/// Incremental reveal of one element's text
#[derive(Debug, Clone)]
pub struct TypingSession {
    target: NodeId,
    source: Vec<char>,
    revealed: usize,
    state: TypingState,
    config: TypingConfig,
}

impl TypingSession {
    pub fn new(target: NodeId, source_text: &str, config: TypingConfig) -> Self {
        Self {
            target,
            source: source_text.chars().collect(),
            revealed: 0,
            state: TypingState::Idle,
            config,
        }
    }

    /// Captures the target's current text and returns the session along
    /// with the mutations that blank it and mark it in progress.
    pub fn begin(doc: &Document, target: NodeId, config: TypingConfig) -> (Self, Vec<Mutation>) {
        let text = doc.text_content(target);
        let mut session = Self::new(target, &text, config);
        let mutations = session.start();
        (session, mutations)
    }

    /// Idle -> Typing. Empty text goes straight to Done.
    pub fn start(&mut self) -> Vec<Mutation> {
        if self.state != TypingState::Idle {
            return Vec::new();
        }
        self.state = if self.source.is_empty() {
            TypingState::Done
        } else {
            TypingState::Typing
        };

        vec![
            Mutation::SetText {
                node: self.target,
                text: String::new(),
            },
            Mutation::AddClass {
                node: self.target,
                class: self.config.in_progress_class.clone(),
            },
        ]
    }

    /// Reveals the next chunk. Emits nothing unless typing.
    pub fn tick(&mut self) -> Vec<Mutation> {
        if self.state != TypingState::Typing {
            return Vec::new();
        }

        let step = self.config.chars_per_tick.max(1);
        let end = (self.revealed + step).min(self.source.len());
        let chunk: String = self.source[self.revealed..end].iter().collect();
        self.revealed = end;

        if self.revealed == self.source.len() {
            self.state = TypingState::Done;
        }

        vec![Mutation::AppendText {
            node: self.target,
            text: chunk,
        }]
    }

    /// Swaps the in-progress class for the completion class
    pub fn finalize(&self) -> Vec<Mutation> {
        if self.state != TypingState::Done {
            return Vec::new();
        }
        vec![
            Mutation::AddClass {
                node: self.target,
                class: self.config.complete_class.clone(),
            },
            Mutation::RemoveClass {
                node: self.target,
                class: self.config.in_progress_class.clone(),
            },
        ]
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn state(&self) -> TypingState {
        self.state
    }

    pub fn revealed_count(&self) -> usize {
        self.revealed
    }

    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    pub fn source_text(&self) -> String {
        self.source.iter().collect()
    }

    pub fn revealed_text(&self) -> String {
        self.source[..self.revealed].iter().collect()
    }

    pub fn is_done(&self) -> bool {
        self.state == TypingState::Done
    }
}
