use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dom::{Mutation, NodeId};

/// What a new pointer-enter does to a deactivation that is still pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoverRace {
    /// Cancel the pending removal and start a fresh active window
    #[default]
    Reschedule,
    /// Every activation schedules its own removal; the oldest one clears
    /// the flag even if a newer activation is still running
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoverConfig {
    pub active_duration_ms: u64,
    pub active_class: String,
    pub race: HoverRace,
}

impl Default for HoverConfig {
    fn default() -> Self {
        Self {
            active_duration_ms: 1000,
            active_class: "bounce".to_string(),
            race: HoverRace::Reschedule,
        }
    }
}

/// A registered element and how long each pulse lasts
#[derive(Debug, Clone, PartialEq)]
pub struct HoverBinding {
    pub element: NodeId,
    pub active_for: Duration,
    class: String,
}

impl HoverBinding {
    pub fn new(element: NodeId, cfg: &HoverConfig) -> Self {
        Self {
            element,
            active_for: Duration::from_millis(cfg.active_duration_ms),
            class: cfg.active_class.clone(),
        }
    }

    pub fn activate(&self) -> Mutation {
        Mutation::AddClass {
            node: self.element,
            class: self.class.clone(),
        }
    }

    pub fn deactivate(&self) -> Mutation {
        Mutation::RemoveClass {
            node: self.element,
            class: self.class.clone(),
        }
    }
}

/// One binding per element; an empty collection binds nothing
pub fn attach(elements: &[NodeId], cfg: &HoverConfig) -> Vec<HoverBinding> {
    elements.iter().map(|el| HoverBinding::new(*el, cfg)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_empty_is_noop() {
        assert!(attach(&[], &HoverConfig::default()).is_empty());
    }

    #[test]
    fn test_binding_mutations() {
        let el = NodeId::from_raw(3);
        let bindings = attach(&[el], &HoverConfig::default());
        assert_eq!(bindings.len(), 1);

        let binding = &bindings[0];
        assert_eq!(binding.active_for, Duration::from_secs(1));
        assert_eq!(
            binding.activate(),
            Mutation::AddClass {
                node: el,
                class: "bounce".into()
            }
        );
        assert_eq!(
            binding.deactivate(),
            Mutation::RemoveClass {
                node: el,
                class: "bounce".into()
            }
        );
    }

    #[test]
    fn test_race_mode_parses_lowercase() {
        let cfg: HoverConfig = serde_json::from_str(r#"{"race":"legacy"}"#).unwrap();
        assert_eq!(cfg.race, HoverRace::Legacy);
        assert_eq!(cfg.active_duration_ms, 1000);
    }
}
