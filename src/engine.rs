//! Wires the three effects to a document and a scheduler.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;

use crate::config::Config;
use crate::dom::{Document, NodeId};
use crate::error::{FxError, Result};
use crate::floating::plan_field;
use crate::hover::{self, HoverBinding, HoverRace};
use crate::scheduler::{Scheduler, TimerId};
use crate::typing::{TypingSession, TypingState};

/// Timer payloads the engine dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Resolve the bio selector and begin typing it
    StartReveal,
    TypingTick(NodeId),
    FinalizeReveal(NodeId),
    HoverRelease(NodeId),
}

#[derive(Debug)]
struct Reveal {
    session: TypingSession,
    interval: Option<TimerId>,
}

#[derive(Debug)]
pub struct Engine<R: Rng> {
    document: Document,
    scheduler: Scheduler<Task>,
    rng: R,
    config: Config,
    reveals: HashMap<NodeId, Reveal>,
    hover: HashMap<NodeId, HoverBinding>,
    hover_pending: HashMap<NodeId, TimerId>,
    ready: bool,
    torn_down: bool,
}

impl<R: Rng> Engine<R> {
    pub fn new(document: Document, config: Config, rng: R) -> Self {
        Self {
            document,
            scheduler: Scheduler::new(),
            rng,
            config,
            reveals: HashMap::new(),
            hover: HashMap::new(),
            hover_pending: HashMap::new(),
            ready: false,
            torn_down: false,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.pending_count()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// State of the reveal on `target`, if one is still tracked
    pub fn reveal_state(&self, target: NodeId) -> Option<TypingState> {
        self.reveals.get(&target).map(|r| r.session.state())
    }

    pub fn hover_targets(&self) -> Vec<NodeId> {
        let mut targets: Vec<_> = self.hover.keys().copied().collect();
        targets.sort();
        targets
    }

    /// Entry point for the document-ready signal. Only the first call counts.
    pub fn on_ready(&mut self) {
        if self.ready || self.torn_down {
            tracing::debug!("ready signal already handled");
            return;
        }
        self.ready = true;

        let hero = self.document.query_selector(&self.config.selectors.hero);
        let created = self.generate(hero);

        let delay = Duration::from_millis(self.config.typing.start_delay_ms);
        self.scheduler.set_timeout(delay, Task::StartReveal);

        let links = self
            .document
            .query_selector_all(&self.config.selectors.social_links);
        self.attach_hover(&links);

        tracing::info!(
            floating = created,
            hover_links = links.len(),
            reveal_in_ms = delay.as_millis() as u64,
            "effects initialized"
        );
    }

    /// Appends a floating field to `container`; returns how many elements
    /// were added.
    pub fn generate(&mut self, container: Option<NodeId>) -> usize {
        if self.torn_down {
            return 0;
        }
        let plan = plan_field(container, &self.config.field, &mut self.rng);
        self.document.apply_all(plan).len()
    }

    /// Starts typing out `target`. A missing target is a no-op; a target
    /// that is still being revealed is rejected.
    pub fn reveal(&mut self, target: Option<NodeId>) -> Result<()> {
        let Some(target) = target else {
            tracing::debug!("no bio element, skipping typing reveal");
            return Ok(());
        };
        if self.torn_down {
            return Ok(());
        }
        if self.reveals.contains_key(&target) {
            return Err(FxError::RevealInProgress(target));
        }

        let cfg = self.config.typing.clone();
        let (session, mutations) = TypingSession::begin(&self.document, target, cfg.clone());
        self.document.apply_all(mutations);
        tracing::debug!(%target, chars = session.source_len(), "typing reveal started");

        let interval = if session.is_done() {
            self.scheduler.set_timeout(
                Duration::from_millis(cfg.post_complete_delay_ms),
                Task::FinalizeReveal(target),
            );
            None
        } else {
            Some(self.scheduler.set_interval(
                Duration::from_millis(cfg.tick_interval_ms),
                Task::TypingTick(target),
            ))
        };

        self.reveals.insert(target, Reveal { session, interval });
        Ok(())
    }

    /// Registers pointer-enter pulses for each element
    pub fn attach_hover(&mut self, elements: &[NodeId]) {
        if self.torn_down {
            return;
        }
        for binding in hover::attach(elements, &self.config.hover) {
            self.hover.insert(binding.element, binding);
        }
    }

    /// Pointer entered `element`: flag it now, clear it after the active window
    pub fn pointer_enter(&mut self, element: NodeId) {
        if self.torn_down {
            return;
        }
        let Some(binding) = self.hover.get(&element) else {
            return;
        };
        let (activate, active_for) = (binding.activate(), binding.active_for);
        self.document.apply(activate);

        let timer = self
            .scheduler
            .set_timeout(active_for, Task::HoverRelease(element));
        if self.config.hover.race == HoverRace::Reschedule {
            if let Some(stale) = self.hover_pending.insert(element, timer) {
                self.scheduler.clear(stale);
            }
        }
    }

    /// Fires every timer due within the next `by`, in order
    pub fn advance(&mut self, by: Duration) {
        if self.torn_down {
            return;
        }
        let deadline = self.scheduler.now() + by;
        while let Some((id, task)) = self.scheduler.next_due(deadline) {
            self.dispatch(id, task);
        }
        self.scheduler.advance_to(deadline);
    }

    /// Fires timers until none remain or `limit` has elapsed; returns the
    /// clock after the last fired timer.
    pub fn run_until_idle(&mut self, limit: Duration) -> Duration {
        if !self.torn_down {
            let deadline = self.scheduler.now() + limit;
            while let Some((id, task)) = self.scheduler.next_due(deadline) {
                self.dispatch(id, task);
            }
        }
        self.scheduler.now()
    }

    /// Page is going away: drop every pending timer and ignore later input
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        let abandoned = self.scheduler.pending_count();
        self.scheduler.shutdown();
        self.reveals.clear();
        self.hover_pending.clear();
        tracing::info!(abandoned, "effects torn down");
    }

    fn dispatch(&mut self, id: TimerId, task: Task) {
        match task {
            Task::StartReveal => {
                let bio = self.document.query_selector(&self.config.selectors.bio);
                if let Err(err) = self.reveal(bio) {
                    tracing::warn!(%err, "typing reveal not started");
                }
            }
            Task::TypingTick(target) => self.on_typing_tick(id, target),
            Task::FinalizeReveal(target) => {
                if let Some(reveal) = self.reveals.remove(&target) {
                    self.document.apply_all(reveal.session.finalize());
                    tracing::debug!(%target, "typing reveal complete");
                }
            }
            Task::HoverRelease(element) => {
                if self.hover_pending.get(&element) == Some(&id) {
                    self.hover_pending.remove(&element);
                }
                if let Some(binding) = self.hover.get(&element) {
                    self.document.apply(binding.deactivate());
                }
            }
        }
    }

    fn on_typing_tick(&mut self, id: TimerId, target: NodeId) {
        let Some(reveal) = self.reveals.get_mut(&target) else {
            self.scheduler.clear(id);
            return;
        };

        let mutations = reveal.session.tick();
        tracing::trace!(%target, revealed = reveal.session.revealed_count(), "typing tick");
        self.document.apply_all(mutations);

        if reveal.session.is_done() {
            if let Some(interval) = reveal.interval.take() {
                self.scheduler.clear(interval);
            }
            let delay = Duration::from_millis(self.config.typing.post_complete_delay_ms);
            self.scheduler
                .set_timeout(delay, Task::FinalizeReveal(target));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Mutation, NodeSpec};
    use crate::hover::HoverConfig;
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn page(bio_text: &str) -> (Document, NodeId, NodeId, Vec<NodeId>) {
        let mut doc = Document::new();
        let root = doc.root();
        let hero = doc
            .create_element(root, NodeSpec::new("section").class("hero"))
            .unwrap();
        let bio = doc
            .create_element(hero, NodeSpec::new("p").class("bio"))
            .unwrap();
        doc.apply(Mutation::SetText {
            node: bio,
            text: bio_text.into(),
        });
        let nav = doc
            .create_element(root, NodeSpec::new("nav").class("social-links"))
            .unwrap();
        let links = (0..3)
            .map(|_| doc.create_element(nav, NodeSpec::new("a")).unwrap())
            .collect();
        (doc, hero, bio, links)
    }

    fn engine(doc: Document, config: Config) -> Engine<StdRng> {
        Engine::new(doc, config, StdRng::seed_from_u64(42))
    }

    fn has_class(e: &Engine<StdRng>, node: NodeId, class: &str) -> bool {
        e.document().node(node).unwrap().has_class(class)
    }

    #[test]
    fn test_ready_populates_and_defers_typing() {
        let (doc, hero, bio, _) = page("hi");
        let mut e = engine(doc, Config::default());
        e.on_ready();

        // bio plus 25 floating elements
        assert_eq!(e.document().children(hero).len(), 26);
        assert_eq!(e.document().text_content(bio), "hi");
        assert_eq!(e.hover_targets().len(), 3);

        e.advance(ms(499));
        assert_eq!(e.document().text_content(bio), "hi");
        assert!(!has_class(&e, bio, "typing"));

        e.advance(ms(1));
        assert_eq!(e.document().text_content(bio), "");
        assert!(has_class(&e, bio, "typing"));
    }

    #[test]
    fn test_ready_fires_once() {
        let (doc, hero, _, _) = page("hi");
        let mut e = engine(doc, Config::default());
        e.on_ready();
        e.on_ready();
        assert_eq!(e.document().children(hero).len(), 26);
        assert_eq!(e.pending_timers(), 1);
    }

    #[test]
    fn test_reveal_hi_timeline() {
        let (doc, _, bio, _) = page("hi");
        let mut e = engine(doc, Config::default());
        e.reveal(Some(bio)).unwrap();
        assert_eq!(e.reveal_state(bio), Some(TypingState::Typing));

        e.advance(ms(20));
        assert_eq!(e.document().text_content(bio), "h");
        e.advance(ms(20));
        assert_eq!(e.document().text_content(bio), "hi");
        assert_eq!(e.reveal_state(bio), Some(TypingState::Done));
        // Interval is gone; only the finalize timer remains
        assert_eq!(e.pending_timers(), 1);

        e.advance(ms(499));
        assert!(has_class(&e, bio, "typing"));
        assert!(!has_class(&e, bio, "typing-done"));

        e.advance(ms(1));
        assert!(has_class(&e, bio, "typing-done"));
        assert!(!has_class(&e, bio, "typing"));
        assert_eq!(e.reveal_state(bio), None);
        assert_eq!(e.pending_timers(), 0);

        e.advance(ms(1000));
        assert_eq!(e.document().text_content(bio), "hi");
    }

    #[test]
    fn test_second_reveal_rejected_while_running() {
        let (doc, _, bio, _) = page("abc");
        let mut e = engine(doc, Config::default());
        e.reveal(Some(bio)).unwrap();
        assert_matches!(e.reveal(Some(bio)), Err(FxError::RevealInProgress(n)) if n == bio);

        e.run_until_idle(ms(10_000));
        assert_eq!(e.document().text_content(bio), "abc");
        // Finished sessions can be started again
        assert!(e.reveal(Some(bio)).is_ok());
    }

    #[test]
    fn test_missing_targets_are_noops() {
        let mut e = engine(Document::new(), Config::default());
        e.on_ready();
        assert_eq!(e.generate(None), 0);
        assert!(e.reveal(None).is_ok());
        e.attach_hover(&[]);
        e.run_until_idle(ms(5_000));
        assert!(e.document().descendants(e.document().root()).is_empty());
        assert_eq!(e.pending_timers(), 0);
    }

    #[test]
    fn test_hover_single_pulse() {
        let (doc, _, _, links) = page("x");
        let mut e = engine(doc, Config::default());
        e.attach_hover(&links);
        let link = links[1];

        assert!(!has_class(&e, link, "bounce"));
        e.pointer_enter(link);
        assert!(has_class(&e, link, "bounce"));

        e.advance(ms(999));
        assert!(has_class(&e, link, "bounce"));
        e.advance(ms(1));
        assert!(!has_class(&e, link, "bounce"));
        assert!(!has_class(&e, links[0], "bounce"));
    }

    #[test]
    fn test_hover_reentry_restarts_window() {
        let (doc, _, _, links) = page("x");
        let mut e = engine(doc, Config::default());
        e.attach_hover(&links);
        let link = links[0];

        e.pointer_enter(link);
        e.advance(ms(600));
        e.pointer_enter(link);
        assert_eq!(e.pending_timers(), 1);

        // The first removal would have fired at 1000ms
        e.advance(ms(500));
        assert!(has_class(&e, link, "bounce"));
        e.advance(ms(500));
        assert!(!has_class(&e, link, "bounce"));
    }

    #[test]
    fn test_hover_legacy_race() {
        let (doc, _, _, links) = page("x");
        let config = Config {
            hover: HoverConfig {
                race: HoverRace::Legacy,
                ..HoverConfig::default()
            },
            ..Config::default()
        };
        let mut e = engine(doc, config);
        e.attach_hover(&links);
        let link = links[0];

        e.pointer_enter(link);
        e.advance(ms(600));
        e.pointer_enter(link);
        assert_eq!(e.pending_timers(), 2);

        // Stale removal clears the flag early
        e.advance(ms(400));
        assert!(!has_class(&e, link, "bounce"));
        e.advance(ms(600));
        assert!(!has_class(&e, link, "bounce"));
        assert_eq!(e.pending_timers(), 0);
    }

    #[test]
    fn test_pointer_on_unbound_element_ignored() {
        let (doc, hero, _, _) = page("x");
        let mut e = engine(doc, Config::default());
        e.pointer_enter(hero);
        assert!(!has_class(&e, hero, "bounce"));
        assert_eq!(e.pending_timers(), 0);
    }

    #[test]
    fn test_teardown_stops_all_work() {
        let (doc, hero, bio, links) = page("hello");
        let mut e = engine(doc, Config::default());
        e.on_ready();
        e.advance(ms(540));
        e.pointer_enter(links[0]);
        let typed = e.document().text_content(bio);
        assert_eq!(typed, "he");

        e.teardown();
        assert_eq!(e.pending_timers(), 0);
        e.advance(ms(10_000));
        e.pointer_enter(links[1]);
        assert_eq!(e.generate(Some(hero)), 0);

        assert_eq!(e.document().text_content(bio), typed);
        assert!(has_class(&e, links[0], "bounce"));
        assert!(!has_class(&e, links[1], "bounce"));
        assert!(e.is_torn_down());
    }

    #[test]
    fn test_empty_bio_still_finalizes() {
        let (doc, _, bio, _) = page("");
        let mut e = engine(doc, Config::default());
        e.reveal(Some(bio)).unwrap();
        e.advance(ms(500));
        assert!(has_class(&e, bio, "typing-done"));
        assert!(!has_class(&e, bio, "typing"));
    }

    #[test]
    fn test_unvalidated_wide_range_still_generates() {
        let (doc, hero, _, _) = page("hi");
        let mut config = Config::default();
        config.field.delay_sec = crate::floating::Span::new(-1e308, 1e308);
        let mut e = engine(doc, config);
        e.on_ready();
        assert_eq!(e.document().children(hero).len(), 26);
    }
}
