//! Terminal input for the live preview.
//!
//! Crossterm is read on a background thread and forwarded over a channel.
//! The preview loop pulls one event per frame through [`Runner`], which
//! also reports the wall-clock time between frames so the engine's virtual
//! clock can follow it.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyEvent, KeyEventKind, MouseEventKind};

#[derive(Clone, Debug, PartialEq)]
pub enum PageEvent {
    Key(KeyEvent),
    /// Pointer is over this terminal cell
    Pointer { column: u16, row: u16 },
    Resize,
    Tick,
}

impl PageEvent {
    /// What the preview reacts to; scrolling, focus, paste and key
    /// releases are dropped
    pub fn from_terminal(event: Event) -> Option<Self> {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => Some(Self::Key(key)),
            Event::Mouse(mouse) => match mouse.kind {
                MouseEventKind::Moved | MouseEventKind::Drag(_) | MouseEventKind::Down(_) => {
                    Some(Self::Pointer {
                        column: mouse.column,
                        row: mouse.row,
                    })
                }
                _ => None,
            },
            Event::Resize(_, _) => Some(Self::Resize),
            _ => None,
        }
    }

    fn is_pointer(&self) -> bool {
        matches!(self, Self::Pointer { .. })
    }
}

pub trait PageEventSource: Send + 'static {
    /// Waits up to `timeout`; `Duration::ZERO` only drains what is queued
    fn recv_timeout(&self, timeout: Duration) -> Result<PageEvent, RecvTimeoutError>;
}

/// Events delivered over a channel, either from the terminal reader thread
/// or pushed directly by a test
pub struct ChannelSource {
    rx: Receiver<PageEvent>,
}

impl ChannelSource {
    pub fn new(rx: Receiver<PageEvent>) -> Self {
        Self { rx }
    }

    /// Forwards crossterm input until the receiving side goes away
    pub fn terminal() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || loop {
            let Ok(raw) = event::read() else {
                break;
            };
            if let Some(ev) = PageEvent::from_terminal(raw) {
                if tx.send(ev).is_err() {
                    break;
                }
            }
        });
        Self::new(rx)
    }
}

impl PageEventSource for ChannelSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<PageEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

pub struct Runner<S: PageEventSource> {
    source: S,
    frame: Duration,
    held: Option<PageEvent>,
    last_frame: Instant,
}

impl<S: PageEventSource> Runner<S> {
    pub fn new(source: S, frame: Duration) -> Self {
        Self {
            source,
            frame,
            held: None,
            last_frame: Instant::now(),
        }
    }

    /// Next event, or `Tick` when a frame passes without one. A burst of
    /// queued pointer moves comes back as its last position.
    pub fn step(&mut self) -> PageEvent {
        let event = match self.held.take() {
            Some(ev) => ev,
            None => match self.source.recv_timeout(self.frame) {
                Ok(ev) => ev,
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                    return PageEvent::Tick
                }
            },
        };
        if !event.is_pointer() {
            return event;
        }

        let mut latest = event;
        while let Ok(next) = self.source.recv_timeout(Duration::ZERO) {
            if next.is_pointer() {
                latest = next;
            } else {
                self.held = Some(next);
                break;
            }
        }
        latest
    }

    /// Wall-clock time since the previous call
    pub fn elapsed(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame);
        self.last_frame = now;
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers, MouseButton, MouseEvent};

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn pointer(column: u16, row: u16) -> PageEvent {
        PageEvent::Pointer { column, row }
    }

    #[test]
    fn terminal_events_are_filtered() {
        assert_eq!(
            PageEvent::from_terminal(mouse(MouseEventKind::Moved, 3, 9)),
            Some(pointer(3, 9))
        );
        assert_eq!(
            PageEvent::from_terminal(mouse(MouseEventKind::Down(MouseButton::Left), 1, 2)),
            Some(pointer(1, 2))
        );
        assert_eq!(
            PageEvent::from_terminal(mouse(MouseEventKind::ScrollUp, 1, 2)),
            None
        );
        assert_eq!(
            PageEvent::from_terminal(Event::Resize(80, 24)),
            Some(PageEvent::Resize)
        );
        assert_eq!(
            PageEvent::from_terminal(Event::Key(key('q'))),
            Some(PageEvent::Key(key('q')))
        );
        let release =
            KeyEvent::new_with_kind(KeyCode::Char('q'), KeyModifiers::NONE, KeyEventKind::Release);
        assert_eq!(PageEvent::from_terminal(Event::Key(release)), None);
        assert_eq!(PageEvent::from_terminal(Event::FocusGained), None);
    }

    #[test]
    fn quiet_frame_is_a_tick() {
        let (_tx, rx) = mpsc::channel();
        let mut runner = Runner::new(ChannelSource::new(rx), Duration::from_millis(1));
        assert_eq!(runner.step(), PageEvent::Tick);
    }

    #[test]
    fn queued_pointer_moves_collapse() {
        let (tx, rx) = mpsc::channel();
        for ev in [
            pointer(1, 1),
            pointer(2, 2),
            PageEvent::Key(key('r')),
            pointer(3, 3),
        ] {
            tx.send(ev).unwrap();
        }
        let mut runner = Runner::new(ChannelSource::new(rx), Duration::from_millis(1));

        assert_eq!(runner.step(), pointer(2, 2));
        // The key that ended the burst is not lost
        assert_eq!(runner.step(), PageEvent::Key(key('r')));
        assert_eq!(runner.step(), pointer(3, 3));
        assert_eq!(runner.step(), PageEvent::Tick);
    }

    #[test]
    fn elapsed_measures_between_calls() {
        let (_tx, rx) = mpsc::channel();
        let mut runner = Runner::new(ChannelSource::new(rx), Duration::from_millis(5));
        runner.elapsed();
        runner.step();
        assert!(runner.elapsed() >= Duration::from_millis(5));
    }
}
