// Library surface for the binary and for integration tests.
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod floating;
pub mod hover;
pub mod logging;
pub mod page;
pub mod runtime;
pub mod scheduler;
pub mod typing;
pub mod ui;

pub use engine::Engine;
pub use error::{FxError, Result};
