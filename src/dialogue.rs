//! Dialogue traversal engine
//!
//! Node resolution, free-text classification and the session state machine.
//! The state machine follows the Elm Architecture: `transition` is pure and
//! returns effects that the runtime executes.

pub mod classifier;
mod effect;
mod event;
pub mod resolver;
mod state;
mod transition;


#[allow(unused_imports)] // Public API re-exports
pub use classifier::{classify, is_exact_label_match, Outcome};
pub use effect::Effect;
pub use event::Event;
#[allow(unused_imports)]
pub use resolver::{resolve, Resolution, ResolveError, ResolvedNode};
pub use state::{Message, Sender, SessionConfig, SessionContext, SessionState, Transcript};
#[allow(unused_imports)]
pub use transition::{transition, TransitionError, TransitionResult};
