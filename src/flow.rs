//! Conversation graph model and admin editing

mod default_flow;
pub mod editor;
mod types;

pub use default_flow::default_flow;
pub use editor::{validate, EditError, FlowIssue};
#[allow(unused_imports)] // Public API re-exports
pub use types::{
    ActionTag, ChatOption, ExternalAction, Graph, Node, OptionKind, OptionShapeError,
    DEFAULT_STEP, START_STEP,
};
