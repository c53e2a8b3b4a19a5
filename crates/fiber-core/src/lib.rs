#![doc = r"Interruptible tree reconciliation: builds a shadow tree across idle slices and commits it to a host tree in one pass."]

pub mod collections;
pub mod commit;
pub mod config;
pub mod element;
pub mod error;
pub mod fiber;
pub mod hooks;
pub mod host;
pub mod platform;
mod reconciler;
pub mod root;
pub mod scheduler;
pub mod work_loop;

pub use commit::CommitReport;
pub use config::RootConfig;
pub use element::{
    component, create_element, event_name, text, ComponentRef, Element, ElementKind, Listener,
    PropValue, Props, RenderFnPtr, TEXT_VALUE,
};
pub use error::{ComponentError, HostError, RenderError, TaskError};
pub use fiber::{EffectTag, FiberId, FiberKind};
pub use hooks::{use_state, use_state_with, StateSetter, Update};
pub use host::{Host, NodeKind};
pub use platform::{Clock, IdleCallback, IdleDeadline, IdleScheduler, UnboundedDeadline};
pub use root::{Root, WorkStatus};
pub use scheduler::{TaskId, TaskScheduler};
pub use work_loop::{LoopState, PendingEffect};
