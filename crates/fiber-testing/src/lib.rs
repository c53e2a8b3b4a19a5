//! Testing utilities and harness for fiber-core

pub mod harness;
pub mod host;
pub mod platform;

pub use harness::TestRoot;
pub use host::{HostOp, MemoryHost, MemoryNode, MemoryNodeId, MemoryNodeKind};
pub use platform::{FixedDeadline, ManualClock, ManualIdleScheduler, TickDeadline};

pub mod prelude {
    pub use crate::harness::*;
    pub use crate::host::*;
    pub use crate::platform::*;
}
