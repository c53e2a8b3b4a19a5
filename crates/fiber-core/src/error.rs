use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::fiber::FiberId;

/// Error type returned by scheduled tasks.
pub type TaskError = Box<dyn std::error::Error + 'static>;

/// Failure reported by a [`Host`](crate::Host) primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    pub operation: &'static str,
    pub message: String,
}

impl HostError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host {} failed: {}", self.operation, self.message)
    }
}

impl std::error::Error for HostError {}

/// Error returned by a component's render function.
#[derive(Clone)]
pub struct ComponentError {
    message: String,
    source: Option<Rc<dyn std::error::Error + 'static>>,
}

impl ComponentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an arbitrary error, keeping it reachable through `source()`.
    pub fn from_error(error: impl std::error::Error + 'static) -> Self {
        Self {
            message: error.to_string(),
            source: Some(Rc::new(error)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentError")
            .field("message", &self.message)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ComponentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref()
    }
}

impl From<&str> for ComponentError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ComponentError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Errors that abort a render cycle.
///
/// Whatever the variant, the committed tree is left as it was and the
/// work-in-progress tree is discarded.
#[derive(Debug, Clone)]
pub enum RenderError {
    /// A component's render function returned an error.
    Component {
        component: &'static str,
        source: ComponentError,
    },
    /// A component's render function panicked.
    ComponentPanicked {
        component: &'static str,
        message: String,
    },
    /// A component requested a different number of state slots than during
    /// its previous render.
    HookCountMismatch {
        component: &'static str,
        expected: usize,
        found: usize,
    },
    /// A state slot was requested with a different type than it was created with.
    HookTypeMismatch {
        component: &'static str,
        index: usize,
        requested: &'static str,
        stored: &'static str,
    },
    /// A fiber id referred to a unit that no longer exists.
    StaleFiber { id: FiberId },
    /// A host primitive failed during the build or the commit.
    Host(HostError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Component { component, source } => {
                write!(f, "component {component} failed: {source}")
            }
            RenderError::ComponentPanicked { component, message } => {
                write!(f, "component {component} panicked: {message}")
            }
            RenderError::HookCountMismatch {
                component,
                expected,
                found,
            } => write!(
                f,
                "component {component} requested {found} state slots, previous render requested {expected}"
            ),
            RenderError::HookTypeMismatch {
                component,
                index,
                requested,
                stored,
            } => write!(
                f,
                "component {component} requested state slot {index} as {requested}, but it holds {stored}"
            ),
            RenderError::StaleFiber { id } => write!(f, "fiber {id} is stale"),
            RenderError::Host(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Component { source, .. } => Some(source),
            RenderError::Host(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HostError> for RenderError {
    fn from(err: HostError) -> Self {
        RenderError::Host(err)
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
