//! Error types for the datagraph system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.
//! Every [`ErrorKind`] belongs to one [`ErrorCategory`] and maps to a stable
//! negative numeric code, so callers can report failures across process
//! boundaries without matching on message text.

use std::fmt;

use thiserror::Error;

use crate::id::EntityId;

/// The main error type for datagraph operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Records the container object being processed when the error occurred.
    ///
    /// Keeps any existing context and appends a frame if an object was
    /// already recorded, so nested failures read outermost-last.
    #[must_use]
    pub fn at_object(mut self, object: impl Into<String>) -> Self {
        let object = object.into();
        self.context = Some(match self.context.take() {
            Some(ctx) if ctx.object.is_some() => ctx.with_frame(object),
            Some(ctx) => ctx.with_object(object),
            None => ErrorContext::new().with_object(object),
        });
        self
    }

    /// Returns the category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns the stable numeric code of this error.
    #[must_use]
    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    /// Creates a name collision error.
    #[must_use]
    pub fn name_collision(parent: EntityId, name: impl Into<String>) -> Self {
        Self::new(ErrorKind::NameCollision {
            parent,
            name: name.into(),
        })
    }

    /// Creates an unknown parent error.
    #[must_use]
    pub fn unknown_parent(parent: EntityId) -> Self {
        Self::new(ErrorKind::UnknownParent(parent))
    }

    /// Creates a cycle error.
    #[must_use]
    pub fn cycle(entity: EntityId, parent: EntityId) -> Self {
        Self::new(ErrorKind::Cycle { entity, parent })
    }

    /// Creates an entity not found error.
    #[must_use]
    pub fn entity_not_found(id: EntityId) -> Self {
        Self::new(ErrorKind::EntityNotFound(id))
    }

    /// Creates a path not found error.
    #[must_use]
    pub fn path_not_found(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::PathNotFound(path.into()))
    }

    /// Creates a dangling reference error.
    #[must_use]
    pub fn dangling_reference(owner: EntityId, role: &'static str, target: EntityId) -> Self {
        Self::new(ErrorKind::DanglingReference {
            owner,
            role,
            target,
        })
    }

    /// Creates a missing reference error.
    #[must_use]
    pub fn missing_reference(owner: EntityId, role: &'static str) -> Self {
        Self::new(ErrorKind::MissingReference { owner, role })
    }

    /// Creates a shape mismatch error.
    #[must_use]
    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::new(ErrorKind::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        })
    }

    /// Creates an index out of range error.
    #[must_use]
    pub fn out_of_range(index: usize, length: usize) -> Self {
        Self::new(ErrorKind::IndexOutOfRange { index, length })
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        })
    }

    /// Creates an unknown type error.
    #[must_use]
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownType(name.into()))
    }

    /// Creates a missing metadata error.
    #[must_use]
    pub fn missing_metadata(object: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingMetadata {
            object: object.into(),
            attribute: attribute.into(),
        })
    }

    /// Creates an invalid format error.
    #[must_use]
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidFormat(message.into()))
    }

    /// Creates an I/O error.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IoError(message.into()))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}

/// Broad grouping of error kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Graph structure violations (names, parents, cycles, references).
    Structural,
    /// Shape, type, and bounds violations on stores.
    Shape,
    /// Malformed or unsupported container content.
    Format,
    /// Underlying file system failures.
    Io,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Structural => "structural",
            Self::Shape => "shape",
            Self::Format => "format",
            Self::Io => "io",
        };
        f.write_str(name)
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A sibling with this name already exists under the parent.
    #[error("name collision: '{name}' already exists under {parent}")]
    NameCollision {
        /// The parent that already holds the name.
        parent: EntityId,
        /// The conflicting name.
        name: String,
    },

    /// The requested parent does not exist.
    #[error("unknown parent: {0}")]
    UnknownParent(EntityId),

    /// Adding the parent would make the entity its own ancestor.
    #[error("cycle: {parent} is {entity} or one of its descendants")]
    Cycle {
        /// The entity receiving a new parent.
        entity: EntityId,
        /// The rejected parent.
        parent: EntityId,
    },

    /// Entity was not found in the graph.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// No entity lives at the given path.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// Entity names must be non-empty and must not contain '/'.
    #[error("invalid name: '{0}'")]
    InvalidName(String),

    /// The parent cannot hold children.
    #[error("entity {0} cannot hold children")]
    NotAContainer(EntityId),

    /// A composite references an entity that no longer exists.
    #[error("dangling reference: {owner} {role} points at removed entity {target}")]
    DanglingReference {
        /// The composite holding the reference.
        owner: EntityId,
        /// Which role the reference fills.
        role: &'static str,
        /// The missing target.
        target: EntityId,
    },

    /// A composite has no reference for a required role.
    #[error("missing reference: {owner} has no {role}")]
    MissingReference {
        /// The composite queried.
        owner: EntityId,
        /// The unset role.
        role: &'static str,
    },

    /// Shapes of two stores or of a store and its table disagree.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// The required shape.
        expected: Vec<usize>,
        /// The shape encountered.
        actual: Vec<usize>,
    },

    /// Index out of range.
    #[error("index out of range: {index} (length {length})")]
    IndexOutOfRange {
        /// The index that was accessed.
        index: usize,
        /// The valid length.
        length: usize,
    },

    /// Element or entity type did not match the requested type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected type name.
        expected: String,
        /// The actual type name.
        actual: String,
    },

    /// Payload access on a placeholder store created by a preflight load.
    #[error("payload not loaded: {0}")]
    PayloadNotLoaded(String),

    /// The operation is not defined for this entity kind.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The container names a type this system does not know.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// A required attribute is absent from a container object.
    #[error("missing metadata: '{attribute}' on {object}")]
    MissingMetadata {
        /// Path of the container object.
        object: String,
        /// The missing attribute name.
        attribute: String,
    },

    /// The file version is not one this system can read.
    #[error("version mismatch: found '{found}', expected one of {expected}")]
    VersionMismatch {
        /// The version recorded in the file.
        found: String,
        /// The readable versions.
        expected: String,
    },

    /// The container content is structurally invalid.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// Index encoding or decoding failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// I/O error (file operations, etc.).
    #[error("I/O error: {0}")]
    IoError(String),
}

impl ErrorKind {
    /// Returns the category of this error kind.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NameCollision { .. }
            | Self::UnknownParent(_)
            | Self::Cycle { .. }
            | Self::EntityNotFound(_)
            | Self::PathNotFound(_)
            | Self::InvalidName(_)
            | Self::NotAContainer(_)
            | Self::DanglingReference { .. }
            | Self::MissingReference { .. } => ErrorCategory::Structural,
            Self::ShapeMismatch { .. }
            | Self::IndexOutOfRange { .. }
            | Self::TypeMismatch { .. }
            | Self::PayloadNotLoaded(_)
            | Self::Unsupported(_) => ErrorCategory::Shape,
            Self::UnknownType(_)
            | Self::MissingMetadata { .. }
            | Self::VersionMismatch { .. }
            | Self::InvalidFormat(_)
            | Self::SerializationError(_) => ErrorCategory::Format,
            Self::IoError(_) => ErrorCategory::Io,
        }
    }

    /// Returns the stable numeric code of this error kind.
    ///
    /// Codes are grouped by category: -1xx structural, -2xx shape,
    /// -3xx format, -4xx I/O.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::NameCollision { .. } => -101,
            Self::UnknownParent(_) => -102,
            Self::Cycle { .. } => -103,
            Self::EntityNotFound(_) => -104,
            Self::PathNotFound(_) => -105,
            Self::InvalidName(_) => -106,
            Self::NotAContainer(_) => -107,
            Self::DanglingReference { .. } => -108,
            Self::MissingReference { .. } => -109,
            Self::ShapeMismatch { .. } => -201,
            Self::IndexOutOfRange { .. } => -202,
            Self::TypeMismatch { .. } => -203,
            Self::PayloadNotLoaded(_) => -204,
            Self::Unsupported(_) => -205,
            Self::UnknownType(_) => -301,
            Self::MissingMetadata { .. } => -302,
            Self::VersionMismatch { .. } => -303,
            Self::InvalidFormat(_) => -304,
            Self::SerializationError(_) => -305,
            Self::IoError(_) => -401,
        }
    }
}

/// Context about where an error occurred.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Container object or entity path being processed.
    pub object: Option<String>,
    /// Enclosing objects, innermost first.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            object: None,
            stack: Vec::new(),
        }
    }

    /// Sets the object being processed.
    #[must_use]
    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(object) = &self.object {
            write!(f, "at {object}")?;
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}
