//! Opaque handles naming engine entities.
//!
//! Handles are plain indices. They are only meaningful relative to the
//! registry or heap that issued them.

use std::fmt;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// Returns the handle as a table index.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

handle!(
    /// A heap object handle, stable for the object's lifetime.
    ObjectId,
    "object"
);

handle!(
    /// A runtime class handle issued by the class registry.
    ClassId,
    "class"
);

handle!(
    /// A class loader identity. Part of every class's identity.
    LoaderId,
    "loader"
);

handle!(
    /// An attached interpreter thread.
    ThreadId,
    "thread"
);

impl LoaderId {
    /// The bootstrap loader, which defines the built-in classes and array
    /// classes of primitive elements.
    pub const BOOTSTRAP: LoaderId = LoaderId(0);

    /// Returns true for the bootstrap loader.
    pub fn is_bootstrap(self) -> bool {
        self == Self::BOOTSTRAP
    }
}
