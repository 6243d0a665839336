pub use pushgate_types::prelude::*;

// vim: ts=4
