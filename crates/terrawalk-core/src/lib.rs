//! terrawalk core - addresses, change and state records, diagnostics, errors

pub mod addrs;
pub mod diagnostics;
pub mod error;
pub mod plans;
pub mod states;
pub mod walk;

pub use addrs::*;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{Error, Result};
pub use plans::{Action, ResourceInstanceChange};
pub use states::{ObjectStatus, ResourceInstanceObject, StateScope};
pub use walk::WalkOperation;
