//! Walk operations: the intent of one traversal of the graph.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum WalkOperation {
    Validate,
    Plan,
    PlanDestroy,
    Apply,
    Destroy,
    Import,
    Eval,
    Forget,
}

impl fmt::Display for WalkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validate => "validate",
            Self::Plan => "plan",
            Self::PlanDestroy => "plan-destroy",
            Self::Apply => "apply",
            Self::Destroy => "destroy",
            Self::Import => "import",
            Self::Eval => "eval",
            Self::Forget => "forget",
        };
        f.write_str(s)
    }
}
