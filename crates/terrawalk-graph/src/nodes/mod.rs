//! Concrete node kinds.

pub mod forget;
pub mod provider_eval;

pub use forget::ForgetResourceInstanceNode;
pub use provider_eval::ProviderEvalNode;
