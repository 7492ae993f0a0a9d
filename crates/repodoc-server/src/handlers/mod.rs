//! Request handlers, grouped by the resource they front (`spec.md` §6).

pub mod evaluate;
pub mod evaluations;
pub mod health;
pub mod remediation;
