//! Strong-typed UUID identifiers for the engine's top-level aggregates.

crate::define_id!(JobId, "Strong typed identifier for an evaluation or remediation job");
crate::define_id!(EvaluationId, "Strong typed identifier for a stored evaluation record");
crate::define_id!(RemediationId, "Strong typed identifier for a stored remediation record");
crate::define_id!(BatchId, "Strong typed identifier for a batch evaluation submission");
