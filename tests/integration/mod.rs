//! End-to-end workflows: model responses through escalation and patch
//! application to the final source text.

mod escalation_flow;
mod patch_flow;
