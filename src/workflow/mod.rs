//! The approval-gated mutation workflow: intent building, submission,
//! status transitions and bulk processing.

pub mod intent;
pub mod outcome;
pub mod processor;
pub mod registry;
pub mod service;
pub mod submitter;
pub mod transition;

#[cfg(test)]
pub(crate) mod fake;
