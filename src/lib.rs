//! Delivers a detected dependency update as a commit, a push and a
//! reconciled pull request.

pub mod auth;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod result;
pub mod scm;
pub mod target;
pub mod transformer;

#[cfg(test)]
mod test_utils;
