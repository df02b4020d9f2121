//! Local implementations for serpdiff.
//!
//! `normalize` and `compare` are the pure comparison engine; `fetch`,
//! `extract`, `store`, and `report` are the collaborators that feed it
//! (SERP retrieval, organic-result extraction, file persistence, report
//! artifacts).

pub mod compare;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod report;
pub mod store;
