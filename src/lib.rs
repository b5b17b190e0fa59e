//! Config History library
//!
//! Line diffs between file versions, context collapsing for review, version
//! comparison selection and bulk rollback planning, on top of an external
//! version store.

pub mod backend;
pub mod compare_backend;
pub mod config;
pub mod constant;
pub mod history;
pub mod logging;
pub mod rollback;
