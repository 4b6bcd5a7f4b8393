//! Survey value type and diffing.
//!
//! A [`Survey`] is one structured field record: a bag of string keys and
//! string values captured on a device. Surveys are pure in-memory values;
//! persistence and versioning live in `idig-repo`.
//!
//! [`diff_surveys`] computes the per-survey [`Patch`] list between two trench
//! states, which is what the sync protocol ships to out-of-date clients.

pub mod diff;
pub mod survey;

pub use diff::{diff_surveys, survey_map, Patch};
pub use survey::{Attachment, Survey, ATTACHMENTS_KEY, IDENTIFIER_KEY};
