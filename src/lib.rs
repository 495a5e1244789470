//! Contact resolution and lead matching for scraped job postings.
//!
//! For every posting the [`pipeline`] walks company-name variations through
//! the registered [`providers`] and lets the [`resolver`] pick one contact.
//! Separately, the [`matching`] engine asks a language model which prospect
//! fits each posting best.

pub mod ai;
pub mod cache;
pub mod config;
pub mod error;
pub mod input;
pub mod logging;
pub mod matching;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod providers;
pub mod resolver;
pub mod retry;
pub mod store;
