//! labharvest - resilient harvester for paginated race results.
//!
//! Jobs (provider "subevents") are resolved to a page count, their pages are
//! extracted concurrently through an interactive browser session or a paged
//! JSON API, and the records of each job are written as CSV once every page
//! has succeeded.

pub mod cli;
pub mod config;
pub mod models;
pub mod output;
pub mod scrapers;
pub mod services;
