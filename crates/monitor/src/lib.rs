//! Plant environment monitor: polls a sensor feed, checks readings against
//! per-metric thresholds, keeps a short alert history and asks a prediction
//! service for crop suggestions.

pub mod config;
pub mod db;
pub mod evaluator;
pub mod feed;
pub mod notifications;
pub mod poller;
pub mod reading;
pub mod recommend;
pub mod settings;
pub mod sim;
pub mod state;
pub mod thresholds;
pub mod web;
