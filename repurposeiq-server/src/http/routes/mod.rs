//! Route handlers organized by resource

pub mod health;
pub mod auth;
pub mod query;
pub mod conversations;
pub mod dashboard;
pub mod analytics;
pub mod reports;
pub mod uploads;
pub mod workflows;
pub mod alerts;
pub mod monitoring;
pub mod suggestions;
pub mod sentiment;
pub mod contact;
