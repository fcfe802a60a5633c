pub mod ai;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod feed;
pub mod importer;
pub mod models;
pub mod routes;
pub mod rss;
pub mod state;
pub mod tasks;
