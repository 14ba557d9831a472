pub mod calculator;
pub mod cli;
pub mod error;
pub mod fmt;
pub mod importer;
pub mod logging;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod providers;
pub mod schema;
pub mod settings;
pub mod table;
pub mod validation;
