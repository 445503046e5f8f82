pub mod db;
pub mod embedding;
pub mod evaluation;
pub mod schema;
pub mod scoring;
pub mod settings;
pub mod speech;
pub mod utils;
pub mod worker;
