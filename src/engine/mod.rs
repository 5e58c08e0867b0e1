pub mod db;
pub mod scoring;
pub mod settings;
