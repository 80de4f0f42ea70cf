pub mod advisor;
pub mod config;
pub mod models;
pub mod oracle;
pub mod workload;
