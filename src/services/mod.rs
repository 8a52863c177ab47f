pub mod aws;
pub mod bucket_client;
pub mod downloader;
pub mod log_client;
pub mod metrics;
pub mod planner;
pub mod provider;
pub mod snapshot_service;
pub mod streamer;
pub mod ticker;

#[cfg(test)]
pub mod testing;
