pub mod provider;
pub mod providers;
pub mod retry;
pub mod types;
