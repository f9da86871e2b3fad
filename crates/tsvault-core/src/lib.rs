pub mod archive;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod joblog;
pub mod platform;
pub mod storage;
pub mod tier;

#[cfg(test)]
mod tests;
#[cfg(test)]
mod testutil;
