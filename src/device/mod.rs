pub mod btle;
pub mod capability;
pub mod chooser;
pub mod constants;
pub mod manager;
pub mod platform;
pub mod session;
pub mod types;

#[cfg(test)]
pub mod fake;
