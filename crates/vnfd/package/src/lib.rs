pub mod bundle;
pub mod upload;
