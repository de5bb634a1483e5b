pub mod compute;
pub mod connection_point;
pub mod descriptor;
pub mod entity;
pub mod error;
pub mod flavor;
pub mod image;
pub mod interface;
pub mod link;
pub mod scaling;
pub mod telemetry;
pub mod topology;
pub mod unit;

pub use self::error::{Error, Result};
