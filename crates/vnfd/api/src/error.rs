use thiserror::Error;

pub type Result<T> = ::core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("the {kind} {id:?} is already configured")]
    AlreadyConfigured { kind: &'static str, id: String },

    #[error("the {kind} {id:?} already exists")]
    AlreadyExists { kind: &'static str, id: String },

    #[error("the unit {unit:?} interface {interface:?} is already claimed by the external connection point {cp:?}")]
    AlreadyBound {
        unit: String,
        interface: String,
        cp: String,
    },

    #[error("cannot find the {kind} {id:?}")]
    NotFound { kind: &'static str, id: String },

    #[error("{0}")]
    Validation(String),
}
