use thiserror::Error;

pub type StResult<T> = Result<T, StError>;

#[derive(Error, Debug)]
pub enum StError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },
}
