use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Invalid {param}: {value}. Must be a positive number")]
    InvalidPagination { param: &'static str, value: String },

    #[error("Field selection cannot mix included and excluded fields")]
    MixedProjection,
}
