pub mod error;
pub mod features;
pub mod query_spec;
pub mod types;

pub use error::FilterError;
pub use features::ApiFeatures;
pub use query_spec::QuerySpec;
pub use types::*;
