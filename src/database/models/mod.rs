pub mod tour;
pub mod user;

pub use tour::{Difficulty, MonthlyPlan, Tour, TourChanges, TourDraft, TourStats};
pub use user::{NewUser, User, UserChanges};

/// How raw query-string values for a field are coerced before comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Timestamp,
    Boolean,
    TextArray,
    TimestampArray,
}

impl FieldKind {
    pub fn is_array(&self) -> bool {
        matches!(self, FieldKind::TextArray | FieldKind::TimestampArray)
    }

    /// Kind of a single element (identity for scalar kinds)
    pub fn element(&self) -> FieldKind {
        match self {
            FieldKind::TextArray => FieldKind::Text,
            FieldKind::TimestampArray => FieldKind::Timestamp,
            other => *other,
        }
    }
}

/// Public (camelCase) field name mapped to its column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
}

impl FieldDef {
    pub const fn new(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self { name, column, kind }
    }
}

/// A stored resource whose fields can be filtered, sorted and projected.
/// Fields absent from the catalogue (password hashes, reset tokens) are
/// invisible to queries.
pub trait Document {
    const TABLE: &'static str;
    const FIELDS: &'static [FieldDef];

    fn field(name: &str) -> Option<&'static FieldDef> {
        Self::FIELDS.iter().find(|f| f.name == name)
    }
}
