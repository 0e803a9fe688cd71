pub mod field;
pub mod value;

pub use field::{Field, FieldId, FieldKind};
pub use value::{format_value, FieldValue, FormattedValue, ValueMap};
