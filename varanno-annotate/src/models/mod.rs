pub mod annotated_variant;
pub mod value;

// re-exports
pub use annotated_variant::AnnotatedVariant;
pub use value::{FieldType, FieldValue};
