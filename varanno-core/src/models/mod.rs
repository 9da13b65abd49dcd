pub mod strand;
pub mod variant;

// re-export for cleaner imports
pub use self::strand::Strand;
pub use self::variant::{StructuralSubtype, Variant, VariantType};
