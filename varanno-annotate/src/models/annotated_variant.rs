use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

use crate::models::FieldValue;
use crate::schema::AnalysisSchema;

///
/// One output entity: a value slot per field of the analysis schema, in
/// schema order, plus the existence flag of the allele for the selected
/// sample.
///
/// Values are coerced to the declared field type on the way in; a value that
/// does not fit the declared type leaves the slot empty.
///
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedVariant {
    schema: Arc<AnalysisSchema>,
    slots: Vec<Option<FieldValue>>,
    pub exists: bool,
}

impl AnnotatedVariant {
    pub fn new(schema: Arc<AnalysisSchema>) -> Self {
        let slots = vec![None; schema.len()];
        AnnotatedVariant {
            schema,
            slots,
            exists: true,
        }
    }

    pub fn schema(&self) -> &AnalysisSchema {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        let index = self.schema.index_of(name)?;
        self.slots[index].as_ref()
    }

    pub fn get_at(&self, index: usize) -> Option<&FieldValue> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    pub fn double(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FieldValue::as_f64)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_i64)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    ///
    /// Set a field by name. Returns `false` when the schema does not declare
    /// the field or the value does not fit its type.
    ///
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> bool {
        match self.schema.index_of(name) {
            Some(index) => self.set_at(index, value.into()),
            None => false,
        }
    }

    pub fn set_at(&mut self, index: usize, value: FieldValue) -> bool {
        let Some(field) = self.schema.field(index) else {
            return false;
        };
        match field.coerce(value) {
            Some(value) => {
                self.slots[index] = Some(value);
                true
            }
            None => {
                debug!("value does not fit field '{}' ({:?})", field.name, field.field_type);
                false
            }
        }
    }

    pub fn set_opt(&mut self, name: &str, value: Option<impl Into<FieldValue>>) -> bool {
        match value {
            Some(value) => self.set(name, value),
            None => false,
        }
    }

    /// Set a field only when it is still empty.
    pub fn set_if_empty(&mut self, name: &str, value: impl Into<FieldValue>) -> bool {
        if self.is_set(name) {
            return false;
        }
        self.set(name, value)
    }

    ///
    /// Parse a raw textual value into the slot at `index`. Unparsable values
    /// leave the slot untouched.
    ///
    pub fn set_raw_at(&mut self, index: usize, raw: &str) -> bool {
        let Some(field) = self.schema.field(index) else {
            return false;
        };
        match field.parse_value(raw) {
            Some(value) => {
                self.slots[index] = Some(value);
                true
            }
            None => {
                if !raw.is_empty() {
                    debug!("could not parse '{}' as {:?} for '{}'", raw, field.field_type, field.name);
                }
                false
            }
        }
    }

    pub fn set_raw(&mut self, name: &str, raw: &str) -> bool {
        match self.schema.index_of(name) {
            Some(index) => self.set_raw_at(index, raw),
            None => false,
        }
    }

    pub fn clear(&mut self, name: &str) {
        if let Some(index) = self.schema.index_of(name) {
            self.slots[index] = None;
        }
    }

    /// `(field name, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&FieldValue>)> {
        self.schema.names().zip(self.slots.iter().map(Option::as_ref))
    }

    /// Values as tab-separated text in schema order; empty slots are empty cells.
    pub fn to_tsv_row(&self) -> String {
        self.slots
            .iter()
            .map(|slot| slot.as_ref().map(|v| v.to_string()).unwrap_or_default())
            .collect::<Vec<String>>()
            .join("\t")
    }
}

impl Serialize for AnnotatedVariant {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.slots.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    const SCHEMA: &str = r#"
name = "test"

[[field]]
name = "chr"
type = "text"

[[field]]
name = "pos"
type = "long"

[[field]]
name = "cadd_phred"
type = "double"

[[field]]
name = "sift4g_pred"
type = "enum"
values = ["DAMAGING", "TOLERATED"]
"#;

    #[fixture]
    fn variant() -> AnnotatedVariant {
        let schema = AnalysisSchema::from_toml_str(SCHEMA).unwrap();
        AnnotatedVariant::new(Arc::new(schema))
    }

    #[rstest]
    fn test_set_coerces_to_declared_type(mut variant: AnnotatedVariant) {
        assert_eq!(variant.set("pos", 1000), true);
        assert_eq!(variant.get("pos"), Some(&FieldValue::Long(1000)));
        assert_eq!(variant.set("cadd_phred", 12), true);
        assert_eq!(variant.double("cadd_phred"), Some(12.0));
    }

    #[rstest]
    fn test_set_rejects_unknown_and_mistyped(mut variant: AnnotatedVariant) {
        assert_eq!(variant.set("not_declared", "x"), false);
        assert_eq!(variant.set("sift4g_pred", "MAYBE"), false);
        assert_eq!(variant.is_set("sift4g_pred"), false);
        assert_eq!(variant.set("sift4g_pred", "DAMAGING"), true);
        assert_eq!(variant.text("sift4g_pred"), Some("DAMAGING"));
    }

    #[rstest]
    fn test_set_if_empty_keeps_first_writer(mut variant: AnnotatedVariant) {
        assert_eq!(variant.set_if_empty("chr", "1"), true);
        assert_eq!(variant.set_if_empty("chr", "2"), false);
        assert_eq!(variant.text("chr"), Some("1"));
    }

    #[rstest]
    fn test_set_raw_leaves_slot_empty_on_bad_input(mut variant: AnnotatedVariant) {
        assert_eq!(variant.set_raw("cadd_phred", "abc"), false);
        assert_eq!(variant.is_set("cadd_phred"), false);
        assert_eq!(variant.set_raw("cadd_phred", "23.5"), true);
        assert_eq!(variant.double("cadd_phred"), Some(23.5));
    }

    #[rstest]
    fn test_output_follows_schema_order(mut variant: AnnotatedVariant) {
        variant.set("cadd_phred", 1.5);
        variant.set("chr", "X");
        assert_eq!(variant.to_tsv_row(), "X\t\t1.5\t");
        assert_eq!(
            serde_json::to_string(&variant).unwrap(),
            r#"{"chr":"X","pos":null,"cadd_phred":1.5,"sift4g_pred":null}"#
        );
    }
}
