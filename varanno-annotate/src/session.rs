use chrono::{DateTime, Utc};

use crate::models::AnnotatedVariant;

///
/// Who runs which analysis, stamped on every annotated variant. The insert
/// date is taken once, when the session starts.
///
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub analysis: Option<String>,
    pub user: Option<String>,
    pub started: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(analysis: Option<String>, user: Option<String>) -> Self {
        SessionContext {
            analysis,
            user,
            started: Utc::now(),
        }
    }

    pub fn with_start(mut self, started: DateTime<Utc>) -> Self {
        self.started = started;
        self
    }

    /// Fill the provenance fields the schema declares.
    pub fn stamp(&self, target: &mut AnnotatedVariant) {
        target.set_opt("analysis", self.analysis.as_deref());
        target.set_opt("uploaded_by", self.user.as_deref());
        target.set("insert_date", self.started);
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        SessionContext::new(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::models::FieldValue;
    use crate::schema::AnalysisSchema;

    #[rstest]
    fn test_stamp() {
        let started = Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap();
        let session = SessionContext::new(Some("exomes".to_string()), None).with_start(started);
        let mut target = AnnotatedVariant::new(Arc::new(AnalysisSchema::embedded().unwrap()));

        session.stamp(&mut target);
        assert_eq!(target.text("analysis"), Some("exomes"));
        assert_eq!(target.is_set("uploaded_by"), false);
        assert_eq!(target.get("insert_date"), Some(&FieldValue::Timestamp(started)));
    }
}
