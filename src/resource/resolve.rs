//! Resource resolution and idempotency classification
//!
//! The backend enforces no uniqueness constraint on most resource names, so a
//! lookup can legitimately land on zero, one, or several records. The
//! resolver classifies the candidates into exactly those three cases and the
//! decision helper turns the classification plus the caller's intent into a
//! concrete plan. More than one match is never guessed away: it is a hard
//! stop that asks the caller to disambiguate by id.

use serde_json::Value;
use std::fmt;

/// Caller-supplied matching criteria: exact equality on every declared field.
///
/// Field keys use dot notation for nested values (e.g. `region.slug`).
/// Immutable for the duration of one resolution.
#[derive(Debug, Clone, Default)]
pub struct LookupFilter {
    fields: Vec<(String, Value)>,
}

impl LookupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn matches(&self, candidate: &Value) -> bool {
        self.fields
            .iter()
            .all(|(key, expected)| lookup_path(candidate, key) == Some(expected))
    }
}

/// Extract a nested value using a dot-notation path.
pub fn lookup_path<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = item;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

/// Tri-state classification of a candidate set against a filter.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    /// Zero matches.
    None,
    /// Exactly one match.
    Single(Value),
    /// Two or more matches; requires caller disambiguation.
    Ambiguous(Vec<Value>),
}

/// Declared state intent of a module invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Present,
    Absent,
}

impl Default for Intent {
    fn default() -> Self {
        Self::Present
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => write!(f, "present"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

/// Concrete plan derived from intent and classification.
#[derive(Debug, Clone)]
pub enum Decision {
    /// Present + zero matches.
    Create,
    /// Nothing to do; the record, if any, already satisfies the intent.
    NoOp(Option<Value>),
    /// Present + one match with differing mutable fields.
    Update(Value),
    /// Absent + one match.
    Delete(Value),
    /// More than one match under either intent.
    Ambiguous(Vec<Value>),
}

/// Classify `candidates` against `filter`.
///
/// Runs freshly on every call; nothing is cached across resolutions.
pub fn resolve(candidates: &[Value], filter: &LookupFilter) -> MatchOutcome {
    let mut matches: Vec<Value> = candidates
        .iter()
        .filter(|c| filter.matches(c))
        .cloned()
        .collect();

    match matches.len() {
        0 => MatchOutcome::None,
        1 => MatchOutcome::Single(matches.remove(0)),
        _ => MatchOutcome::Ambiguous(matches),
    }
}

/// Turn a classification into a plan.
///
/// `differs` is consulted only for present + exactly-one: it reports whether
/// any caller-specified mutable field deviates from the existing record.
pub fn decide(
    intent: Intent,
    outcome: MatchOutcome,
    differs: impl FnOnce(&Value) -> bool,
) -> Decision {
    match (intent, outcome) {
        (Intent::Present, MatchOutcome::None) => Decision::Create,
        (Intent::Absent, MatchOutcome::None) => Decision::NoOp(None),
        (Intent::Present, MatchOutcome::Single(record)) => {
            if differs(&record) {
                Decision::Update(record)
            } else {
                Decision::NoOp(Some(record))
            }
        }
        (Intent::Absent, MatchOutcome::Single(record)) => Decision::Delete(record),
        (_, MatchOutcome::Ambiguous(records)) => Decision::Ambiguous(records),
    }
}

/// Build the ambiguity message enumerating every matching identifier, e.g.
/// "There are currently 2 Droplets named web-01 in nyc3: 111, 222".
pub fn describe_ambiguous(kind: &str, descriptor: &str, matches: &[Value], id_path: &str) -> String {
    let ids: Vec<String> = matches
        .iter()
        .map(|record| match lookup_path(record, id_path) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "?".to_string(),
        })
        .collect();

    format!(
        "There are currently {} {} {}: {}. Specify an id to disambiguate.",
        matches.len(),
        kind,
        descriptor,
        ids.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn droplets() -> Vec<Value> {
        vec![
            json!({"id": 111, "name": "web-01", "region": {"slug": "nyc3"}}),
            json!({"id": 222, "name": "web-01", "region": {"slug": "nyc3"}}),
            json!({"id": 333, "name": "web-01", "region": {"slug": "ams3"}}),
            json!({"id": 444, "name": "db-01", "region": {"slug": "nyc3"}}),
        ]
    }

    #[test]
    fn all_filter_fields_must_match() {
        let filter = LookupFilter::new()
            .field("name", "web-01")
            .field("region.slug", "ams3");
        match resolve(&droplets(), &filter) {
            MatchOutcome::Single(record) => assert_eq!(record["id"], 333),
            other => panic!("expected single match, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_names_classify_as_ambiguous() {
        let filter = LookupFilter::new()
            .field("name", "web-01")
            .field("region.slug", "nyc3");
        match resolve(&droplets(), &filter) {
            MatchOutcome::Ambiguous(records) => assert_eq!(records.len(), 2),
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn no_match_classifies_as_none() {
        let filter = LookupFilter::new().field("name", "cache-01");
        assert!(matches!(resolve(&droplets(), &filter), MatchOutcome::None));
    }

    #[test]
    fn decision_table() {
        assert!(matches!(
            decide(Intent::Present, MatchOutcome::None, |_| false),
            Decision::Create
        ));
        assert!(matches!(
            decide(Intent::Absent, MatchOutcome::None, |_| false),
            Decision::NoOp(None)
        ));
        assert!(matches!(
            decide(Intent::Present, MatchOutcome::Single(json!({})), |_| false),
            Decision::NoOp(Some(_))
        ));
        assert!(matches!(
            decide(Intent::Present, MatchOutcome::Single(json!({})), |_| true),
            Decision::Update(_)
        ));
        assert!(matches!(
            decide(Intent::Absent, MatchOutcome::Single(json!({})), |_| false),
            Decision::Delete(_)
        ));
        assert!(matches!(
            decide(Intent::Present, MatchOutcome::Ambiguous(vec![]), |_| false),
            Decision::Ambiguous(_)
        ));
    }

    #[test]
    fn ambiguity_message_enumerates_ids() {
        let matches = vec![json!({"id": 111}), json!({"id": 222})];
        let msg = describe_ambiguous("Droplets", "named web-01 in nyc3", &matches, "id");
        assert_eq!(
            msg,
            "There are currently 2 Droplets named web-01 in nyc3: 111, 222. \
             Specify an id to disambiguate."
        );
    }
}
