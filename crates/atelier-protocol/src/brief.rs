//! The painting brief and its merge semantics.
//!
//! The brief is filled in incrementally over the whole conversation, so
//! updates are always partial. Scalar fields and the array fields are
//! replace-on-write; `constraints` is the one field that merges key-wise.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The structured specification of the desired artwork.
///
/// All fields start unset/empty; timestamps and audit live on the session,
/// not here. Wire names are camelCase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaintingBrief {
    pub style: Option<String>,
    pub palette: Option<String>,
    pub finish: Option<String>,
    pub timeline: Option<String>,
    pub budget: Option<String>,
    pub vibe: Vec<String>,
    pub rooms: Vec<String>,
    pub open_questions: Vec<String>,
    /// Open key/value bag. Keys merge; see [`merge_brief`].
    pub constraints: IndexMap<String, Value>,
}

/// A partial brief. Fields left `None` are untouched by a merge; unknown
/// wire keys are ignored rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BriefUpdate {
    pub style: Option<String>,
    pub palette: Option<String>,
    pub finish: Option<String>,
    pub timeline: Option<String>,
    pub budget: Option<String>,
    pub vibe: Option<Vec<String>>,
    pub rooms: Option<Vec<String>>,
    pub open_questions: Option<Vec<String>>,
    pub constraints: Option<IndexMap<String, Value>>,
}

impl BriefUpdate {
    /// Update that sets a single constraint key.
    pub fn constraint(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut constraints = IndexMap::new();
        constraints.insert(key.into(), value.into());
        Self {
            constraints: Some(constraints),
            ..Self::default()
        }
    }
}

/// Apply a partial update to a brief.
///
/// Total and side-effect-free. Present scalar and array fields replace the
/// current value wholesale; `constraints` shallow-merges (keys in the update
/// overwrite, all other keys are preserved). Idempotent under repeated
/// identical updates.
pub fn merge_brief(current: &PaintingBrief, update: &BriefUpdate) -> PaintingBrief {
    let mut next = current.clone();
    if let Some(style) = &update.style {
        next.style = Some(style.clone());
    }
    if let Some(palette) = &update.palette {
        next.palette = Some(palette.clone());
    }
    if let Some(finish) = &update.finish {
        next.finish = Some(finish.clone());
    }
    if let Some(timeline) = &update.timeline {
        next.timeline = Some(timeline.clone());
    }
    if let Some(budget) = &update.budget {
        next.budget = Some(budget.clone());
    }
    if let Some(vibe) = &update.vibe {
        next.vibe = vibe.clone();
    }
    if let Some(rooms) = &update.rooms {
        next.rooms = rooms.clone();
    }
    if let Some(open_questions) = &update.open_questions {
        next.open_questions = open_questions.clone();
    }
    if let Some(constraints) = &update.constraints {
        for (key, value) in constraints {
            next.constraints.insert(key.clone(), value.clone());
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_update_replaces_only_that_field() {
        let current = PaintingBrief {
            style: Some("impressionist".to_owned()),
            palette: Some("warm".to_owned()),
            ..PaintingBrief::default()
        };
        let update = BriefUpdate {
            style: Some("bold".to_owned()),
            ..BriefUpdate::default()
        };

        let merged = merge_brief(&current, &update);
        assert_eq!(merged.style.as_deref(), Some("bold"));
        assert_eq!(merged.palette.as_deref(), Some("warm"));
        assert!(merged.finish.is_none());
    }

    #[test]
    fn constraints_merge_key_wise() {
        let mut current = PaintingBrief::default();
        current
            .constraints
            .insert("pets".to_owned(), json!("two cats"));
        current
            .constraints
            .insert("budget_cap".to_owned(), json!(1500));

        let update = BriefUpdate::constraint("budget_cap", json!(2000));
        let merged = merge_brief(&current, &update);

        assert_eq!(merged.constraints["pets"], json!("two cats"));
        assert_eq!(merged.constraints["budget_cap"], json!(2000));
        assert_eq!(merged.constraints.len(), 2);
    }

    #[test]
    fn array_fields_replace_wholesale() {
        let current = PaintingBrief {
            rooms: vec!["kitchen".to_owned(), "hall".to_owned()],
            ..PaintingBrief::default()
        };
        let update = BriefUpdate {
            rooms: Some(vec!["studio".to_owned()]),
            ..BriefUpdate::default()
        };

        let merged = merge_brief(&current, &update);
        assert_eq!(merged.rooms, vec!["studio".to_owned()]);
    }

    #[test]
    fn merge_is_idempotent() {
        let current = PaintingBrief::default();
        let update = BriefUpdate {
            palette: Some("earth tones".to_owned()),
            constraints: Some(IndexMap::from([(
                "deadline".to_owned(),
                json!("before spring"),
            )])),
            ..BriefUpdate::default()
        };

        let once = merge_brief(&current, &update);
        let twice = merge_brief(&once, &update);
        assert_eq!(once, twice);
    }

    #[test]
    fn absent_fields_are_untouched() {
        let current = PaintingBrief {
            timeline: Some("six weeks".to_owned()),
            vibe: vec!["calm".to_owned()],
            ..PaintingBrief::default()
        };

        let merged = merge_brief(&current, &BriefUpdate::default());
        assert_eq!(merged, current);
    }

    #[test]
    fn update_ignores_unknown_wire_keys() {
        let update: BriefUpdate =
            serde_json::from_str(r#"{"style":"minimal","glitter":true}"#).unwrap();
        assert_eq!(update.style.as_deref(), Some("minimal"));
    }

    #[test]
    fn brief_wire_names_are_camel_case() {
        let brief = PaintingBrief {
            open_questions: vec!["north light?".to_owned()],
            ..PaintingBrief::default()
        };
        let json = serde_json::to_value(&brief).unwrap();
        assert!(json.get("openQuestions").is_some());
        assert!(json.get("open_questions").is_none());
    }
}
