use crate::data::Collection;
use crate::domain::{ConditionType, Entity};
use serde_json::Value;

pub const NOTHING_SELECTED: &str = "An item needs to be selected. Select and try again.";

/// Which grid rows a mass action targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MassSelection {
    /// Exactly these ids.
    Selected(Vec<String>),
    /// Every row except these ids (all rows when empty).
    Excluded(Vec<String>),
}

fn split_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

impl MassSelection {
    /// Reads the `selected` / `excluded` request parameters.
    ///
    /// `excluded=false` selects every row; `None` when neither parameter is present.
    pub fn from_params(selected: Option<&str>, excluded: Option<&str>) -> Option<Self> {
        if let Some(selected) = selected {
            return Some(Self::Selected(split_ids(selected)));
        }

        match excluded? {
            "false" => Some(Self::Excluded(Vec::new())),
            excluded => Some(Self::Excluded(split_ids(excluded))),
        }
    }

    pub fn apply<E: Entity>(&self, collection: &mut Collection<E>) {
        let primary_key = E::SCHEMA.primary_key;
        let ids = |ids: &[String]| Value::Array(ids.iter().cloned().map(Value::String).collect());

        match self {
            Self::Selected(ids_in) => {
                collection.add_field_to_filter(primary_key, ConditionType::In, ids(ids_in));
            }
            Self::Excluded(ids_out) if ids_out.is_empty() => {}
            Self::Excluded(ids_out) => {
                collection.add_field_to_filter(primary_key, ConditionType::Nin, ids(ids_out));
            }
        }
    }
}
