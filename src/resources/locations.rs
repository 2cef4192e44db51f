use super::{Resource, ResourceStore};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(rename = "areaCode", alias = "area_code", default)]
    pub area_code: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Location {
    #[must_use]
    pub fn new(name: impl Into<String>, area_code: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            area_code: area_code.into(),
            extra: Map::new(),
        }
    }

    #[must_use]
    pub const fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

impl Resource for Location {
    type Id = i64;

    const COLLECTION: &'static str = "location";

    fn id(&self) -> Option<i64> {
        self.id
    }
}

pub type LocationStore = ResourceStore<Location>;
