use serde::{Deserialize, Serialize};

/// Relationship from one case to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseIndex {
    /// Relationship name on the indexing case, e.g. `parent` or `host`.
    pub identifier: String,
    /// Case type of the referenced case.
    pub referenced_type: String,
    /// Identifier of the referenced case.
    pub referenced_id: String,
    /// `child` or `extension`.
    #[serde(default = "default_relationship")]
    pub relationship: String,
}

fn default_relationship() -> String {
    "child".to_owned()
}

/// One dynamic case property as stored in the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseProperty {
    /// Property name.
    pub key: String,
    /// Property value.
    pub value: String,
}

/// Case as stored in the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseDocument {
    /// Case identifier.
    #[serde(rename = "_id")]
    pub case_id: String,
    /// Owning domain.
    pub domain: String,
    /// Case type.
    #[serde(rename = "type")]
    pub case_type: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Owner identifier.
    #[serde(default)]
    pub owner_id: Option<String>,
    /// Whether the case is closed.
    #[serde(default)]
    pub closed: bool,
    /// Outgoing relationships.
    #[serde(default)]
    pub indices: Vec<CaseIndex>,
    /// Dynamic properties.
    #[serde(default)]
    pub case_properties: Vec<CaseProperty>,
}

impl CaseDocument {
    /// Returns a property value by name.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.case_properties
            .iter()
            .find(|property| property.key == key)
            .map(|property| property.value.as_str())
    }

    /// Returns ids referenced through one relationship identifier.
    pub fn referenced_ids<'a>(&'a self, identifier: &'a str) -> impl Iterator<Item = &'a str> {
        self.indices
            .iter()
            .filter(move |index| index.identifier == identifier)
            .map(|index| index.referenced_id.as_str())
    }
}

/// Column of an application case search detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailColumn {
    /// Displayed field, possibly a relationship path such as `parent/name`.
    pub field: String,
    /// Child case type listed through a nodeset, if any.
    #[serde(default)]
    pub nodeset_case_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::CaseDocument;

    #[test]
    fn case_document_reads_index_shape() {
        let case: Result<CaseDocument, _> = serde_json::from_value(serde_json::json!({
            "_id": "c1",
            "domain": "demo",
            "type": "patient",
            "indices": [
                {"identifier": "parent", "referenced_type": "household", "referenced_id": "h1"}
            ],
            "case_properties": [{"key": "dob", "value": "2020-03-02"}]
        }));

        let case = case.unwrap_or_else(|error| panic!("case should parse: {error}"));
        assert!(!case.closed);
        assert_eq!(case.property("dob"), Some("2020-03-02"));
        assert_eq!(case.referenced_ids("parent").collect::<Vec<_>>(), vec!["h1"]);
        assert_eq!(case.indices[0].relationship, "child");
    }
}
