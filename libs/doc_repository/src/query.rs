//! Request and query shapes exchanged between the repository and a store

use serde::{Deserialize, Serialize};

use crate::conditions::{Conditions, Filter};
use crate::document::{Document, ID_FIELD, KEY_FIELD};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub order: SortOrder,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }
}

/// Logical query executed by a store collection.
///
/// Modifiers apply in order: filter, sort, skip, limit, projection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Query {
    pub filter: Filter,
    /// Restrict results to these store keys
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Parameters of a `find` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindRequest {
    pub conditions: Conditions,
    pub projection: Option<Vec<String>>,
    pub sort: Vec<SortField>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl FindRequest {
    pub fn new(conditions: Conditions) -> Self {
        Self {
            conditions,
            ..Default::default()
        }
    }

    pub fn project<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn sort_by(mut self, sort: SortField) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Turn the request into a store query over an already scoped filter
    pub(crate) fn into_query(self, filter: Filter) -> Query {
        Query {
            filter,
            keys: None,
            projection: self
                .projection
                .map(|fields| fields.into_iter().map(internal_field).collect()),
            sort: self
                .sort
                .into_iter()
                .map(|sort| SortField {
                    field: internal_field(sort.field),
                    order: sort.order,
                })
                .collect(),
            skip: self.skip,
            limit: self.limit,
        }
    }
}

impl From<Conditions> for FindRequest {
    fn from(conditions: Conditions) -> Self {
        Self::new(conditions)
    }
}

/// Parameters of a `find_one_and_update` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateRequest {
    pub conditions: Conditions,
    /// Partial document merged into the first match
    pub update: Document,
}

impl UpdateRequest {
    pub fn new(conditions: Conditions, update: Document) -> Self {
        Self { conditions, update }
    }
}

/// Outcome of a delete operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

fn internal_field(field: String) -> String {
    if field == ID_FIELD {
        KEY_FIELD.to_string()
    } else {
        field
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::ConditionBuilder;

    #[test]
    fn test_into_query_maps_identifier_fields() {
        let request = FindRequest::new(Conditions::new())
            .project(["id", "name"])
            .sort_by(SortField::desc("id"))
            .skip(5)
            .limit(10);

        let query = request.into_query(ConditionBuilder::new(None).build(Conditions::new()));

        assert_eq!(
            query.projection,
            Some(vec!["_id".to_string(), "name".to_string()])
        );
        assert_eq!(query.sort, vec![SortField::desc("_id")]);
        assert_eq!(query.skip, Some(5));
        assert_eq!(query.limit, Some(10));
    }

    #[test]
    fn test_query_serialization_omits_unset_modifiers() {
        let query = Query::new(ConditionBuilder::new(None).build(Conditions::new().eq("a", 1)));
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value, serde_json::json!({ "filter": { "a": 1 } }));
    }
}
