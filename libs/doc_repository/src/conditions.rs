//! Caller conditions and the tenant-scoped filters built from them

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::document::{Document, ID_FIELD, KEY_FIELD, is_empty_value};
use crate::tenant::TenantContext;

/// Field/value equality conditions supplied by a caller.
///
/// A field mapped to `None` is absent and leaves the query unconstrained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    fields: BTreeMap<String, Option<Value>>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), Some(value.into()));
        self
    }

    /// Require `field == value` only when a value is present
    pub fn maybe<V: Into<Value>>(mut self, field: impl Into<String>, value: Option<V>) -> Self {
        self.fields.insert(field.into(), value.map(Into::into));
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Option<Value>) {
        self.fields.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).and_then(Option::as_ref)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, Option<&Value>)> {
        self.fields.iter().map(|(k, v)| (k, v.as_ref()))
    }
}

impl From<Document> for Conditions {
    fn from(document: Document) -> Self {
        Self {
            fields: document
                .into_map()
                .into_iter()
                .map(|(field, value)| (field, Some(value)))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Conditions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), Some(v.into())))
                .collect(),
        }
    }
}

/// Fully scoped, normalized equality filter handed to the store.
///
/// Keys are kept sorted so two equal filters always serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Filter(BTreeMap<String, Value>);

impl Filter {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Example matching: every filter field must equal the document's field
    pub fn matches(&self, document: &Document) -> bool {
        self.0
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }

    pub fn to_document(&self) -> Document {
        self.0
            .iter()
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }
}

/// Merges caller conditions with the bound tenant
#[derive(Debug, Clone, Copy)]
pub struct ConditionBuilder<'a> {
    tenant: Option<&'a TenantContext>,
}

impl<'a> ConditionBuilder<'a> {
    pub fn new(tenant: Option<&'a TenantContext>) -> Self {
        Self { tenant }
    }

    /// Drop empty values, map `id` to `_id`, then pin the tenant fields.
    ///
    /// Tenant fields are applied last; callers cannot widen the scope.
    pub fn build(&self, conditions: Conditions) -> Filter {
        let mut fields = BTreeMap::new();
        for (field, value) in conditions.fields {
            let Some(value) = value else { continue };
            if is_empty_value(&value) {
                continue;
            }
            let field = if field == ID_FIELD {
                KEY_FIELD.to_string()
            } else {
                field
            };
            fields.insert(field, value);
        }
        if let Some(tenant) = self.tenant {
            for (field, value) in tenant.scope_fields() {
                fields.insert(field.to_string(), value);
            }
        }
        Filter(fields)
    }

    /// Filter matching a single store key within the tenant.
    ///
    /// The key is pinned even when empty, so the filter never widens to the
    /// whole tenant.
    pub fn by_key(&self, key: &str) -> Filter {
        let mut filter = self.build(Conditions::new());
        filter
            .0
            .insert(KEY_FIELD.to_string(), Value::String(key.to_string()));
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_merges_tenant() {
        let tenant = TenantContext::new("t1");
        let filter = ConditionBuilder::new(Some(&tenant)).build(Conditions::new().eq("a", 1));

        assert_eq!(filter.get("a"), Some(&json!(1)));
        assert_eq!(filter.get("tenantId"), Some(&json!("t1")));
        assert_eq!(filter.len(), 2);
    }

    #[test]
    fn test_build_strips_absent_and_empty_values() {
        let filter = ConditionBuilder::new(None).build(
            Conditions::new()
                .maybe("status", None::<String>)
                .eq("nickname", "")
                .eq("deleted", Value::Null)
                .eq("active", false)
                .eq("count", 0),
        );

        assert_eq!(filter.len(), 2);
        assert_eq!(filter.get("active"), Some(&json!(false)));
        assert_eq!(filter.get("count"), Some(&json!(0)));
    }

    #[test]
    fn test_build_maps_id_to_key() {
        let filter = ConditionBuilder::new(None).build(Conditions::new().eq("id", "abc"));
        assert_eq!(filter.get("_id"), Some(&json!("abc")));
        assert!(filter.get("id").is_none());
    }

    #[test]
    fn test_caller_cannot_override_tenant() {
        let tenant = TenantContext::new("t1");
        let filter = ConditionBuilder::new(Some(&tenant))
            .build(Conditions::new().eq("tenantId", "t2"));
        assert_eq!(filter.get("tenantId"), Some(&json!("t1")));
    }

    #[test]
    fn test_by_key_keeps_empty_key() {
        let tenant = TenantContext::new("t1");
        let filter = ConditionBuilder::new(Some(&tenant)).by_key("");

        assert_eq!(filter.get("_id"), Some(&json!("")));
        assert_eq!(filter.get("tenantId"), Some(&json!("t1")));
        assert!(!filter.matches(&Document::new().with("_id", "k1").with("tenantId", "t1")));
    }

    #[test]
    fn test_without_tenant_scoping_is_noop() {
        let filter = ConditionBuilder::new(None).build(Conditions::new().eq("a", 1));
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn test_filter_serialization_ignores_insertion_order() {
        let first = ConditionBuilder::new(None).build(Conditions::new().eq("b", 2).eq("a", 1));
        let second = ConditionBuilder::new(None).build(Conditions::new().eq("a", 1).eq("b", 2));

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_filter_matches_document() {
        let filter = ConditionBuilder::new(None).build(Conditions::new().eq("a", 1));
        let matching = Document::new().with("a", 1).with("b", 2);
        let other = Document::new().with("a", 2);

        assert!(filter.matches(&matching));
        assert!(!filter.matches(&other));
    }
}
