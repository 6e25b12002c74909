use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{Document, TENANT_FIELD};

/// Tenant bound to a repository handle.
///
/// Every condition and write payload issued through the handle is augmented
/// with `tenantId` and the extra scoping attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantContext {
    tenant_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, Value>,
}

impl TenantContext {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Add an extra scoping attribute (e.g. a workspace or region)
    pub fn with_attribute(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(field.into(), value.into());
        self
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// All fields this tenant pins, `tenantId` last so it always wins
    pub fn scope_fields(&self) -> impl Iterator<Item = (&str, Value)> {
        self.attributes
            .iter()
            .map(|(field, value)| (field.as_str(), value.clone()))
            .chain(std::iter::once((
                TENANT_FIELD,
                Value::String(self.tenant_id.clone()),
            )))
    }

    /// Stamp a write payload, overwriting any caller-supplied tenant fields
    pub fn stamp(&self, document: &mut Document) {
        for (field, value) in self.scope_fields() {
            document.insert(field, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stamp_overwrites_foreign_tenant() {
        let tenant = TenantContext::new("t1");
        let mut document = Document::new().with("tenantId", "t2").with("name", "Alice");

        tenant.stamp(&mut document);

        assert_eq!(document.tenant_id(), Some("t1"));
        assert_eq!(document.get("name"), Some(&json!("Alice")));
    }

    #[test]
    fn test_scope_fields_include_attributes() {
        let tenant = TenantContext::new("t1").with_attribute("region", "eu");
        let fields: Vec<_> = tenant.scope_fields().collect();

        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0], ("region", json!("eu")));
        assert_eq!(fields[1], ("tenantId", json!("t1")));
    }
}
