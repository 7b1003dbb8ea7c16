//! Entity query parameters.

use devreg_core::{Error, Result};
use serde::Deserialize;

/// Raw query string parameters of `GET /ngsi-ld/v1/entities`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryParams {
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    pub attrs: Option<String>,
}

/// Parsed entity query: the requested types and attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    entity_types: Vec<String>,
    attributes: Vec<String>,
}

fn split_list(list: Option<&str>) -> Vec<String> {
    list.map(|l| {
        l.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

impl Query {
    /// At least one type or attribute is required.
    pub fn new(entity_types: Option<&str>, attributes: Option<&str>) -> Result<Self> {
        let query = Self {
            entity_types: split_list(entity_types),
            attributes: split_list(attributes),
        };
        if query.entity_types.is_empty() && query.attributes.is_empty() {
            return Err(Error::Validation(
                "a query must specify at least one entity type or attribute".to_string(),
            ));
        }
        Ok(query)
    }

    /// Same attributes, restricted to the given types.
    pub fn with_entity_types(&self, entity_types: Vec<String>) -> Self {
        Self {
            entity_types,
            attributes: self.attributes.clone(),
        }
    }

    pub fn entity_types(&self) -> &[String] {
        &self.entity_types
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }
}

impl TryFrom<&QueryParams> for Query {
    type Error = Error;

    fn try_from(params: &QueryParams) -> Result<Self> {
        Query::new(params.entity_type.as_deref(), params.attrs.as_deref())
    }
}
