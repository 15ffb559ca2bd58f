//! Resolution of a namespace and label selector to the objects that
//! selector-based queries report on.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::{AdapterError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    In(String, BTreeSet<String>),
    NotIn(String, BTreeSet<String>),
    Exists(String),
    DoesNotExist(String),
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Requirement::Equals(key, value) => labels.get(key) == Some(value),
            Requirement::NotEquals(key, value) => labels.get(key) != Some(value),
            Requirement::In(key, values) => labels.get(key).is_some_and(|v| values.contains(v)),
            Requirement::NotIn(key, values) => !labels.get(key).is_some_and(|v| values.contains(v)),
            Requirement::Exists(key) => labels.contains_key(key),
            Requirement::DoesNotExist(key) => !labels.contains_key(key),
        }
    }
}

/// Kubernetes label selector: equality terms (`app=web,tier!=db`), existence
/// terms (`canary`, `!legacy`) and set terms (`env in (prod,staging)`,
/// `tier notin (db)`). The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let mut requirements = Vec::new();
        for term in split_terms(raw) {
            let requirement = if term.contains('(') {
                parse_set_term(term)?
            } else if let Some((key, value)) = term.split_once("!=") {
                Requirement::NotEquals(valid_key(key, term)?, value.trim().to_string())
            } else if let Some((key, value)) = term.split_once("==") {
                Requirement::Equals(valid_key(key, term)?, value.trim().to_string())
            } else if let Some((key, value)) = term.split_once('=') {
                Requirement::Equals(valid_key(key, term)?, value.trim().to_string())
            } else if let Some(key) = term.strip_prefix('!') {
                Requirement::DoesNotExist(valid_key(key, term)?)
            } else {
                Requirement::Exists(valid_key(term, term)?)
            };
            requirements.push(requirement);
        }
        Ok(Self { requirements })
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

/// Splits on commas outside parentheses.
fn split_terms(raw: &str) -> Vec<&str> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in raw.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                terms.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    terms.push(&raw[start..]);
    terms
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// `key in (a,b)` or `key notin (a,b)`.
fn parse_set_term(term: &str) -> Result<Requirement> {
    let invalid = || AdapterError::InvalidSelector(format!("invalid requirement {:?}", term));

    let (head, rest) = term.split_once('(').ok_or_else(invalid)?;
    let list = rest.trim_end().strip_suffix(')').ok_or_else(invalid)?;

    let mut words = head.split_whitespace();
    let (Some(key), Some(op), None) = (words.next(), words.next(), words.next()) else {
        return Err(invalid());
    };
    let key = valid_key(key, term)?;

    let values: BTreeSet<String> = list
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    if values.is_empty() || values.iter().any(|v| v.contains(['(', ')'])) {
        return Err(invalid());
    }

    match op {
        "in" => Ok(Requirement::In(key, values)),
        "notin" => Ok(Requirement::NotIn(key, values)),
        _ => Err(invalid()),
    }
}

fn valid_key(key: &str, term: &str) -> Result<String> {
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) || key.contains(['(', ')', '!']) {
        return Err(AdapterError::InvalidSelector(format!(
            "invalid requirement {:?}",
            term
        )));
    }
    Ok(key.to_string())
}

/// Lists the names of objects in a namespace that match a selector.
#[async_trait]
pub trait ObjectResolver: Send + Sync {
    async fn list_object_names(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryObject {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub namespaces: BTreeMap<String, Vec<InventoryObject>>,
}

/// Resolver over a fixed inventory loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticObjectResolver {
    inventory: Inventory,
}

impl StaticObjectResolver {
    pub fn new(inventory: Inventory) -> Self {
        Self { inventory }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let inventory: Inventory = serde_json::from_str(raw)
            .map_err(|e| AdapterError::Config(format!("invalid object inventory: {}", e)))?;
        Ok(Self::new(inventory))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AdapterError::Config(format!("reading object inventory {}: {}", path.display(), e))
        })?;
        let resolver = Self::from_json(&raw)?;
        info!(
            path = %path.display(),
            namespaces = resolver.inventory.namespaces.len(),
            "loaded object inventory"
        );
        Ok(resolver)
    }
}

#[async_trait]
impl ObjectResolver for StaticObjectResolver {
    async fn list_object_names(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<String>> {
        Ok(self
            .inventory
            .namespaces
            .get(namespace)
            .map(|objects| {
                objects
                    .iter()
                    .filter(|o| selector.matches(&o.labels))
                    .map(|o| o.name.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_selector() {
        let selector = LabelSelector::parse("app=web, tier!=db,env==prod,canary,!legacy").unwrap();
        assert_eq!(
            selector.requirements,
            vec![
                Requirement::Equals("app".into(), "web".into()),
                Requirement::NotEquals("tier".into(), "db".into()),
                Requirement::Equals("env".into(), "prod".into()),
                Requirement::Exists("canary".into()),
                Requirement::DoesNotExist("legacy".into()),
            ]
        );
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        let selector = LabelSelector::parse("").unwrap();
        assert!(selector.is_empty());
        assert!(selector.matches(&labels(&[])));
        assert!(selector.matches(&labels(&[("app", "web")])));
    }

    #[test]
    fn test_selector_matching() {
        let selector = LabelSelector::parse("app=web,tier!=db").unwrap();
        assert!(selector.matches(&labels(&[("app", "web")])));
        assert!(selector.matches(&labels(&[("app", "web"), ("tier", "fe")])));
        assert!(!selector.matches(&labels(&[("app", "web"), ("tier", "db")])));
        assert!(!selector.matches(&labels(&[("app", "api")])));
    }

    #[test]
    fn test_invalid_selector() {
        assert!(matches!(
            LabelSelector::parse("=web"),
            Err(AdapterError::InvalidSelector(_))
        ));
        assert!(LabelSelector::parse("app in a,b").is_err());
        assert!(LabelSelector::parse("app in ()").is_err());
        assert!(LabelSelector::parse("app within (a)").is_err());
        assert!(LabelSelector::parse("app in (a").is_err());
    }

    #[test]
    fn test_set_based_selector() {
        let selector = LabelSelector::parse("env in (prod, staging),tier notin (db),app=web").unwrap();
        assert_eq!(
            selector.requirements,
            vec![
                Requirement::In(
                    "env".into(),
                    ["prod", "staging"].into_iter().map(String::from).collect()
                ),
                Requirement::NotIn("tier".into(), ["db"].into_iter().map(String::from).collect()),
                Requirement::Equals("app".into(), "web".into()),
            ]
        );

        assert!(selector.matches(&labels(&[("env", "prod"), ("app", "web")])));
        assert!(selector.matches(&labels(&[("env", "staging"), ("tier", "fe"), ("app", "web")])));
        assert!(!selector.matches(&labels(&[("env", "dev"), ("app", "web")])));
        assert!(!selector.matches(&labels(&[("env", "prod"), ("tier", "db"), ("app", "web")])));
        assert!(!selector.matches(&labels(&[("app", "web")])));
    }

    #[tokio::test]
    async fn test_static_resolver_filters_by_namespace_and_labels() {
        let resolver = StaticObjectResolver::from_json(
            r#"{"namespaces": {
                "default": [
                    {"name": "web-0", "labels": {"app": "web"}},
                    {"name": "web-1", "labels": {"app": "web"}},
                    {"name": "db-0", "labels": {"app": "db"}}
                ],
                "other": [{"name": "web-9", "labels": {"app": "web"}}]
            }}"#,
        )
        .unwrap();

        let selector = LabelSelector::parse("app=web").unwrap();
        assert_eq!(
            resolver.list_object_names("default", &selector).await.unwrap(),
            vec!["web-0", "web-1"]
        );
        assert!(resolver
            .list_object_names("missing", &selector)
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_inventory_errors_are_config_errors() {
        assert!(matches!(
            StaticObjectResolver::from_json("not json"),
            Err(AdapterError::Config(_))
        ));
    }
}
