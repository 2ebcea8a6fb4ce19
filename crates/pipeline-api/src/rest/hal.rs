//! HAL `_links` for result envelopes and items.
//!
//! Links point at the REST path of a relation's target pipeline. A
//! relation whose target was never registered gets no link.
//!
//! - item links are concrete: `/api/people/7`, `/api/books?authorId=7`
//! - envelope links are URI templates: `/api/people/{id}`,
//!   `/api/books?status=published{&authorId*}`

use pipeline_api_core::{escape, Cardinality, Relation, ResultPage};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::host::Host;

/// A HAL link object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Link {
    pub href: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templated: Option<bool>,
}

impl Link {
    fn concrete(href: String) -> Self {
        Self {
            href,
            templated: None,
        }
    }

    fn template(href: String) -> Self {
        Self {
            href,
            templated: Some(true),
        }
    }
}

/// Builds the links of one resource.
pub(crate) struct HalLinks<'a> {
    host: &'a Host,
    endpoint: String,
    relations: &'a [Relation],
}

impl<'a> HalLinks<'a> {
    pub(crate) fn new(host: &'a Host, endpoint: String, relations: &'a [Relation]) -> Self {
        Self {
            host,
            endpoint,
            relations,
        }
    }

    /// Concrete links of one instance, keyed by relation name.
    pub(crate) fn links_for_instance(&self, entity: &Value) -> Map<String, Value> {
        self.relations
            .iter()
            .filter_map(|rel| {
                let link = self.instance_link(rel, entity)?;
                Some((rel.name.clone(), link_value(&link)))
            })
            .collect()
    }

    /// Templated links of the collection, keyed by relation name.
    pub(crate) fn links_for_collection(&self) -> Map<String, Value> {
        self.relations
            .iter()
            .filter_map(|rel| {
                let link = self.collection_link(rel)?;
                Some((rel.name.clone(), link_value(&link)))
            })
            .collect()
    }

    fn instance_link(&self, rel: &Relation, entity: &Value) -> Option<Link> {
        let mut href = self.host.resource_path(&rel.pipeline())?;
        let mut query = rel.query.hydrate(entity);

        if rel.cardinality == Cardinality::One {
            if let Some(id) = query.shift_remove("id") {
                href.push('/');
                href.push_str(&escape(&id));
            }
        }

        let mut pairs = Vec::new();
        for (key, value) in &query {
            push_pairs(&mut pairs, key, value);
        }
        if !pairs.is_empty() {
            href.push('?');
            href.push_str(&pairs.join("&"));
        }
        Some(Link::concrete(href))
    }

    fn collection_link(&self, rel: &Relation) -> Option<Link> {
        let mut href = self.host.resource_path(&rel.pipeline())?;
        let by_id = rel.cardinality == Cardinality::One;
        let mut id_segment = None;

        let mut pairs = Vec::new();
        for (key, value) in rel.query.literal_parts() {
            if by_id && key == "id" {
                id_segment = Some(format!("/{}", escape(value)));
            } else {
                push_pairs(&mut pairs, key, value);
            }
        }

        let mut expansions = Vec::new();
        for key in rel.query.templated_parts().into_keys() {
            if by_id && key == "id" {
                id_segment = Some("/{id}".to_string());
            } else {
                expansions.push(format!("{key}*"));
            }
        }

        if let Some(segment) = id_segment {
            href.push_str(&segment);
        }
        if !pairs.is_empty() {
            href.push('?');
            href.push_str(&pairs.join("&"));
        }
        if !expansions.is_empty() {
            let operator = if pairs.is_empty() { '?' } else { '&' };
            href.push_str(&format!("{{{operator}{}}}", expansions.join(",")));
        }
        Some(Link::template(href))
    }

    /// Decorate a result page: templated links on the envelope, concrete
    /// links on every item that carries an `id`.
    pub(crate) fn envelope(&self, page: ResultPage) -> Value {
        let mut links = Map::new();
        links.insert(
            "self".to_string(),
            link_value(&Link::concrete(self.endpoint.clone())),
        );
        links.extend(self.links_for_collection());

        let data: Vec<Value> = page
            .data
            .into_iter()
            .map(|item| self.decorate(item))
            .collect();

        let mut out = Map::new();
        out.insert("_links".to_string(), Value::Object(links));
        out.insert("data".to_string(), Value::Array(data));
        if let Some(meta) = page.meta {
            out.insert("meta".to_string(), meta);
        }
        Value::Object(out)
    }

    fn decorate(&self, mut item: Value) -> Value {
        let Some(id) = item.get("id").filter(|id| !id.is_null()).cloned() else {
            return item;
        };
        let mut links = Map::new();
        links.insert(
            "self".to_string(),
            link_value(&Link::concrete(format!("{}/{}", self.endpoint, escape(&id)))),
        );
        links.extend(self.links_for_instance(&item));
        if let Value::Object(map) = &mut item {
            map.insert("_links".to_string(), Value::Object(links));
        }
        item
    }
}

/// `key=value`, or one `key[]=value` per element for arrays.
fn push_pairs(pairs: &mut Vec<String>, key: &str, value: &Value) {
    match value {
        Value::Array(items) => {
            for item in items {
                pairs.push(format!("{}[]={}", escape_key(key), escape(item)));
            }
        }
        other => pairs.push(format!("{}={}", escape_key(key), escape(other))),
    }
}

fn escape_key(key: &str) -> String {
    escape(&Value::String(key.to_string()))
}

fn link_value(link: &Link) -> Value {
    serde_json::to_value(link).unwrap_or(Value::Null)
}
