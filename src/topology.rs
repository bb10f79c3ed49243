use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Size used for drawings that do not declare their own width/height.
pub const DEFAULT_DRAWING_SIZE: f64 = 100.0;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Node {
    #[serde(default, deserialize_with = "null_as_default")]
    pub node_id: String,
    #[serde(default = "default_node_name", deserialize_with = "null_as_node_name")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub x: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub y: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub node_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub symbol: String,
}

impl Node {
    pub fn new(id: &str, name: &str, x: f64, y: f64) -> Self {
        Self {
            node_id: id.to_string(),
            name: name.to_string(),
            x,
            y,
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, node_type: &str, symbol: &str) -> Self {
        self.node_type = node_type.to_string();
        self.symbol = symbol.to_string();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LinkLabel {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LinkEndpoint {
    #[serde(default, deserialize_with = "null_as_default")]
    pub node_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: Option<LinkLabel>,
}

impl LinkEndpoint {
    pub fn new(node_id: &str, label: Option<&str>) -> Self {
        Self {
            node_id: node_id.to_string(),
            label: label.map(|text| LinkLabel {
                text: text.to_string(),
            }),
        }
    }

    /// Label text, or `""` when the endpoint carries none.
    pub fn label_text(&self) -> &str {
        self.label.as_ref().map(|l| l.text.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Link {
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<LinkEndpoint>,
}

impl Link {
    pub fn between(a: LinkEndpoint, b: LinkEndpoint) -> Self {
        Self { nodes: vec![a, b] }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Drawing {
    #[serde(default, deserialize_with = "null_as_default")]
    pub x: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub y: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub svg: String,
}

impl Drawing {
    pub fn new(x: f64, y: f64, svg: &str) -> Self {
        Self {
            x,
            y,
            svg: svg.to_string(),
        }
    }

    /// Declared `(width, height)` of the fragment's root element.
    ///
    /// Each attribute falls back to [`DEFAULT_DRAWING_SIZE`] independently when
    /// it is missing or not a finite, non-negative number. A fragment that is
    /// not well-formed XML yields the default for both.
    pub fn declared_size(&self) -> (f64, f64) {
        let default = (DEFAULT_DRAWING_SIZE, DEFAULT_DRAWING_SIZE);
        if self.svg.trim().is_empty() {
            return default;
        }
        let Ok(doc) = roxmltree::Document::parse(&self.svg) else {
            return default;
        };
        let root = doc.root_element();
        let dimension = |name: &str| {
            root.attribute(name)
                .and_then(|raw| raw.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(DEFAULT_DRAWING_SIZE)
        };
        (dimension("width"), dimension("height"))
    }
}

/// Snapshot of one project's topology, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    pub drawings: Vec<Drawing>,
}

impl Topology {
    pub fn new(nodes: Vec<Node>, links: Vec<Link>, drawings: Vec<Drawing>) -> Self {
        Self {
            nodes,
            links,
            drawings,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty() && self.drawings.is_empty()
    }

    /// Build a topology from the three raw collections of a project document
    /// or API response. Missing collections are treated as empty.
    pub fn from_collections(
        nodes: Option<&Value>,
        links: Option<&Value>,
        drawings: Option<&Value>,
    ) -> Self {
        Self {
            nodes: parse_collection(nodes, "node"),
            links: parse_collection(links, "link"),
            drawings: parse_collection(drawings, "drawing"),
        }
    }
}

/// Parse a JSON array element by element, skipping entries that do not
/// deserialize instead of rejecting the whole collection.
pub fn parse_collection<T>(value: Option<&Value>, kind: &str) -> Vec<T>
where
    T: for<'de> Deserialize<'de>,
{
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| match T::deserialize(item) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::debug!(kind, index = idx, error = %err, "skipping malformed entry");
                None
            }
        })
        .collect()
}

fn default_node_name() -> String {
    "Node".to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_node_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_node_name))
}
