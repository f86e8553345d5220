//! Maps a pointer target inside rendered markup back to the diagram element it belongs to.
//!
//! Each diagram grammar encodes element identity differently, so identification is an ordered list
//! of pure strategies over the raw `id` attribute, most specific first.

use regex::Regex;
use std::sync::LazyLock;

/// Attribute a raw id was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IdAttribute {
    #[default]
    Id,
    DataId,
}

impl IdAttribute {
    pub fn name(self) -> &'static str {
        match self {
            IdAttribute::Id => "id",
            IdAttribute::DataId => DATA_ID_ATTR,
        }
    }
}

/// Identity of a rendered element: the name the user wrote plus the compiler's backing id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMatch {
    pub logical_id: String,
    pub raw_id: String,
    pub id_attribute: IdAttribute,
}

/// Read-only view of an element in the rendered markup tree.
pub trait MarkupNode: Sized {
    fn tag_name(&self) -> &str;
    fn attribute(&self, name: &str) -> Option<&str>;
    fn parent_element(&self) -> Option<Self>;
    fn is_same_node(&self, other: &Self) -> bool;

    fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .is_some_and(|c| c.split_whitespace().any(|token| token == class))
    }
}

impl<'a, 'input: 'a> MarkupNode for roxmltree::Node<'a, 'input> {
    fn tag_name(&self) -> &str {
        roxmltree::Node::tag_name(self).name()
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        roxmltree::Node::attribute(self, name)
    }

    fn parent_element(&self) -> Option<Self> {
        roxmltree::Node::parent_element(self)
    }

    fn is_same_node(&self, other: &Self) -> bool {
        self == other
    }
}

/// A single identification strategy: raw id in, logical id out.
pub type IdStrategy = fn(&str) -> Option<String>;

/// Class names marking an element as a diagram entity even when it is not an identified group.
pub const SEMANTIC_ROLES: &[&str] = &["node", "actor", "task", "section", "state"];

/// Attribute consulted when a semantic element has no `id`.
pub const DATA_ID_ATTR: &str = "data-id";

// The optional `<prefix>-` lets ids namespaced by the render id (`mermaid-17-flowchart-A-0`) match.
static FLOWCHART_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|-)flowchart-(.+)-\d+$").unwrap());
static STATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|-)state-(.+?)-\d+$").unwrap());
static ACTOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|-)actor-(.+)-\d+$").unwrap());
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([A-Za-z0-9_]+)-\d+$").unwrap());
static PREFIXED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]+-(.+)-\d+$").unwrap());

fn capture(re: &Regex, raw: &str) -> Option<String> {
    let caps = re.captures(raw)?;
    let id = caps.get(1)?.as_str();
    (!id.is_empty()).then(|| id.to_string())
}

pub fn flowchart_id(raw: &str) -> Option<String> {
    capture(&FLOWCHART_RE, raw)
}

pub fn state_id(raw: &str) -> Option<String> {
    capture(&STATE_RE, raw)
}

pub fn actor_id(raw: &str) -> Option<String> {
    capture(&ACTOR_RE, raw)
}

pub fn word_id(raw: &str) -> Option<String> {
    capture(&WORD_RE, raw)
}

pub fn prefixed_id(raw: &str) -> Option<String> {
    capture(&PREFIXED_RE, raw)
}

/// Strategies in priority order. Generic patterns come last so they cannot swallow a
/// grammar-specific prefix.
pub const DEFAULT_STRATEGIES: &[IdStrategy] =
    &[flowchart_id, state_id, actor_id, word_id, prefixed_id];

#[derive(Debug, Clone)]
pub struct NodeResolver {
    strategies: Vec<IdStrategy>,
}

impl Default for NodeResolver {
    fn default() -> Self {
        Self {
            strategies: DEFAULT_STRATEGIES.to_vec(),
        }
    }
}

impl NodeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategies(strategies: Vec<IdStrategy>) -> Self {
        Self { strategies }
    }

    /// Runs the strategies in order against a raw id; the first hit wins.
    pub fn logical_id(&self, raw_id: &str) -> Option<String> {
        self.strategies.iter().find_map(|strategy| strategy(raw_id))
    }

    /// Walks from `target` up to (not including) `root` and returns the first identifiable
    /// element. `None` means the pointer landed on empty canvas or unidentifiable decoration.
    pub fn resolve<N: MarkupNode>(&self, target: N, root: &N) -> Option<NodeMatch> {
        let mut current = Some(target);
        while let Some(node) = current {
            if node.is_same_node(root) {
                break;
            }
            if let Some(found) = self.match_element(&node) {
                tracing::debug!(logical_id = %found.logical_id, raw_id = %found.raw_id, "resolved node");
                return Some(found);
            }
            current = node.parent_element();
        }
        tracing::trace!("pointer target did not resolve to a diagram element");
        None
    }

    fn match_element<N: MarkupNode>(&self, node: &N) -> Option<NodeMatch> {
        let id = node.attribute("id").filter(|id| !id.is_empty());

        if node.tag_name() == "g" {
            if let Some(raw) = id {
                if let Some(logical_id) = self.logical_id(raw) {
                    return Some(NodeMatch {
                        logical_id,
                        raw_id: raw.to_string(),
                        id_attribute: IdAttribute::Id,
                    });
                }
            }
        }

        if !SEMANTIC_ROLES.iter().any(|role| node.has_class(role)) {
            return None;
        }
        let (raw, id_attribute) = match id {
            Some(raw) => (raw, IdAttribute::Id),
            None => (
                node.attribute(DATA_ID_ATTR).filter(|id| !id.is_empty())?,
                IdAttribute::DataId,
            ),
        };
        let logical_id = self.logical_id(raw).unwrap_or_else(|| raw.to_string());
        Some(NodeMatch {
            logical_id,
            raw_id: raw.to_string(),
            id_attribute,
        })
    }
}
