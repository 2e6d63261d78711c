use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::TreeError;

/// A JSON-shaped value whose containers are shared copy-on-write.
///
/// Pointers follow RFC 6901 (`""` is the root, `/a/0/b` walks a map key, a
/// list index, then another key; `~1` escapes `/` and `~0` escapes `~`).
///
/// # Examples
///
/// ```
/// use draftstore::Node;
/// use serde_json::json;
///
/// let before = Node::from(json!({ "todos": ["a"], "filter": { "done": false } }));
/// let mut after = before.clone();
/// after.set("/todos/-", Node::from("b")).unwrap();
///
/// assert_eq!(after.pointer("/todos/1").and_then(Node::as_str), Some("b"));
/// assert!(after
///     .pointer("/filter")
///     .unwrap()
///     .shares_with(before.pointer("/filter").unwrap()));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum Node {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(Arc<str>),
    List(Arc<Vec<Node>>),
    Map(Arc<BTreeMap<String, Node>>),
}

impl Node {
    /// An empty map.
    pub fn map() -> Self {
        Node::Map(Arc::new(BTreeMap::new()))
    }

    /// An empty list.
    pub fn list() -> Self {
        Node::List(Arc::new(Vec::new()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Node::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Node::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Node>> {
        match self {
            Node::Map(entries) => Some(&**entries),
            _ => None,
        }
    }

    /// Whether `self` and `other` are the same shared container.
    ///
    /// Scalars never share; two equal strings or numbers return `false`.
    pub fn shares_with(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::List(a), Node::List(b)) => Arc::ptr_eq(a, b),
            (Node::Map(a), Node::Map(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn child(&self, token: &str) -> Option<&Node> {
        match self {
            Node::Map(entries) => entries.get(token),
            Node::List(items) => items.get(parse_index(token)?),
            _ => None,
        }
    }

    fn child_mut(&mut self, token: &str) -> Option<&mut Node> {
        match self {
            Node::Map(entries) => Arc::make_mut(entries).get_mut(token),
            Node::List(items) => {
                let index = parse_index(token)?;
                Arc::make_mut(items).get_mut(index)
            }
            _ => None,
        }
    }

    fn lookup(&self, tokens: &[String]) -> Option<&Node> {
        tokens
            .iter()
            .try_fold(self, |target, token| target.child(token))
    }

    fn lookup_mut(&mut self, tokens: &[String]) -> Option<&mut Node> {
        self.lookup(tokens)?;

        let mut target = self;
        for token in tokens {
            target = target.child_mut(token)?;
        }
        Some(target)
    }

    /// Look up a value by pointer.
    pub fn pointer(&self, pointer: &str) -> Option<&Node> {
        let tokens = parse_pointer(pointer).ok()?;
        self.lookup(&tokens)
    }

    /// Look up a value by pointer for writing.
    ///
    /// Every container on the path is copied if it is shared; siblings of the
    /// path stay shared. A pointer that does not resolve copies nothing.
    pub fn pointer_mut(&mut self, pointer: &str) -> Option<&mut Node> {
        let tokens = parse_pointer(pointer).ok()?;
        self.lookup_mut(&tokens)
    }

    /// Write `value` at `pointer`, returning the value it replaced.
    ///
    /// The parent must exist. A map parent gains the key if it is missing; a
    /// list parent accepts an existing index or `-` to append.
    pub fn set(&mut self, pointer: &str, value: Node) -> Result<Option<Node>, TreeError> {
        let mut tokens = parse_pointer(pointer)?;
        let Some(last) = tokens.pop() else {
            return Ok(Some(std::mem::replace(self, value)));
        };
        let parent = self
            .lookup_mut(&tokens)
            .ok_or_else(|| TreeError::MissingParent(pointer.to_string()))?;

        match parent {
            Node::Map(entries) => Ok(Arc::make_mut(entries).insert(last, value)),
            Node::List(items) => {
                let items = Arc::make_mut(items);
                if last == "-" {
                    items.push(value);
                    return Ok(None);
                }
                match parse_index(&last) {
                    Some(index) if index < items.len() => {
                        Ok(Some(std::mem::replace(&mut items[index], value)))
                    }
                    Some(index) if index == items.len() => {
                        items.push(value);
                        Ok(None)
                    }
                    _ => Err(TreeError::IndexOutOfBounds {
                        pointer: pointer.to_string(),
                        index: last,
                    }),
                }
            }
            _ => Err(TreeError::NotAContainer(pointer.to_string())),
        }
    }

    /// Remove and return the value at `pointer`. The root cannot be removed.
    pub fn remove(&mut self, pointer: &str) -> Option<Node> {
        let mut tokens = parse_pointer(pointer).ok()?;
        let last = tokens.pop()?;
        self.lookup(&tokens)?.child(&last)?;

        match self.lookup_mut(&tokens)? {
            Node::Map(entries) => Arc::make_mut(entries).remove(&last),
            Node::List(items) => {
                let index = parse_index(&last)?;
                Some(Arc::make_mut(items).remove(index))
            }
            _ => None,
        }
    }
}

/// Split a pointer into unescaped tokens. `~` must be followed by `0` or `1`.
fn parse_pointer(pointer: &str) -> Result<Vec<String>, TreeError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let invalid = || TreeError::InvalidPointer(pointer.to_string());
    let rest = pointer.strip_prefix('/').ok_or_else(invalid)?;

    rest.split('/')
        .map(|raw| {
            let mut token = String::with_capacity(raw.len());
            let mut chars = raw.chars();
            while let Some(c) = chars.next() {
                match c {
                    '~' => match chars.next() {
                        Some('0') => token.push('~'),
                        Some('1') => token.push('/'),
                        _ => return Err(invalid()),
                    },
                    c => token.push(c),
                }
            }
            Ok(token)
        })
        .collect()
}

fn parse_index(token: &str) -> Option<usize> {
    if token.starts_with('+') || (token.len() > 1 && token.starts_with('0')) {
        return None;
    }
    token.parse().ok()
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Null => serializer.serialize_unit(),
            Node::Bool(b) => serializer.serialize_bool(*b),
            Node::Number(n) => n.serialize(serializer),
            Node::String(s) => serializer.serialize_str(s),
            Node::List(items) => serializer.collect_seq(items.iter()),
            Node::Map(entries) => serializer.collect_map(entries.iter()),
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(b),
            Value::Number(n) => Node::Number(n),
            Value::String(s) => Node::String(s.into()),
            Value::Array(items) => Node::List(Arc::new(items.into_iter().map(Node::from).collect())),
            Value::Object(entries) => Node::Map(Arc::new(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Node::from(value)))
                    .collect(),
            )),
        }
    }
}

impl From<&Node> for Value {
    fn from(node: &Node) -> Self {
        match node {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Number(n) => Value::Number(n.clone()),
            Node::String(s) => Value::String(s.to_string()),
            Node::List(items) => Value::Array(items.iter().map(Value::from).collect()),
            Node::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Bool(b)
    }
}

impl From<i64> for Node {
    fn from(n: i64) -> Self {
        Node::Number(n.into())
    }
}

impl From<f64> for Node {
    /// Non-finite floats become `Null`, as in JSON.
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Node::Null, Node::Number)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::String(s.into())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::String(s.into())
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Node::List(Arc::new(items))
    }
}

impl From<BTreeMap<String, Node>> for Node {
    fn from(entries: BTreeMap<String, Node>) -> Self {
        Node::Map(Arc::new(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Node {
        Node::from(json!({
            "todos": [
                { "title": "write docs", "done": false },
                { "title": "ship", "done": false }
            ],
            "filter": { "show": "all" },
            "a/b": { "c~d": 1 }
        }))
    }

    #[test]
    fn pointer_reads_nested_values() {
        let node = sample();

        assert_eq!(
            node.pointer("/todos/1/title").and_then(Node::as_str),
            Some("ship")
        );
        assert_eq!(node.pointer("/a~1b/c~0d").and_then(Node::as_i64), Some(1));
        assert!(node.pointer("").is_some());
        assert!(node.pointer("/todos/01").is_none());
        assert!(node.pointer("/todos/9").is_none());
        assert!(node.pointer("todos").is_none());
    }

    #[test]
    fn pointer_mut_copies_only_the_path() {
        let before = sample();
        let mut after = before.clone();

        *after.pointer_mut("/todos/0/done").unwrap() = Node::from(true);

        assert_eq!(before.pointer("/todos/0/done"), Some(&Node::Bool(false)));
        assert!(!after.shares_with(&before));
        assert!(!after
            .pointer("/todos")
            .unwrap()
            .shares_with(before.pointer("/todos").unwrap()));
        assert!(after
            .pointer("/todos/1")
            .unwrap()
            .shares_with(before.pointer("/todos/1").unwrap()));
        assert!(after
            .pointer("/filter")
            .unwrap()
            .shares_with(before.pointer("/filter").unwrap()));
    }

    #[test]
    fn missing_pointer_copies_nothing() {
        let before = sample();
        let mut after = before.clone();

        assert!(after.pointer_mut("/todos/0/missing").is_none());
        assert!(after.shares_with(&before));
    }

    #[test]
    fn set_inserts_replaces_and_appends() {
        let mut node = sample();

        assert_eq!(node.set("/filter/sort", Node::from("date")), Ok(None));
        assert_eq!(
            node.set("/filter/show", Node::from("done")),
            Ok(Some(Node::from("all")))
        );
        assert_eq!(node.set("/todos/-", Node::map()), Ok(None));
        assert_eq!(node.set("/todos/3", Node::Null), Ok(None));
        assert_eq!(node.pointer("/todos").and_then(Node::as_list).map(<[Node]>::len), Some(4));
        assert_eq!(node.set("/a~1b/c~0d", Node::from(2_i64)), Ok(Some(Node::from(1_i64))));
    }

    #[test]
    fn set_reports_bad_targets() {
        let mut node = sample();

        assert_eq!(
            node.set("filter", Node::Null),
            Err(TreeError::InvalidPointer("filter".to_string()))
        );
        assert_eq!(
            node.set("/nope/x", Node::Null),
            Err(TreeError::MissingParent("/nope/x".to_string()))
        );
        assert_eq!(
            node.set("/filter/show/x", Node::Null),
            Err(TreeError::NotAContainer("/filter/show/x".to_string()))
        );
        assert!(matches!(
            node.set("/todos/7", Node::Null),
            Err(TreeError::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn set_root_replaces_everything() {
        let mut node = sample();
        let old = node.set("", Node::from(5_i64)).unwrap();

        assert_eq!(node, Node::from(5_i64));
        assert!(old.unwrap().as_map().is_some());
    }

    #[test]
    fn remove_from_map_and_list() {
        let mut node = sample();

        assert_eq!(node.remove("/filter/show"), Some(Node::from("all")));
        let removed = node.remove("/todos/0").unwrap();
        assert_eq!(removed.pointer("/title").and_then(Node::as_str), Some("write docs"));
        assert_eq!(node.pointer("/todos/0/title").and_then(Node::as_str), Some("ship"));
        assert!(node.remove("/todos/5").is_none());
        assert!(node.remove("").is_none());
    }

    #[test]
    fn malformed_escapes_are_rejected() {
        let mut node = Node::from(json!({ "a": 1, "~": 2, "x~2": 3 }));

        for pointer in ["/a~", "/~", "/x~2"] {
            assert_eq!(
                node.set(pointer, Node::Null),
                Err(TreeError::InvalidPointer(pointer.to_string()))
            );
            assert!(node.pointer(pointer).is_none());
            assert!(node.pointer_mut(pointer).is_none());
            assert!(node.remove(pointer).is_none());
        }

        assert_eq!(node.remove("/~0"), Some(Node::from(2_i64)));
        assert_eq!(node.pointer("/a").and_then(Node::as_i64), Some(1));
    }

    #[test]
    fn escaped_keys_resolve_their_parent() {
        let mut node = sample();

        assert_eq!(node.set("/a~1b/e~1f", Node::from(true)), Ok(None));
        assert_eq!(node.pointer("/a~1b/e~1f"), Some(&Node::Bool(true)));
        assert_eq!(node.remove("/a~1b/c~0d"), Some(Node::from(1_i64)));
        assert!(node.pointer("/a~1b/c~0d").is_none());
    }

    #[test]
    fn serializes_like_the_json_it_came_from() {
        let source = json!({ "n": 1.5, "list": [true, null, "x"], "m": {} });
        let node = Node::from(source.clone());

        assert_eq!(serde_json::to_value(&node).unwrap(), source);
        assert_eq!(Value::from(&node), source);

        let parsed: Node = serde_json::from_value(source).unwrap();
        assert_eq!(parsed, node);
    }

    #[test]
    fn non_finite_floats_become_null() {
        assert!(Node::from(f64::NAN).is_null());
    }
}
