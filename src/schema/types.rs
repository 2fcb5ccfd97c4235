use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// How deep alias expansion may recurse before the name is kept as-is.
const MAX_ALIAS_DEPTH: usize = 16;

/// A normalized type expression attached to a schema field or slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "of", rename_all = "snake_case")]
pub enum TypeTree {
    Basic(String),
    Optional(Box<TypeTree>),
    Union(Vec<TypeTree>),
    List(Box<TypeTree>),
    /// Dictionary types keep their key/value text unparsed.
    Dict(String),
    /// A transparent envelope whose payload is the inner type.
    Wrapped(Box<TypeTree>),
}

/// Scalar and collection kinds that can be edited directly on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeKind {
    String,
    Int,
    Float,
    Bool,
    Dict,
    List,
}

impl NativeKind {
    /// The value an unconnected, undefaulted native input starts with.
    pub fn zero_value(&self) -> Value {
        match self {
            NativeKind::String => Value::String(String::new()),
            NativeKind::Int => Value::from(0),
            NativeKind::Float => Value::from(0.0),
            NativeKind::Bool => Value::Bool(false),
            NativeKind::Dict => Value::Object(Default::default()),
            NativeKind::List => Value::Array(Vec::new()),
        }
    }

    fn from_basic(name: &str) -> Option<Self> {
        match name {
            "str" | "string" | "String" => Some(NativeKind::String),
            "int" | "integer" => Some(NativeKind::Int),
            "float" | "number" => Some(NativeKind::Float),
            "bool" | "boolean" => Some(NativeKind::Bool),
            "dict" | "Dict" => Some(NativeKind::Dict),
            "list" | "List" => Some(NativeKind::List),
            _ => None,
        }
    }
}

impl TypeTree {
    pub fn basic(name: impl Into<String>) -> Self {
        TypeTree::Basic(name.into())
    }

    /// The native kind this type can be edited as, looking through
    /// wrappers, optionals and union members.
    pub fn native_kind(&self) -> Option<NativeKind> {
        match self {
            TypeTree::Basic(name) => NativeKind::from_basic(name),
            TypeTree::List(_) => Some(NativeKind::List),
            TypeTree::Dict(_) => Some(NativeKind::Dict),
            TypeTree::Wrapped(inner) | TypeTree::Optional(inner) => inner.native_kind(),
            TypeTree::Union(members) => members.iter().find_map(|m| m.native_kind()),
        }
    }

    pub fn is_optional(&self) -> bool {
        match self {
            TypeTree::Optional(_) => true,
            TypeTree::Union(members) => members.iter().any(|m| m.is_none()),
            _ => false,
        }
    }

    fn is_none(&self) -> bool {
        matches!(self, TypeTree::Basic(name) if name == "None")
    }
}

impl fmt::Display for TypeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTree::Basic(name) => write!(f, "{}", name),
            TypeTree::Optional(inner) => write!(f, "Optional[{}]", inner),
            TypeTree::Union(members) => {
                write!(f, "Union[")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", member)?;
                }
                write!(f, "]")
            }
            TypeTree::List(inner) => write!(f, "List[{}]", inner),
            TypeTree::Dict(raw) => write!(f, "Dict[{}]", raw),
            TypeTree::Wrapped(inner) => write!(f, "Wrapped[{}]", inner),
        }
    }
}

/// Builds `TypeTree`s from raw type expressions, expanding aliases.
pub struct TypeResolver<'a> {
    aliases: &'a AHashMap<String, String>,
}

impl<'a> TypeResolver<'a> {
    pub fn new(aliases: &'a AHashMap<String, String>) -> Self {
        Self { aliases }
    }

    /// Resolves a raw type expression. Never fails: anything that cannot be
    /// understood comes back as `TypeTree::Basic` holding the trimmed text.
    pub fn resolve(&self, raw: &str) -> TypeTree {
        self.resolve_at(raw, 0)
    }

    fn resolve_at(&self, raw: &str, depth: usize) -> TypeTree {
        let text = strip_quotes(raw.trim());
        if text.is_empty() {
            return TypeTree::Basic(raw.trim().to_string());
        }

        let alternatives = split_top_level(text, '|');
        if alternatives.len() > 1 {
            let members = alternatives
                .iter()
                .map(|part| self.resolve_at(part, depth))
                .collect();
            return normalize_union(members);
        }

        if let Some((head, inner)) = split_generic(text) {
            let head = head.rsplit('.').next().unwrap_or(head);
            return match head {
                "Optional" => TypeTree::Optional(Box::new(self.resolve_at(inner, depth))),
                "Union" => normalize_union(
                    split_top_level(inner, ',')
                        .iter()
                        .map(|part| self.resolve_at(part, depth))
                        .collect(),
                ),
                "List" | "list" | "Sequence" => {
                    TypeTree::List(Box::new(self.resolve_at(inner, depth)))
                }
                "Dict" | "dict" | "Mapping" => TypeTree::Dict(inner.trim().to_string()),
                "Wrapped" => TypeTree::Wrapped(Box::new(self.resolve_at(inner, depth))),
                "Annotated" => match split_top_level(inner, ',').first() {
                    Some(first) => self.resolve_at(first, depth),
                    None => TypeTree::Basic(text.to_string()),
                },
                _ => TypeTree::Basic(text.to_string()),
            };
        }

        if depth < MAX_ALIAS_DEPTH {
            if let Some(expansion) = self.aliases.get(text) {
                return self.resolve_at(expansion, depth + 1);
            }
        }
        TypeTree::Basic(text.to_string())
    }
}

/// Collapses `None` members of a union into an `Optional`.
fn normalize_union(members: Vec<TypeTree>) -> TypeTree {
    let has_none = members.iter().any(|m| m.is_none());
    let mut rest: Vec<TypeTree> = members.into_iter().filter(|m| !m.is_none()).collect();
    let core = match rest.len() {
        0 => return TypeTree::basic("None"),
        1 => rest.remove(0),
        _ => TypeTree::Union(rest),
    };
    if has_none {
        TypeTree::Optional(Box::new(core))
    } else {
        core
    }
}

fn strip_quotes(text: &str) -> &str {
    let bytes = text.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        text[1..text.len() - 1].trim()
    } else {
        text
    }
}

/// Splits `Head[inner]` when the bracket opened after `Head` closes at the
/// very end of the text. Unbalanced or trailing text yields `None`.
pub(crate) fn split_generic(text: &str) -> Option<(&str, &str)> {
    let open = text.find('[')?;
    let head = text[..open].trim();
    if head.is_empty() || !head.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
        return None;
    }
    let mut depth = 0usize;
    for (i, c) in text.char_indices().skip_while(|(i, _)| *i < open) {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return if i == text.len() - 1 {
                        Some((head, &text[open + 1..i]))
                    } else {
                        None
                    };
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits on `sep` wherever it is outside brackets and string quotes.
pub(crate) fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    let mut prev = '\0';
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if c == q && prev != '\\' {
                quote = None;
            }
        } else {
            match c {
                '"' | '\'' => quote = Some(c),
                '[' | '(' | '{' => depth += 1,
                ']' | ')' | '}' => depth -= 1,
                _ if c == sep && depth == 0 => {
                    parts.push(text[start..i].trim());
                    start = i + c.len_utf8();
                }
                _ => {}
            }
        }
        prev = c;
    }
    let tail = text[start..].trim();
    if !tail.is_empty() || !parts.is_empty() {
        parts.push(tail);
    }
    parts.retain(|p| !p.is_empty());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(raw: &str) -> TypeTree {
        let aliases = AHashMap::new();
        TypeResolver::new(&aliases).resolve(raw)
    }

    #[test]
    fn test_nested_generics() {
        let tree = resolve("Optional[List[Dict[str, List[int]]]]");
        assert_eq!(
            tree,
            TypeTree::Optional(Box::new(TypeTree::List(Box::new(TypeTree::Dict(
                "str, List[int]".to_string()
            )))))
        );
    }

    #[test]
    fn test_union_with_none_becomes_optional() {
        assert_eq!(
            resolve("Union[str, None]"),
            TypeTree::Optional(Box::new(TypeTree::basic("str")))
        );
        assert_eq!(
            resolve("int | str | None"),
            TypeTree::Optional(Box::new(TypeTree::Union(vec![
                TypeTree::basic("int"),
                TypeTree::basic("str"),
            ])))
        );
    }

    #[test]
    fn test_malformed_falls_back_to_basic() {
        assert_eq!(resolve("List[str"), TypeTree::basic("List[str"));
        assert_eq!(resolve("List[str]]"), TypeTree::basic("List[str]]"));
        assert_eq!(resolve("Foo[Bar]"), TypeTree::basic("Foo[Bar]"));
    }

    #[test]
    fn test_alias_expansion_is_bounded() {
        let mut aliases = AHashMap::new();
        aliases.insert("A".to_string(), "B".to_string());
        aliases.insert("B".to_string(), "A".to_string());
        aliases.insert("Text".to_string(), "Wrapped[str]".to_string());
        let resolver = TypeResolver::new(&aliases);

        assert!(matches!(resolver.resolve("A"), TypeTree::Basic(_)));
        assert_eq!(
            resolver.resolve("List[Text]"),
            TypeTree::List(Box::new(TypeTree::Wrapped(Box::new(TypeTree::basic("str")))))
        );
    }

    #[test]
    fn test_native_kind_sees_through_wrappers() {
        assert_eq!(resolve("Wrapped[int]").native_kind(), Some(NativeKind::Int));
        assert_eq!(
            resolve("Union[Agent, bool]").native_kind(),
            Some(NativeKind::Bool)
        );
        assert_eq!(resolve("Agent").native_kind(), None);
    }

    #[test]
    fn test_display_roundtrips_canonical_form() {
        let tree = resolve("typing.Optional[list[str]]");
        assert_eq!(tree.to_string(), "Optional[List[str]]");
    }
}
