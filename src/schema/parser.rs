use super::literal::decode_literal;
use super::model::{Field, FieldRole, SchemaModel};
use super::types::{TypeResolver, split_generic, split_top_level};
use ahash::AHashMap;
use serde_json::Value;
use tracing::debug;

/// Base classes that never count as a model's parent.
const BUILTIN_BASES: &[&str] = &[
    "object",
    "BaseModel",
    "Generic",
    "ABC",
    "Protocol",
    "TypedDict",
    "NamedTuple",
    "Enum",
    "str",
    "int",
];

/// Everything extracted from one schema text.
#[derive(Debug, Clone, Default)]
pub struct ParsedSchema {
    /// Models with inheritance already applied, keyed by name.
    pub models: AHashMap<String, SchemaModel>,
    /// Model names in declaration order.
    pub model_order: Vec<String>,
    pub field_roles: AHashMap<String, AHashMap<String, FieldRole>>,
    pub defaults: AHashMap<String, AHashMap<String, Value>>,
    pub constants: AHashMap<String, Value>,
    pub aliases: AHashMap<String, String>,
}

impl ParsedSchema {
    pub fn model(&self, name: &str) -> Option<&SchemaModel> {
        self.models.get(name)
    }

    /// Models in declaration order.
    pub fn models(&self) -> impl Iterator<Item = &SchemaModel> {
        self.model_order.iter().filter_map(|name| self.models.get(name))
    }

    /// Maps each model's `type` default to the first model declaring it.
    pub fn type_map(&self) -> AHashMap<String, String> {
        let mut map = AHashMap::new();
        for model in self.models() {
            if let Some(type_name) = model.type_default() {
                map.entry(type_name.to_string())
                    .or_insert_with(|| model.name.clone());
            }
        }
        map
    }
}

/// Parses class-like schema declarations into `SchemaModel`s.
///
/// Parsing is total: malformed lines are skipped and unparseable types fall
/// back to `TypeTree::Basic`, so every recognized class block yields a model.
pub struct SchemaParser;

impl SchemaParser {
    pub fn parse(text: &str) -> ParsedSchema {
        let lines = logical_lines(text);
        let (constants, aliases) = collect_bindings(&lines);
        let (declared, order) = scan_models(&lines, &constants, &aliases);

        let mut resolver = InheritanceResolver {
            declared: &declared,
            resolved: AHashMap::new(),
        };
        let mut schema = ParsedSchema {
            constants,
            aliases,
            model_order: order.clone(),
            ..Default::default()
        };

        for name in &order {
            let fields = resolver.resolve(name, &mut Vec::new());
            let parent = declared.get(name).and_then(|d| d.parent.clone());

            schema.field_roles.insert(
                name.clone(),
                fields.iter().map(|f| (f.name.clone(), f.role)).collect(),
            );
            schema.defaults.insert(
                name.clone(),
                fields
                    .iter()
                    .filter_map(|f| f.default.clone().map(|d| (f.name.clone(), d)))
                    .collect(),
            );
            schema.models.insert(
                name.clone(),
                SchemaModel {
                    name: name.clone(),
                    parent,
                    fields,
                },
            );
        }

        debug!(
            models = schema.models.len(),
            constants = schema.constants.len(),
            aliases = schema.aliases.len(),
            "parsed schema"
        );
        schema
    }
}

struct LogicalLine {
    indent: usize,
    text: String,
}

/// A triple-quoted string opened after the start of a line.
struct OpenString {
    indent: usize,
    prefix: String,
    delim: &'static str,
    body: String,
}

impl OpenString {
    /// The whole assignment with the string folded into one quoted literal.
    fn close(self, rest: &str) -> LogicalLine {
        let mut text = self.prefix;
        text.push('"');
        for c in self.body.chars() {
            match c {
                '"' | '\\' => {
                    text.push('\\');
                    text.push(c);
                }
                '\n' => text.push_str("\\n"),
                c => text.push(c),
            }
        }
        text.push('"');
        text.push_str(strip_comment(rest).trim_end());
        LogicalLine {
            indent: self.indent,
            text,
        }
    }
}

/// Strips comments and docstrings, folds mid-line triple-quoted strings, and
/// joins bracketed continuations.
///
/// A continuation ends early when a line dedents back to the opening line's
/// level, so an unclosed bracket costs one logical line rather than the rest
/// of the text.
fn logical_lines(text: &str) -> Vec<LogicalLine> {
    let mut lines = Vec::new();
    let mut docstring: Option<&'static str> = None;
    let mut open_string: Option<OpenString> = None;
    let mut pending: Option<(usize, String)> = None;

    for raw in text.lines() {
        if let Some(delim) = docstring {
            if raw.contains(delim) {
                docstring = None;
            }
            continue;
        }

        if let Some(mut open) = open_string.take() {
            open.body.push('\n');
            match raw.find(open.delim) {
                Some(end) => {
                    open.body.push_str(&raw[..end]);
                    let rest = &raw[end + open.delim.len()..];
                    lines.push(open.close(rest));
                }
                None => {
                    open.body.push_str(raw);
                    open_string = Some(open);
                }
            }
            continue;
        }

        let trimmed = raw.trim_start();
        let indent = indent_of(raw);

        if let Some((pending_indent, mut joined)) = pending.take() {
            let continues = trimmed.is_empty()
                || indent > pending_indent
                || (indent == pending_indent && trimmed.starts_with([']', ')', '}']));
            if continues {
                joined.push(' ');
                joined.push_str(strip_comment(raw).trim());
                if bracket_depth(&joined) > 0 {
                    pending = Some((pending_indent, joined));
                } else {
                    lines.push(LogicalLine {
                        indent: pending_indent,
                        text: joined,
                    });
                }
                continue;
            }
            lines.push(LogicalLine {
                indent: pending_indent,
                text: joined,
            });
        }

        for delim in TRIPLE_QUOTES {
            if let Some(rest) = trimmed.strip_prefix(delim) {
                if !rest.contains(delim) {
                    docstring = Some(delim);
                }
            }
        }
        if docstring.is_some() || TRIPLE_QUOTES.iter().any(|d| trimmed.starts_with(d)) {
            continue;
        }

        let content = strip_comment(trimmed).trim_end();
        if content.is_empty() {
            continue;
        }

        if let Some((start, delim)) = unclosed_triple_quote(content) {
            open_string = Some(OpenString {
                indent,
                prefix: content[..start].to_string(),
                delim,
                body: content[start + delim.len()..].to_string(),
            });
            continue;
        }

        if bracket_depth(content) > 0 {
            pending = Some((indent, content.to_string()));
        } else {
            lines.push(LogicalLine {
                indent,
                text: content.to_string(),
            });
        }
    }

    if let Some(open) = open_string {
        lines.push(open.close(""));
    }
    if let Some((indent, text)) = pending {
        lines.push(LogicalLine { indent, text });
    }
    lines
}

const TRIPLE_QUOTES: [&str; 2] = ["\"\"\"", "'''"];

fn indent_of(raw: &str) -> usize {
    raw.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Start of a triple-quote delimiter that opens on this line without closing.
fn unclosed_triple_quote(line: &str) -> Option<(usize, &'static str)> {
    TRIPLE_QUOTES
        .into_iter()
        .filter_map(|delim| {
            let start = line.find(delim)?;
            let after = &line[start + delim.len()..];
            (!after.contains(delim)).then_some((start, delim))
        })
        .min_by_key(|(start, _)| *start)
}

fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '#' => return &line[..i],
            None => {}
        }
    }
    line
}

fn bracket_depth(text: &str) -> i32 {
    let mut depth = 0;
    let mut quote: Option<char> = None;
    for c in text.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '[' | '(' | '{' => depth += 1,
                ']' | ')' | '}' => depth -= 1,
                _ => {}
            },
        }
    }
    depth
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn looks_like_type(text: &str) -> bool {
    let allowed = text.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && text.chars().all(|c| {
            c.is_alphanumeric() || matches!(c, '_' | '.' | '[' | ']' | ',' | ' ' | '|' | '"' | '\'')
        });
    // Two bare words in a row (`a if b`) is an expression, not a type.
    let mut last = ' ';
    let mut gap = false;
    for c in text.chars() {
        if c == ' ' {
            gap = true;
            continue;
        }
        if gap && (c.is_alphanumeric() || c == '_') && (last.is_alphanumeric() || last == '_' || last == ']') {
            return false;
        }
        gap = false;
        last = c;
    }
    allowed
}

/// Finds the first top-level `sep` that is not part of a comparison or walrus.
fn find_top_level(text: &str, sep: char) -> Option<usize> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for (k, &(i, c)) in chars.iter().enumerate() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '[' | '(' | '{' => depth += 1,
                ']' | ')' | '}' => depth -= 1,
                _ if c == sep && depth == 0 => {
                    if sep == '=' {
                        let prev = k.checked_sub(1).map(|p| chars[p].1);
                        let next = chars.get(k + 1).map(|n| n.1);
                        if next == Some('=') || matches!(prev, Some('=' | '!' | '<' | '>' | ':')) {
                            continue;
                        }
                    }
                    return Some(i);
                }
                _ => {}
            },
        }
    }
    None
}

/// Pass 1: module-level constants and type aliases.
fn collect_bindings(lines: &[LogicalLine]) -> (AHashMap<String, Value>, AHashMap<String, String>) {
    let mut constants = AHashMap::new();
    let mut aliases = AHashMap::new();

    for line in lines.iter().filter(|l| l.indent == 0) {
        let Some(eq) = find_top_level(&line.text, '=') else {
            continue;
        };
        let lhs = line.text[..eq].trim();
        let rhs = line.text[eq + 1..].trim();
        let (name, annotation) = match find_top_level(lhs, ':') {
            Some(colon) => (lhs[..colon].trim(), Some(lhs[colon + 1..].trim())),
            None => (lhs, None),
        };
        if !is_identifier(name) || rhs.is_empty() {
            continue;
        }

        if annotation.is_some_and(|a| a.ends_with("TypeAlias")) {
            aliases.insert(name.to_string(), rhs.to_string());
        } else if let Some(value) = decode_literal(rhs) {
            constants.insert(name.to_string(), value);
        } else if let Some(value) = constants.get(rhs).cloned() {
            constants.insert(name.to_string(), value);
        } else if annotation.is_none() && looks_like_type(rhs) {
            aliases.insert(name.to_string(), rhs.to_string());
        }
    }
    (constants, aliases)
}

struct RawField {
    name: String,
    raw_type: String,
    role: FieldRole,
    raw_default: Option<String>,
}

struct DeclaredModel {
    parent: Option<String>,
    fields: Vec<Field>,
}

struct BlockState {
    name: String,
    parent: Option<String>,
    fields: Vec<RawField>,
    body_indent: Option<usize>,
    skip_deeper_than: Option<usize>,
    pending_property: bool,
}

impl BlockState {
    fn push(&mut self, field: RawField) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }
}

/// Pass 2: a single linear scan collecting the raw fields of each class block.
fn scan_models(
    lines: &[LogicalLine],
    constants: &AHashMap<String, Value>,
    aliases: &AHashMap<String, String>,
) -> (AHashMap<String, DeclaredModel>, Vec<String>) {
    let resolver = TypeResolver::new(aliases);
    let mut declared = AHashMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut current: Option<BlockState> = None;

    let mut finish = |block: BlockState| {
        let fields = block
            .fields
            .into_iter()
            .map(|raw| Field {
                type_tree: resolver.resolve(&raw.raw_type),
                default: raw
                    .raw_default
                    .as_deref()
                    .and_then(|d| decode_default(d, constants, aliases)),
                name: raw.name,
                raw_type: raw.raw_type,
                role: raw.role,
            })
            .collect();
        if !order.contains(&block.name) {
            order.push(block.name.clone());
        }
        declared.insert(
            block.name,
            DeclaredModel {
                parent: block.parent,
                fields,
            },
        );
    };

    for line in lines {
        if line.indent == 0 {
            if let Some(block) = current.take() {
                finish(block);
            }
            if line.text.starts_with("class ") {
                match parse_class_header(&line.text) {
                    Some((name, parent)) => {
                        current = Some(BlockState {
                            name,
                            parent,
                            fields: Vec::new(),
                            body_indent: None,
                            skip_deeper_than: None,
                            pending_property: false,
                        })
                    }
                    None => debug!(line = %line.text, "skipping malformed class header"),
                }
            }
            continue;
        }

        let Some(block) = current.as_mut() else {
            continue;
        };
        let body_indent = *block.body_indent.get_or_insert(line.indent);
        if let Some(limit) = block.skip_deeper_than {
            if line.indent > limit {
                continue;
            }
            block.skip_deeper_than = None;
        }
        if line.indent != body_indent {
            continue;
        }

        let text = line.text.as_str();
        if let Some(decorator) = text.strip_prefix('@') {
            let name = decorator.split('(').next().unwrap_or_default().trim();
            if name.ends_with("property") {
                block.pending_property = true;
            }
            continue;
        }
        if text.starts_with("def ") || text.starts_with("async def ") {
            if std::mem::take(&mut block.pending_property) {
                match parse_property(text) {
                    Some(field) => block.push(field),
                    None => debug!(line = %text, "skipping property without return type"),
                }
            }
            block.skip_deeper_than = Some(line.indent);
            continue;
        }
        block.pending_property = false;
        if text.starts_with("class ") {
            block.skip_deeper_than = Some(line.indent);
            continue;
        }
        if let Some(field) = parse_field_line(text) {
            block.push(field);
        }
    }
    if let Some(block) = current.take() {
        finish(block);
    }
    (declared, order)
}

fn parse_class_header(text: &str) -> Option<(String, Option<String>)> {
    let body = text.strip_prefix("class ")?.trim().strip_suffix(':')?.trim();
    let (name, bases) = match body.find('(') {
        Some(open) => {
            let close = body.rfind(')')?;
            (body[..open].trim(), body.get(open + 1..close)?)
        }
        None => (body, ""),
    };
    if !is_identifier(name) {
        return None;
    }

    let parent = split_top_level(bases, ',')
        .into_iter()
        .filter(|base| !base.contains('='))
        .map(|base| base.split('[').next().unwrap_or(base).trim())
        .map(|base| base.rsplit('.').next().unwrap_or(base))
        .find(|base| is_identifier(base) && !BUILTIN_BASES.contains(base))
        .map(str::to_string);
    Some((name.to_string(), parent))
}

/// Splits `Annotated[T, tag, ...]` into `T` and the first recognized role tag.
fn split_role(raw_type: &str) -> (String, Option<FieldRole>) {
    if let Some((head, inner)) = split_generic(raw_type) {
        if head.rsplit('.').next() == Some("Annotated") {
            let args = split_top_level(inner, ',');
            if let Some((first, tags)) = args.split_first() {
                let role = tags.iter().find_map(|tag| FieldRole::from_tag(tag));
                return (first.to_string(), role);
            }
        }
    }
    (raw_type.to_string(), None)
}

fn parse_field_line(text: &str) -> Option<RawField> {
    let colon = find_top_level(text, ':')?;
    let name = text[..colon].trim();
    if !is_identifier(name) || name.starts_with('_') {
        return None;
    }
    let rest = &text[colon + 1..];
    let (type_part, default_part) = match find_top_level(rest, '=') {
        Some(eq) => (rest[..eq].trim(), Some(rest[eq + 1..].trim())),
        None => (rest.trim(), None),
    };
    if type_part.is_empty() || type_part.starts_with("ClassVar") {
        return None;
    }

    let (raw_type, tagged) = split_role(type_part);
    let role = tagged
        .or_else(|| default_part.and_then(role_from_field_call))
        .unwrap_or(FieldRole::Input);
    Some(RawField {
        name: name.to_string(),
        raw_type,
        role,
        raw_default: default_part.filter(|d| !d.is_empty()).map(str::to_string),
    })
}

/// `def name(self) -> T:` after a property decorator.
fn parse_property(text: &str) -> Option<RawField> {
    let signature = text.strip_prefix("async ").unwrap_or(text).strip_prefix("def ")?;
    let open = signature.find('(')?;
    let name = signature[..open].trim();
    if !is_identifier(name) {
        return None;
    }
    let arrow = signature.find("->")?;
    let ret = &signature[arrow + 2..];
    let ret = match find_top_level(ret, ':') {
        Some(colon) => ret[..colon].trim(),
        None => ret.trim(),
    };
    if ret.is_empty() {
        return None;
    }
    let (raw_type, role) = split_role(ret);
    Some(RawField {
        name: name.to_string(),
        raw_type,
        role: role.unwrap_or(FieldRole::Output),
        raw_default: None,
    })
}

fn field_call_args(raw: &str) -> Option<Vec<&str>> {
    let inner = raw.strip_prefix("Field(")?.strip_suffix(')')?;
    Some(split_top_level(inner, ','))
}

fn keyword_arg<'a>(arg: &'a str, key: &str) -> Option<&'a str> {
    let (name, value) = arg.split_once('=')?;
    (name.trim() == key).then(|| value.trim())
}

fn role_from_field_call(raw: &str) -> Option<FieldRole> {
    field_call_args(raw)?
        .into_iter()
        .find_map(|arg| keyword_arg(arg, "role"))
        .and_then(FieldRole::from_tag)
}

/// Decodes a raw default, substituting known constants and aliases.
fn decode_default(
    raw: &str,
    constants: &AHashMap<String, Value>,
    aliases: &AHashMap<String, String>,
) -> Option<Value> {
    let raw = raw.trim();
    if raw == "..." {
        return None;
    }
    if let Some(args) = field_call_args(raw) {
        for arg in &args {
            if let Some(value) = keyword_arg(arg, "default") {
                return decode_default(value, constants, aliases);
            }
            if let Some(factory) = keyword_arg(arg, "default_factory") {
                return match factory {
                    "list" => Some(Value::Array(Vec::new())),
                    "dict" => Some(Value::Object(Default::default())),
                    _ => None,
                };
            }
        }
        return args
            .first()
            .filter(|first| !first.contains('='))
            .and_then(|first| decode_default(first, constants, aliases));
    }
    if let Some(value) = decode_literal(raw) {
        return Some(value);
    }
    if let Some(value) = constants.get(raw) {
        return Some(value.clone());
    }
    if let Some(alias) = aliases.get(raw) {
        return Some(Value::String(alias.clone()));
    }
    Some(Value::String(raw.to_string()))
}

/// Pass 3: merges parent chains root-to-leaf, memoizing each model.
struct InheritanceResolver<'a> {
    declared: &'a AHashMap<String, DeclaredModel>,
    resolved: AHashMap<String, Vec<Field>>,
}

impl InheritanceResolver<'_> {
    fn resolve(&mut self, name: &str, visiting: &mut Vec<String>) -> Vec<Field> {
        if let Some(cached) = self.resolved.get(name) {
            return cached.clone();
        }
        let Some(model) = self.declared.get(name) else {
            return Vec::new();
        };
        if visiting.iter().any(|v| v == name) {
            debug!(model = name, "inheritance cycle, stopping walk");
            return Vec::new();
        }

        visiting.push(name.to_string());
        let mut fields = match &model.parent {
            Some(parent) => self.resolve(parent, visiting),
            None => Vec::new(),
        };
        visiting.pop();

        for own in &model.fields {
            match fields.iter_mut().find(|f| f.name == own.name) {
                Some(inherited) => *inherited = own.clone(),
                None => fields.push(own.clone()),
            }
        }
        self.resolved.insert(name.to_string(), fields.clone());
        fields
    }
}
