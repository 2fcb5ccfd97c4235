use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison kind of a conditional edge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionKind {
    Equals,
    Contains,
    Greater,
    Less,
    /// Free-form expression evaluated by the runner.
    Custom,
    #[default]
    Always,
    /// A kind this crate does not know, kept so it survives re-export.
    Other(String),
}

impl From<String> for ConditionKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "equals" | "eq" => ConditionKind::Equals,
            "contains" => ConditionKind::Contains,
            "greater" | "gt" => ConditionKind::Greater,
            "less" | "lt" => ConditionKind::Less,
            "custom" | "expression" => ConditionKind::Custom,
            "always" => ConditionKind::Always,
            _ => ConditionKind::Other(kind),
        }
    }
}

impl From<ConditionKind> for String {
    fn from(kind: ConditionKind) -> Self {
        match kind {
            ConditionKind::Equals => "equals".to_string(),
            ConditionKind::Contains => "contains".to_string(),
            ConditionKind::Greater => "greater".to_string(),
            ConditionKind::Less => "less".to_string(),
            ConditionKind::Custom => "custom".to_string(),
            ConditionKind::Always => "always".to_string(),
            ConditionKind::Other(kind) => kind,
        }
    }
}

/// The condition attached to an edge leaving a branching node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeCondition {
    #[serde(rename = "type", default)]
    pub kind: ConditionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl EdgeCondition {
    fn compare(kind: ConditionKind, field: impl Into<String>, value: Value) -> Self {
        Self {
            kind,
            field: Some(field.into()),
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(ConditionKind::Equals, field, value.into())
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(ConditionKind::Contains, field, value.into())
    }

    pub fn greater(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(ConditionKind::Greater, field, value.into())
    }

    pub fn less(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(ConditionKind::Less, field, value.into())
    }

    pub fn custom(expression: impl Into<String>) -> Self {
        Self {
            kind: ConditionKind::Custom,
            expression: Some(expression.into()),
            ..Default::default()
        }
    }

    pub fn always() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Human-readable label derived from the comparison kind.
    pub fn display_label(&self) -> String {
        let field = self.field.as_deref().unwrap_or("value");
        let value = self.value.as_ref().map(format_value).unwrap_or_default();
        match &self.kind {
            ConditionKind::Equals => format!("{} == {}", field, value),
            ConditionKind::Contains => format!("{} contains {}", field, value),
            ConditionKind::Greater => format!("{} > {}", field, value),
            ConditionKind::Less => format!("{} < {}", field, value),
            ConditionKind::Custom => self
                .expression
                .clone()
                .unwrap_or_else(|| "custom".to_string()),
            ConditionKind::Always => "always".to_string(),
            ConditionKind::Other(kind) => self.label.clone().unwrap_or_else(|| kind.clone()),
        }
    }

    /// Labels a decision edge may name its branch by, most specific first.
    pub fn branch_candidates(&self) -> Vec<String> {
        let value = self.value.as_ref().and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(_) | Value::Bool(_) => Some(v.to_string()),
            _ => None,
        });
        [value, self.field.clone(), self.label.clone()]
            .into_iter()
            .flatten()
            .collect()
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_labels() {
        assert_eq!(EdgeCondition::equals("status", "ok").display_label(), "status == \"ok\"");
        assert_eq!(EdgeCondition::contains("text", "err").display_label(), "text contains \"err\"");
        assert_eq!(EdgeCondition::greater("score", 5).display_label(), "score > 5");
        assert_eq!(EdgeCondition::less("score", 1.5).display_label(), "score < 1.5");
        assert_eq!(EdgeCondition::custom("x % 2 == 0").display_label(), "x % 2 == 0");
        assert_eq!(EdgeCondition::always().display_label(), "always");
    }

    #[test]
    fn test_unknown_kind_survives_serde() {
        let raw = json!({"type": "regex", "field": "text", "value": "^a"});
        let condition: EdgeCondition = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(condition.kind, ConditionKind::Other("regex".to_string()));
        assert_eq!(serde_json::to_value(&condition).unwrap(), raw);
    }

    #[test]
    fn test_branch_candidates_order() {
        let condition = EdgeCondition::equals("route", "gt5").with_label("big");
        assert_eq!(condition.branch_candidates(), vec!["gt5", "route", "big"]);
    }
}
