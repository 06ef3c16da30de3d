use serde_json::Value;

use super::feed::ChangeEvent;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("Filter must look like column=eq.value, got {0:?}")]
    Malformed(String),
    #[error("Unsupported filter operator {0:?}, only eq is available")]
    UnsupportedOperator(String),
}

/// Equality filter on one column, written `column=eq.value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelFilter {
    pub column: String,
    pub value: String,
}

impl ChannelFilter {
    pub fn parse(raw: &str) -> Result<Self, FilterError> {
        let (column, rest) = raw
            .split_once('=')
            .ok_or_else(|| FilterError::Malformed(raw.to_string()))?;
        let (operator, value) = rest
            .split_once('.')
            .ok_or_else(|| FilterError::Malformed(raw.to_string()))?;
        let column = column.trim();
        if column.is_empty() {
            return Err(FilterError::Malformed(raw.to_string()));
        }
        if operator != "eq" {
            return Err(FilterError::UnsupportedOperator(operator.to_string()));
        }
        Ok(Self {
            column: column.to_string(),
            value: value.to_string(),
        })
    }

    /// True when either the new or the previous row image has `column == value`,
    /// so rows leaving the filtered set also count.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.matches_record(&event.record)
            || event
                .old_record
                .as_ref()
                .is_some_and(|old| self.matches_record(old))
    }

    fn matches_record(&self, record: &Value) -> bool {
        match record.get(&self.column) {
            Some(Value::String(s)) => *s == self.value,
            Some(Value::Number(n)) => n.to_string() == self.value,
            Some(Value::Bool(b)) => b.to_string() == self.value,
            Some(Value::Null) => self.value == "null",
            _ => false,
        }
    }
}
