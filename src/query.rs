use serde_json::{json, Value as JsonValue};

use crate::value::{encode_value, DocValue};

/// Number of results requested when a query does not specify a limit.
pub const DEFAULT_LIMIT: u32 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryOperand {
    LessThan,
    LessThanOrEqual,
    Equal,
    NotEqual,
    GreaterThanOrEqual,
    GreaterThan,
    In,
    ArrayContains,
    ArrayContainsAny,
    IsNan,
    IsNull,
    /// Lexicographic prefix match, expanded into a two-sided range.
    StartsWith,
}

impl QueryOperand {
    /// Wire operator for operands that map onto a single field filter.
    fn field_op(&self) -> Option<&'static str> {
        match self {
            QueryOperand::LessThan => Some("LESS_THAN"),
            QueryOperand::LessThanOrEqual => Some("LESS_THAN_OR_EQUAL"),
            QueryOperand::Equal => Some("EQUAL"),
            QueryOperand::NotEqual => Some("NOT_EQUAL"),
            QueryOperand::GreaterThanOrEqual => Some("GREATER_THAN_OR_EQUAL"),
            QueryOperand::GreaterThan => Some("GREATER_THAN"),
            QueryOperand::In => Some("IN"),
            QueryOperand::ArrayContains => Some("ARRAY_CONTAINS"),
            QueryOperand::ArrayContainsAny => Some("ARRAY_CONTAINS_ANY"),
            QueryOperand::IsNan | QueryOperand::IsNull | QueryOperand::StartsWith => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryCondition {
    pub field: String,
    pub operand: QueryOperand,
    pub value: Option<DocValue>,
}

impl QueryCondition {
    pub fn new(field: impl Into<String>, operand: QueryOperand, value: impl Into<DocValue>) -> Self {
        Self {
            field: field.into(),
            operand,
            value: Some(value.into()),
        }
    }

    /// Condition without a value payload, for the unary operands.
    pub fn unary(field: impl Into<String>, operand: QueryOperand) -> Self {
        Self {
            field: field.into(),
            operand,
            value: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    fn wire_name(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASCENDING",
            OrderDirection::Desc => "DESCENDING",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryOrderBy {
    pub field: String,
    pub direction: OrderDirection,
}

/// A structured query description against a single collection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    /// Field paths to project; `None` returns full documents.
    pub select: Option<Vec<String>>,
    pub conditions: Vec<QueryCondition>,
    pub order_by: Vec<QueryOrderBy>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_condition(mut self, condition: QueryCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: OrderDirection) -> Self {
        self.order_by.push(QueryOrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Encodes a query into the `:runQuery` request body for `collection_id`.
pub fn encode_query(collection_id: &str, query: &Query) -> JsonValue {
    let filters: Vec<JsonValue> = query.conditions.iter().flat_map(condition_filters).collect();

    let order_by: Vec<JsonValue> = query
        .order_by
        .iter()
        .map(|order| {
            json!({
                "field": { "fieldPath": order.field },
                "direction": order.direction.wire_name()
            })
        })
        .collect();

    let mut structured = json!({
        "from": [{ "collectionId": collection_id }],
        "where": {
            "compositeFilter": { "op": "AND", "filters": filters }
        },
        "orderBy": order_by,
        "offset": query.offset.unwrap_or(0),
        "limit": query.limit.unwrap_or(DEFAULT_LIMIT),
    });
    if let Some(fields) = &query.select {
        let projected: Vec<JsonValue> = fields
            .iter()
            .map(|field| json!({ "fieldPath": field }))
            .collect();
        structured["select"] = json!({ "fields": projected });
    }

    json!({ "structuredQuery": structured })
}

fn condition_filters(condition: &QueryCondition) -> Vec<JsonValue> {
    match condition.operand {
        QueryOperand::IsNan | QueryOperand::IsNull => {
            let op = match condition.operand {
                QueryOperand::IsNan => "IS_NAN",
                _ => "IS_NULL",
            };
            vec![json!({
                "unaryFilter": {
                    "field": { "fieldPath": condition.field },
                    "op": op
                }
            })]
        }
        QueryOperand::StartsWith => {
            // Prefix match as a two-sided range: field >= value AND
            // field < value-with-last-char-incremented.
            let value = match &condition.value {
                Some(DocValue::String(value)) if !value.is_empty() => value,
                _ => return Vec::new(),
            };
            let upper = upper_bound(value);
            vec![
                field_filter(&condition.field, "GREATER_THAN_OR_EQUAL", &DocValue::from(value.as_str())),
                field_filter(&condition.field, "LESS_THAN", &DocValue::from(upper)),
            ]
        }
        _ => {
            let op = condition
                .operand
                .field_op()
                .expect("non-unary operands map to a field filter");
            let mut filter = json!({
                "fieldFilter": {
                    "field": { "fieldPath": condition.field },
                    "op": op
                }
            });
            if let Some(value) = &condition.value {
                if let Some(encoded) = encode_value(value, "", &mut Vec::new()) {
                    filter["fieldFilter"]["value"] = encoded;
                }
            }
            vec![filter]
        }
    }
}

fn field_filter(field: &str, op: &str, value: &DocValue) -> JsonValue {
    json!({
        "fieldFilter": {
            "field": { "fieldPath": field },
            "op": op,
            "value": encode_value(value, "", &mut Vec::new())
        }
    })
}

/// Smallest string lexicographically greater than every string starting with
/// `value`: the last character's code point incremented by one.
fn upper_bound(value: &str) -> String {
    let mut chars: Vec<char> = value.chars().collect();
    if let Some(last) = chars.pop() {
        let next = char::from_u32(last as u32 + 1).unwrap_or(char::MAX);
        chars.push(next);
    }
    chars.into_iter().collect()
}
