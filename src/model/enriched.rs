use std::collections::HashSet;

use serde_json::Value;

use super::SchedulableOrder;

/// A schedulable order with its JSON-bearing fields parsed exactly once.
///
/// A single fitness evaluation inspects the color and material sets O(N)
/// times per generation, so the parse happens here, up front. Malformed or
/// absent payloads degrade to empty sets and a missing customer: the cost
/// model must stay total over arbitrary store contents.
#[derive(Debug, Clone)]
pub struct EnrichedOrder {
    pub order: SchedulableOrder,
    pub colors: HashSet<String>,
    pub materials: HashSet<String>,
    /// Opaque customer identifier, compared only for equality.
    pub customer_id: Option<Value>,
}

impl EnrichedOrder {
    pub fn new(order: SchedulableOrder) -> Self {
        let colors = parse_token_set(order.colors_json.as_deref());
        let materials = parse_token_set(order.materials_json.as_deref());
        let customer_id = parse_customer_id(order.customer_json.as_deref());
        Self {
            order,
            colors,
            materials,
            customer_id,
        }
    }

    pub fn id(&self) -> i64 {
        self.order.id
    }

    pub fn num_colors(&self) -> u32 {
        self.colors.len() as u32
    }
}

/// Number of distinct color tokens an order demands; 0 when the payload is
/// missing or unreadable.
pub(crate) fn color_count(order: &SchedulableOrder) -> u32 {
    parse_token_set(order.colors_json.as_deref()).len() as u32
}

fn parse_token_set(raw: Option<&str>) -> HashSet<String> {
    let raw = match raw {
        Some(r) if !r.is_empty() && r != "null" => r,
        _ => return HashSet::new(),
    };
    let values: Vec<Value> = match serde_json::from_str(raw) {
        Ok(values) => values,
        Err(why) => {
            log::warn!("Treating unreadable token list {raw:?} as empty: {why}");
            return HashSet::new();
        }
    };
    values
        .into_iter()
        .map(|value| match value {
            Value::String(token) => token,
            other => other.to_string(),
        })
        .collect()
}

fn parse_customer_id(raw: Option<&str>) -> Option<Value> {
    let value: Value = serde_json::from_str(raw?).ok()?;
    match value.get("customer_id") {
        Some(Value::Null) | None => None,
        Some(id) => Some(id.clone()),
    }
}
