use graphstate_core::{JsonValue, Params};
use neo4rs::{BoltList, BoltMap, BoltNull, BoltType};

/// Binds every parameter onto `statement`.
pub(crate) fn to_query(statement: &str, params: &Params) -> neo4rs::Query {
    params
        .iter()
        .fold(neo4rs::query(statement), |query, (key, value)| {
            query.param(key.as_str(), to_bolt(value))
        })
}

pub(crate) fn to_bolt(value: &JsonValue) -> BoltType {
    match value {
        JsonValue::Null => BoltType::Null(BoltNull),
        JsonValue::Bool(value) => BoltType::from(*value),
        JsonValue::Number(number) => match (number.as_i64(), number.as_f64()) {
            (Some(int), _) => BoltType::from(int),
            (None, Some(float)) => BoltType::from(float),
            (None, None) => BoltType::from(number.to_string()),
        },
        JsonValue::String(text) => BoltType::from(text.as_str()),
        JsonValue::Array(items) => {
            let mut list = BoltList::default();
            for item in items {
                list.push(to_bolt(item));
            }
            BoltType::List(list)
        }
        JsonValue::Object(map) => {
            let mut bolt = BoltMap::default();
            for (key, item) in map {
                bolt.put(key.as_str().into(), to_bolt(item));
            }
            BoltType::Map(bolt)
        }
    }
}
