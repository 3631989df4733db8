use std::cmp::Ordering;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use super::StoreError;

/// 存储中的文档
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// 文档ID（路径最后一段）
    pub id: String,
    /// 文档字段
    pub data: Map<String, Value>,
    /// 写入顺序，用于排序键相同时的稳定排序
    pub seq: u64,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Map<String, Value>, seq: u64) -> Self {
        Self {
            id: id.into(),
            data,
            seq,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// 反序列化为模型，文档ID以 `id` 字段注入
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut data = self.data.clone();
        data.insert("id".to_string(), Value::String(self.id.clone()));
        Ok(serde_json::from_value(Value::Object(data))?)
    }
}

/// 写入模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// 整体覆盖
    Replace,
    /// 与现有字段合并
    Merge,
}

/// 排序键
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: false,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: true,
        }
    }
}

/// 一次写入的字段集合
///
/// 时间戳字段由存储端赋值（毫秒），保证同一存储内严格递增。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    values: Map<String, Value>,
    server_timestamps: Vec<String>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从可序列化的对象构造，对象必须序列化为 JSON object
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, StoreError> {
        match serde_json::to_value(value)? {
            Value::Object(values) => Ok(Self {
                values,
                server_timestamps: Vec::new(),
            }),
            other => Err(StoreError::Backend(format!(
                "expected an object, got {}",
                other
            ))),
        }
    }

    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn server_timestamp(mut self, name: &str) -> Self {
        self.values.remove(name);
        self.server_timestamps.push(name.to_string());
        self
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn server_timestamp_fields(&self) -> &[String] {
        &self.server_timestamps
    }

    pub fn has_server_timestamps(&self) -> bool {
        !self.server_timestamps.is_empty()
    }

    /// 用存储时钟填充时间戳字段
    pub(crate) fn resolve(self, now_millis: i64) -> Map<String, Value> {
        let mut values = self.values;
        for name in self.server_timestamps {
            values.insert(name, Value::from(now_millis));
        }
        values
    }
}

/// 按排序键排序，键相同或缺失时按写入顺序
pub(crate) fn sort_documents(documents: &mut [Document], order: Option<&OrderBy>) {
    documents.sort_by(|a, b| {
        let by_field = match order {
            Some(order) => {
                let ordering = compare_values(a.field(&order.field), b.field(&order.field));
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            }
            None => Ordering::Equal,
        };
        by_field.then(a.seq.cmp(&b.seq))
    });
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, data: Value, seq: u64) -> Document {
        match data {
            Value::Object(map) => Document::new(id, map, seq),
            _ => unreachable!(),
        }
    }

    #[test]
    fn sort_breaks_ties_by_insertion_order() {
        let mut docs = vec![
            doc("c", json!({"createdAt": 5}), 3),
            doc("a", json!({"createdAt": 5}), 1),
            doc("b", json!({"createdAt": 2}), 2),
        ];
        sort_documents(&mut docs, Some(&OrderBy::asc("createdAt")));
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn missing_sort_key_sorts_first() {
        let mut docs = vec![
            doc("stamped", json!({"createdAt": 1}), 1),
            doc("pending", json!({}), 2),
        ];
        sort_documents(&mut docs, Some(&OrderBy::asc("createdAt")));
        assert_eq!(docs[0].id, "pending");
    }

    #[test]
    fn server_timestamp_fields_are_resolved() {
        let fields = Fields::new()
            .set("text", "hi")
            .set("createdAt", 1)
            .server_timestamp("createdAt");
        let values = fields.resolve(42);
        assert_eq!(values.get("createdAt"), Some(&json!(42)));
        assert_eq!(values.get("text"), Some(&json!("hi")));
    }

    #[test]
    fn decode_injects_document_id() {
        #[derive(serde::Deserialize)]
        struct Named {
            id: String,
            name: String,
        }
        let named: Named = doc("g1", json!({"name": "Park"}), 0).decode().unwrap();
        assert_eq!(named.id, "g1");
        assert_eq!(named.name, "Park");
    }
}
