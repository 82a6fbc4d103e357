use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// 欄位別名表：(標準欄位名, 依優先順序排列的來源欄位名)
pub type FieldAliases = &'static [(&'static str, &'static [&'static str])];

/// 依別名表把遠端紀錄正規化為標準欄位名。
///
/// 每個標準欄位取第一個非空的來源值，其餘別名會被移除；
/// 表中沒有列出的欄位原樣保留。
pub fn normalize_fields(raw: Map<String, Value>, aliases: FieldAliases) -> Map<String, Value> {
    let mut record = raw;
    let mut normalized = Map::new();

    for (canonical, sources) in aliases {
        let mut chosen = None;
        for source in sources.iter() {
            if let Some(value) = record.remove(*source) {
                if chosen.is_none() && !is_blank(&value) {
                    chosen = Some(value);
                }
            }
        }
        if let Some(value) = chosen {
            normalized.insert(canonical.to_string(), value);
        }
    }

    for (key, value) in record {
        normalized.entry(key).or_insert(value);
    }

    normalized
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// 接受非負整數、整數值的浮點數（如 120.0）或數字字串；負數、小數與超出範圍的值視為缺值
pub fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f < u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Some(Value::String(s)) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    })
}

/// 接受字串陣列、單一字串或 null；非字串元素略過
pub fn string_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    })
}
