use serde::{Deserialize, Deserializer, Serialize};

/// 小票明细行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub price: u64, // 整数金额, 不带币种
}

impl LineItem {
    pub fn new(name: impl Into<String>, price: u64) -> Self {
        Self {
            name: name.into(),
            price,
        }
    }
}

/// 单张图片的识别结果
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReceiptRecord {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub total_amount: Option<u64>,
}

/// 多张图片合并后的最终结果
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CombinedRecord {
    pub date: Option<String>,
    pub location: Option<String>,
    pub items: Vec<LineItem>,
    pub total_amount: Option<u64>,
}

impl CombinedRecord {
    /// date/location/total 为 null, items 为空
    pub fn empty() -> Self {
        Self::default()
    }
}

/// `"items": null` 与缺省同样视为空列表
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<LineItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<LineItem>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_default_to_empty() {
        let record: ReceiptRecord = serde_json::from_value(json!({})).unwrap();
        assert_eq!(record, ReceiptRecord::default());
    }

    #[test]
    fn null_items_become_empty() {
        let record: ReceiptRecord =
            serde_json::from_value(json!({"items": null, "total_amount": 0})).unwrap();
        assert!(record.items.is_empty());
        assert_eq!(record.total_amount, Some(0));
    }

    #[test]
    fn fractional_price_is_rejected() {
        let result: Result<ReceiptRecord, _> =
            serde_json::from_value(json!({"items": [{"name": "우유", "price": 1999.5}]}));
        assert!(result.is_err());
    }

    #[test]
    fn negative_total_is_rejected() {
        let result: Result<ReceiptRecord, _> =
            serde_json::from_value(json!({"total_amount": -100}));
        assert!(result.is_err());
    }

    #[test]
    fn empty_combined_record_serializes_nulls() {
        let value = serde_json::to_value(CombinedRecord::empty()).unwrap();
        assert_eq!(
            value,
            json!({"date": null, "location": null, "items": [], "total_amount": null})
        );
    }
}
