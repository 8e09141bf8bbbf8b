use crate::models::{CombinedRecord, ReceiptRecord};

/// 按提交顺序合并多张图片的识别结果
///
/// - date / location: 取第一个非空值
/// - items: 按顺序拼接, 不去重
/// - total_amount: 取最后一个存在的值 (0 也算存在)
pub fn combine<I>(records: I) -> CombinedRecord
where
    I: IntoIterator<Item = ReceiptRecord>,
{
    let mut combined = CombinedRecord::empty();

    for record in records {
        if combined.date.is_none() {
            combined.date = non_empty(record.date);
        }
        if combined.location.is_none() {
            combined.location = non_empty(record.location);
        }
        combined.items.extend(record.items);
        if record.total_amount.is_some() {
            combined.total_amount = record.total_amount;
        }
    }

    combined
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
