use crate::db::queries;
use crate::error::{LedgerError, Result};
use crate::image::{EncodedImage, ImageFetcher};
use crate::models::CombinedRecord;
use crate::service::{combine, Extractor};
use sqlx::PgPool;

/// 账本识别服务: 各传输层共用的编排逻辑
pub struct LedgerService {
    extractor: Extractor,
    fetcher: ImageFetcher,
    pool: Option<PgPool>,
}

impl LedgerService {
    pub fn new(extractor: Extractor, fetcher: ImageFetcher, pool: Option<PgPool>) -> Self {
        Self {
            extractor,
            fetcher,
            pool,
        }
    }

    pub fn model_name(&self) -> &str {
        self.extractor.model_name()
    }

    /// 按提交顺序逐张识别后合并; 任意一张失败则整个请求失败
    pub async fn process_images(&self, images: Vec<EncodedImage>) -> Result<CombinedRecord> {
        if images.is_empty() {
            return Err(LedgerError::EmptyInput);
        }

        let total = images.len();
        let mut records = Vec::with_capacity(total);
        for (idx, image) in images.iter().enumerate() {
            tracing::info!("识别图片 {}/{} ({} bytes)", idx + 1, total, image.len());
            let record = self.extractor.extract(image).await.map_err(|e| {
                tracing::error!("图片 {}/{} 处理失败: {}", idx + 1, total, e);
                e
            })?;
            records.push(record);
        }

        let combined = combine(records);
        tracing::info!(
            "合并结果: date={:?}, location={:?}, {} items, total={:?}",
            combined.date,
            combined.location,
            combined.items.len(),
            combined.total_amount
        );

        if let Some(pool) = &self.pool {
            let receipt_id = queries::insert_receipt(pool, &combined).await?;
            tracing::info!("Receipt {} saved", receipt_id);
        }

        Ok(combined)
    }

    /// 先按顺序下载全部 URL, 再走 process_images
    pub async fn process_urls(&self, urls: &[String]) -> Result<CombinedRecord> {
        if urls.is_empty() {
            return Err(LedgerError::EmptyInput);
        }

        let mut images = Vec::with_capacity(urls.len());
        for url in urls {
            images.push(self.fetcher.fetch(url).await?);
        }
        self.process_images(images).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromptConfig;
    use crate::llm::VisionModel;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// 按调用顺序返回预置回复, 并记录收到的图片
    struct ScriptedModel {
        replies: Mutex<Vec<String>>,
        seen: Mutex<Vec<Vec<u8>>>,
    }

    impl ScriptedModel {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl VisionModel for ScriptedModel {
        async fn describe(&self, image: &EncodedImage, _: &str, _: &str) -> Result<String> {
            self.seen.lock().unwrap().push(image.data.clone());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| LedgerError::model("no scripted reply left"))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn service(model: Arc<ScriptedModel>) -> LedgerService {
        let extractor = Extractor::new(model, PromptConfig::default()).unwrap();
        let fetcher = ImageFetcher::new(Duration::from_secs(1)).unwrap();
        LedgerService::new(extractor, fetcher, None)
    }

    fn image(tag: u8) -> EncodedImage {
        EncodedImage::new("image/jpeg", vec![tag])
    }

    #[tokio::test]
    async fn images_are_processed_in_submission_order() {
        let model = ScriptedModel::new(&[
            r#"{"date":"2024-04-25","location":"ABC마트","items":[{"name":"우유","price":2000}],"total_amount":2000}"#,
            "```json\n{\"date\":null,\"location\":\"ABC마트 2호점\",\"items\":[{\"name\":\"빵\",\"price\":1500},{\"name\":\"계란\",\"price\":3000}],\"total_amount\":4500}\n```",
        ]);
        let svc = service(model.clone());

        let combined = svc.process_images(vec![image(1), image(2)]).await.unwrap();
        assert_eq!(combined.date.as_deref(), Some("2024-04-25"));
        assert_eq!(combined.location.as_deref(), Some("ABC마트"));
        assert_eq!(combined.items.len(), 3);
        assert_eq!(combined.items[0].name, "우유");
        assert_eq!(combined.total_amount, Some(4500));
        assert_eq!(*model.seen.lock().unwrap(), vec![vec![1u8], vec![2u8]]);
    }

    #[tokio::test]
    async fn empty_image_list_is_rejected() {
        let svc = service(ScriptedModel::new(&[]));
        assert!(matches!(
            svc.process_images(Vec::new()).await,
            Err(LedgerError::EmptyInput)
        ));
        assert!(matches!(
            svc.process_urls(&[]).await,
            Err(LedgerError::EmptyInput)
        ));
    }

    #[tokio::test]
    async fn first_failure_aborts_remaining_images() {
        let model = ScriptedModel::new(&["not json at all", r#"{"total_amount": 100}"#]);
        let svc = service(model.clone());

        let err = svc
            .process_images(vec![image(1), image(2)])
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::MalformedResponse { .. }));
        // 第二张图不会再发给模型
        assert_eq!(model.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unsupported_url_fails_before_model_call() {
        let model = ScriptedModel::new(&[r#"{}"#]);
        let svc = service(model.clone());

        let err = svc
            .process_urls(&["https://example.com/receipt.tiff".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnsupportedImageType(_)));
        assert!(model.seen.lock().unwrap().is_empty());
    }
}
