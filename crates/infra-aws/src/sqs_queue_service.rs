// SQS implementation of QueueService

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::QueueAttributeName;
use aws_sdk_sqs::Client;
use msgdelivery_core::domain::{QueueAttributes, QueueUrl, Tags};
use msgdelivery_core::port::queue_service::LIST_QUEUES_LIMIT;
use msgdelivery_core::port::{QueueService, QueueServiceError};
use std::collections::HashMap;
use tracing::debug;

pub struct SqsQueueService {
    client: Client,
}

impl SqsQueueService {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn request_error<E>(err: E) -> QueueServiceError
where
    E: std::error::Error,
{
    QueueServiceError::Request(DisplayErrorContext(err).to_string())
}

fn count(
    attributes: Option<&HashMap<QueueAttributeName, String>>,
    name: QueueAttributeName,
) -> Result<u64, QueueServiceError> {
    let raw = attributes
        .and_then(|attributes| attributes.get(&name))
        .ok_or_else(|| {
            QueueServiceError::MalformedResponse(format!("missing attribute {}", name.as_str()))
        })?;
    raw.parse().map_err(|_| {
        QueueServiceError::MalformedResponse(format!(
            "attribute {} is not a count: {}",
            name.as_str(),
            raw
        ))
    })
}

#[async_trait]
impl QueueService for SqsQueueService {
    async fn list_queues(&self, prefix: &str) -> Result<Vec<QueueUrl>, QueueServiceError> {
        let output = self
            .client
            .list_queues()
            .set_queue_name_prefix((!prefix.is_empty()).then(|| prefix.to_string()))
            .max_results(LIST_QUEUES_LIMIT as i32)
            .send()
            .await
            .map_err(request_error)?;

        debug!(prefix = %prefix, count = output.queue_urls().len(), "Listed queues");
        Ok(output.queue_urls().to_vec())
    }

    async fn get_attributes(
        &self,
        queue_url: &str,
    ) -> Result<QueueAttributes, QueueServiceError> {
        let output = self
            .client
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessagesNotVisible)
            .send()
            .await
            .map_err(request_error)?;

        Ok(QueueAttributes {
            visible: count(
                output.attributes(),
                QueueAttributeName::ApproximateNumberOfMessages,
            )?,
            in_flight: count(
                output.attributes(),
                QueueAttributeName::ApproximateNumberOfMessagesNotVisible,
            )?,
        })
    }

    async fn list_tags(&self, queue_url: &str) -> Result<Tags, QueueServiceError> {
        let output = self
            .client
            .list_queue_tags()
            .queue_url(queue_url)
            .send()
            .await
            .map_err(request_error)?;

        Ok(output.tags().cloned().unwrap_or_default())
    }
}
