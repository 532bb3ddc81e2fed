// MessageDelivery Infrastructure - AWS Adapters
// Implements: QueueService (SQS), Orchestrator (ECS)

pub mod ecs_orchestrator;
pub mod sdk_config;
pub mod sqs_queue_service;

pub use ecs_orchestrator::EcsOrchestrator;
pub use sdk_config::{load_aws_config, AwsSettings};
pub use sqs_queue_service::SqsQueueService;
