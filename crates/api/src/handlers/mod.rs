pub mod batches;
pub mod webhooks;
