pub mod create_broadcast;
pub mod retry_failed;
