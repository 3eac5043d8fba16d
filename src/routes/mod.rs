// Re-export route modules
pub mod conversations;
pub mod messages;
