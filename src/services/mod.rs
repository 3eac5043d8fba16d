pub mod evaluator;
pub mod participants;
pub mod sweeper;
pub mod visibility;

pub use sweeper::ExpirationSweeper;
pub use visibility::VisibilityService;
