pub mod guards;

pub use guards::User;
