pub mod campaign;
pub mod milestone;

pub use campaign::Entity as Campaign;
pub use milestone::Entity as Milestone;
