pub use super::benefits::Entity as Benefits;
pub use super::centers::Entity as Centers;
