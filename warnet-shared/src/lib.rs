pub mod models;
pub mod pii;
pub mod minutes;

pub use pii::Masked;
