// Re-export model modules
mod conversion;
mod currencies;
mod rates;

pub use conversion::*;
pub use currencies::*;
pub use rates::*;
