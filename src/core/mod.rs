pub mod conversion;
pub mod currency;
