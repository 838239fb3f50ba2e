pub mod property;
mod unit;
