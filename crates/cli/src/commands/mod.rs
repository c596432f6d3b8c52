pub mod biz;
pub mod health;
