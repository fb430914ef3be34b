pub mod admin;
pub mod error;
pub mod order;
pub mod payment;
pub mod precondition;
pub mod product;
