//! Checkout: settlement view and order placement

mod assembler;
mod id;

pub use assembler::OrderAssembler;
pub use id::generate_order_id;
