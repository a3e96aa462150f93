//! Domain layer: value objects, aggregates, events and the refund calculator
pub mod aggregates;
pub mod events;
pub mod refund;
pub mod value_objects;

pub use aggregates::{Cart, CartLine, NewCartLine, Sale, StoreCredit};
pub use refund::{calculate_refund, DiscountBasis, RefundBreakdown, ReturnRequest, ReturnedLine};
pub use value_objects::{percentage_of, Discount, Money, Percentage, Quantity};
