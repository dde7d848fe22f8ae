mod order_status;
mod side;

pub use order_status::OrderStatus;
pub use side::Side;
