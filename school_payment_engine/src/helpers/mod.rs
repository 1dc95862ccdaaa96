mod order_ids;

pub use order_ids::new_order_id;
