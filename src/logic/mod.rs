pub mod item_query;

pub use item_query::{get_items, shuffled_item_ids, ITEM_SHUFFLE_SEED};
