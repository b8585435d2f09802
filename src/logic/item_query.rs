use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::collections::HashMap;

use crate::model::{Id, Item, ItemFilter, PageRequest};
use crate::store::{ItemStore, StoreResult};

/// Seed for the result-set shuffle. Changing it reorders every item listing.
pub const ITEM_SHUFFLE_SEED: u64 = 88;

/// Put `ids` in the stable pseudo-random order used for item listings.
///
/// Input is sorted and deduplicated first so the result only depends on the
/// set of ids, not on the order the store produced them in.
pub fn shuffle_ids(mut ids: Vec<Id>) -> Vec<Id> {
    ids.sort_unstable();
    ids.dedup();

    let mut rng = StdRng::seed_from_u64(ITEM_SHUFFLE_SEED);
    ids.shuffle(&mut rng);
    ids
}

pub fn page_slice(ids: &[Id], page: PageRequest) -> &[Id] {
    let start = page.offset().min(ids.len());
    let end = start.saturating_add(page.max_results).min(ids.len());
    &ids[start..end]
}

/// Arrange fetched rows to follow `ids`; rows not listed are dropped
pub fn order_by_ids(items: Vec<Item>, ids: &[Id]) -> Vec<Item> {
    let mut by_id: HashMap<Id, Item> = items.into_iter().map(|item| (item.id, item)).collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

/// Every id matching `filter`, in listing order
pub async fn shuffled_item_ids<S: ItemStore + ?Sized>(
    store: &S,
    filter: &ItemFilter,
) -> StoreResult<Vec<Id>> {
    let ids = store.find_item_ids(filter).await?;
    Ok(shuffle_ids(ids))
}

/// One page of items owned by the filter's anchor.
///
/// No filter (no anchor given) yields an empty page rather than an error.
pub async fn get_items<S: ItemStore + ?Sized>(
    store: &S,
    filter: Option<&ItemFilter>,
    page: PageRequest,
) -> StoreResult<Vec<Item>> {
    let Some(filter) = filter else {
        return Ok(Vec::new());
    };

    let ids = shuffled_item_ids(store, filter).await?;
    let page_ids = page_slice(&ids, page);
    log::debug!(
        "item query {:?}: {} matches, page {} returns {}",
        filter.anchor,
        ids.len(),
        page.page,
        page_ids.len()
    );
    if page_ids.is_empty() {
        return Ok(Vec::new());
    }

    let items = store.get_items_by_ids(page_ids).await?;
    Ok(order_by_ids(items, page_ids))
}
