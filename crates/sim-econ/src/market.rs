//! Market clearing: price-time priority matching per `(region, item)`.
//!
//! Bids are ranked highest price first, asks lowest price first, ties broken
//! by creation order (lower order id first). While the best bid crosses the
//! best ask the two trade `min(remaining)` units at the price of whichever
//! order was created first (the resting, maker order). Markets are visited in
//! ascending `(region, item)` order and matching inside a market depends only
//! on the sort key above, so a given world always clears to the same trades.

use crate::ledger::settle_reserved;
use serde::Serialize;
use sim_core::{
    CompanyId, ItemId, OrderId, OrderSide, RegionId, SimError, StockKey, Tick, Trade, TradeId,
    WorldState,
};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::debug;

/// Matching view of one open order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quote {
    /// Also the time priority: lower ids were created first.
    pub order_id: OrderId,
    pub company_id: CompanyId,
    /// Limit price per unit.
    pub price_cents: i64,
    /// Unfilled units.
    pub remaining: u64,
}

/// One match produced by [`match_book`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Fill {
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub buyer_company_id: CompanyId,
    pub seller_company_id: CompanyId,
    /// Limit price of the bid; the buyer reserved cash at this price.
    pub bid_price_cents: i64,
    /// Execution price: the limit of the earlier-created order.
    pub price_cents: i64,
    /// `min` of both orders' remaining units.
    pub quantity: u64,
}

/// Open orders of one market, split by side.
#[derive(Clone, Debug, Default)]
pub struct Book {
    /// Best first: highest price, then lowest id.
    pub bids: Vec<Quote>,
    /// Best first: lowest price, then lowest id.
    pub asks: Vec<Quote>,
}

/// Collect the open books of every market that has orders on both sides.
pub fn collect_books(world: &WorldState) -> BTreeMap<(RegionId, ItemId), Book> {
    let mut books: BTreeMap<(RegionId, ItemId), Book> = BTreeMap::new();
    for o in world.orders.iter().filter(|o| o.is_open()) {
        let quote = Quote {
            order_id: o.id,
            company_id: o.company_id,
            price_cents: o.price_cents,
            remaining: o.remaining,
        };
        let book = books.entry((o.region_id, o.item_id)).or_default();
        match o.side {
            OrderSide::Buy => book.bids.push(quote),
            OrderSide::Sell => book.asks.push(quote),
        }
    }
    books.retain(|_, b| !b.bids.is_empty() && !b.asks.is_empty());
    books
}

/// Match one book. Pure: the caller applies the fills.
pub fn match_book(book: &Book) -> Vec<Fill> {
    let mut bids = book.bids.clone();
    let mut asks = book.asks.clone();
    bids.sort_by_key(|q| (Reverse(q.price_cents), q.order_id));
    asks.sort_by_key(|q| (q.price_cents, q.order_id));

    let mut fills = Vec::new();
    let (mut b, mut a) = (0usize, 0usize);
    while b < bids.len() && a < asks.len() {
        let bid = &mut bids[b];
        let ask = &mut asks[a];
        if bid.price_cents < ask.price_cents {
            break;
        }
        let quantity = bid.remaining.min(ask.remaining);
        if quantity > 0 {
            let price_cents = if bid.order_id < ask.order_id {
                bid.price_cents
            } else {
                ask.price_cents
            };
            fills.push(Fill {
                buy_order_id: bid.order_id,
                sell_order_id: ask.order_id,
                buyer_company_id: bid.company_id,
                seller_company_id: ask.company_id,
                bid_price_cents: bid.price_cents,
                price_cents,
                quantity,
            });
            bid.remaining -= quantity;
            ask.remaining -= quantity;
        }
        if bid.remaining == 0 {
            b += 1;
        }
        if ask.remaining == 0 {
            a += 1;
        }
    }
    fills
}

fn apply_fill(
    world: &mut WorldState,
    region: RegionId,
    item: ItemId,
    fill: &Fill,
    tick: Tick,
) -> Result<Trade, SimError> {
    settle_reserved(
        world,
        fill.buyer_company_id,
        fill.seller_company_id,
        fill.bid_price_cents,
        fill.price_cents,
        fill.quantity,
    )?;
    world.inventory.add(
        StockKey::new(fill.buyer_company_id, region, item),
        fill.quantity,
    )?;
    for id in [fill.buy_order_id, fill.sell_order_id] {
        let order = world
            .order_mut(id)
            .ok_or(SimError::not_found("order", id.0))?;
        order.remaining = order
            .remaining
            .checked_sub(fill.quantity)
            .ok_or(SimError::Overflow("order remaining"))?;
        order.status = order.fill_status();
    }
    let id = TradeId(world.allocate_id()?);
    Ok(Trade {
        id,
        tick,
        region_id: region,
        item_id: item,
        price_cents: fill.price_cents,
        quantity: fill.quantity,
        buyer_company_id: fill.buyer_company_id,
        seller_company_id: fill.seller_company_id,
        buy_order_id: fill.buy_order_id,
        sell_order_id: fill.sell_order_id,
    })
}

/// Clear every market for `tick`, appending trades to the world and
/// returning the ones created.
pub fn clear_markets(world: &mut WorldState, tick: Tick) -> Result<Vec<Trade>, SimError> {
    let books = collect_books(world);
    let mut trades = Vec::new();
    for ((region, item), book) in &books {
        let fills = match_book(book);
        for fill in &fills {
            trades.push(apply_fill(world, *region, *item, fill, tick)?);
        }
        if !fills.is_empty() {
            debug!(%region, %item, fills = fills.len(), "market cleared");
        }
    }
    world.trades.extend(trades.iter().cloned());
    Ok(trades)
}
