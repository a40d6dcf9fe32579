//! Integration tests for the event store and aggregate store

use rust_decimal_macros::dec;
use uuid::Uuid;

use swap_engine::aggregate::{Aggregate, Order, OrderStatus, Position};
use swap_engine::domain::OrderType;
use swap_engine::event_store::{drain_events, AggregateStore, EventStore, EventStoreError};

mod common;

fn new_market_order() -> Order {
    Order::accept(
        Uuid::new_v4(),
        Uuid::new_v4(),
        dec!(1000),
        "USDT".to_string(),
        "BTC".to_string(),
        OrderType::Market,
    )
    .unwrap()
}

#[tokio::test]
async fn test_append_and_load_stream() {
    let pool = common::setup_test_db().await;
    let event_store = EventStore::new(pool.clone());

    let mut order = new_market_order();
    order.quote_price(dec!(100000), dec!(0.01)).unwrap();
    let order_id = order.id();

    let events = drain_events(&mut order).unwrap();
    event_store.append(&events).await.unwrap();

    let stream = event_store.load(order_id).await.unwrap();
    assert_eq!(stream.len(), 2);
    assert_eq!(stream[0].event_type, "OrderAccepted");
    assert_eq!(stream[0].version, 1);
    assert_eq!(stream[1].event_type, "PriceQuoted");
    assert_eq!(stream[1].version, 2);

    // Every committed event has exactly one outbox mirror row
    for event in &events {
        assert_eq!(common::outbox_count(&pool, event.event_id).await, 1);
    }
}

#[tokio::test]
async fn test_load_from_version() {
    let pool = common::setup_test_db().await;
    let event_store = EventStore::new(pool);

    let mut order = new_market_order();
    order.quote_price(dec!(100000), dec!(0.01)).unwrap();
    order.start_swap_execution("swap-x".to_string()).unwrap();
    let order_id = order.id();

    event_store
        .append(&drain_events(&mut order).unwrap())
        .await
        .unwrap();

    let tail = event_store.load_from_version(order_id, 3).await.unwrap();
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].event_type, "SwapExecuting");
}

#[tokio::test]
async fn test_version_conflict() {
    let pool = common::setup_test_db().await;
    let event_store = EventStore::new(pool);

    let mut first = new_market_order();
    let order_id = first.id();
    event_store
        .append(&drain_events(&mut first).unwrap())
        .await
        .unwrap();

    // A second writer with a stale view produces the same version 2
    let mut a = event_store_load_order(&event_store, order_id).await;
    let mut b = event_store_load_order(&event_store, order_id).await;
    a.quote_price(dec!(100000), dec!(0.01)).unwrap();
    b.quote_price(dec!(99000), dec!(0.0101)).unwrap();

    event_store.append(&drain_events(&mut a).unwrap()).await.unwrap();
    let result = event_store.append(&drain_events(&mut b).unwrap()).await;
    assert!(matches!(
        result,
        Err(EventStoreError::VersionConflict { version: 2, .. })
    ));

    // The losing write left nothing behind
    let stream = event_store.load(order_id).await.unwrap();
    assert_eq!(stream.len(), 2);
}

#[tokio::test]
async fn test_duplicate_event_id() {
    let pool = common::setup_test_db().await;
    let event_store = EventStore::new(pool);

    let mut order = new_market_order();
    let events = drain_events(&mut order).unwrap();
    event_store.append(&events).await.unwrap();

    // Same event_id, different aggregate and version
    let mut duplicate = events[0].clone();
    duplicate.aggregate_id = Uuid::new_v4();
    duplicate.version = 1;

    let result = event_store.append(&[duplicate]).await;
    assert!(matches!(result, Err(EventStoreError::Duplicate(id)) if id == events[0].event_id));
}

#[tokio::test]
async fn test_multi_aggregate_append_is_atomic() {
    let pool = common::setup_test_db().await;
    let event_store = EventStore::new(pool);

    let mut order = new_market_order();
    let order_id = order.id();
    event_store
        .append(&drain_events(&mut order).unwrap())
        .await
        .unwrap();

    let mut position = Position::open(Uuid::new_v4(), Uuid::new_v4());
    let position_id = position.id();
    event_store
        .append(&drain_events(&mut position).unwrap())
        .await
        .unwrap();

    // One fresh event for the position, one stale (conflicting) event for
    // the order: the whole write must abort.
    let mut stale_order = event_store_load_order(&event_store, order_id).await;
    stale_order.quote_price(dec!(100000), dec!(0.01)).unwrap();
    let mut stale_events = drain_events(&mut stale_order).unwrap();
    stale_events[0].version = 1; // collides with OrderAccepted

    let mut position = load_position(&event_store, position_id).await;
    position.close("test").unwrap();
    let mut combined = drain_events(&mut position).unwrap();
    combined.extend(stale_events);

    let result = event_store.append(&combined).await;
    assert!(result.is_err());

    // Neither event landed
    assert_eq!(event_store.load(order_id).await.unwrap().len(), 1);
    assert_eq!(event_store.load(position_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_aggregate_store_round_trip() {
    let pool = common::setup_test_db().await;
    let store = AggregateStore::new(pool);

    let mut order = new_market_order();
    order.quote_price(dec!(100000), dec!(0.01)).unwrap();
    let order_id = order.id();

    let saved = store.save(&mut order).await.unwrap();
    assert_eq!(saved, 2);
    assert!(order.uncommitted().is_empty());

    // Saving again with an empty buffer is a no-op
    assert_eq!(store.save(&mut order).await.unwrap(), 0);

    let loaded: Order = store.load(order_id).await.unwrap();
    assert_eq!(loaded.id(), order.id());
    assert_eq!(loaded.status(), OrderStatus::Pending);
    assert_eq!(loaded.from_amount(), dec!(1000));
    assert_eq!(loaded.to_amount(), Some(dec!(0.01)));
    assert_eq!(loaded.version(), 2);
    assert!(loaded.uncommitted().is_empty());

    // Replay is deterministic
    let again: Order = store.load(order_id).await.unwrap();
    assert_eq!(again.status(), loaded.status());
    assert_eq!(again.version(), loaded.version());
    assert_eq!(again.to_amount(), loaded.to_amount());
}

#[tokio::test]
async fn test_load_missing_aggregate() {
    let pool = common::setup_test_db().await;
    let store = AggregateStore::new(pool);

    let result: Result<Order, _> = store.load(Uuid::new_v4()).await;
    assert!(matches!(result, Err(EventStoreError::AggregateNotFound(_))));
}

async fn event_store_load_order(event_store: &EventStore, order_id: Uuid) -> Order {
    let mut order = Order::default();
    for row in event_store.load(order_id).await.unwrap() {
        let event = serde_json::from_value(row.event_data).unwrap();
        order.replay(&event);
    }
    order
}

async fn load_position(event_store: &EventStore, position_id: Uuid) -> Position {
    let mut position = Position::default();
    for row in event_store.load(position_id).await.unwrap() {
        let event = serde_json::from_value(row.event_data).unwrap();
        position.replay(&event);
    }
    position
}
