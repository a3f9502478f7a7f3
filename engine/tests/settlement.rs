mod common;

use common::{advance, harness, order};
use engine::{SettlementApplied, TradeStore};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use shared::{Direction, TradeError, TradeEvent, TradeOutcome};
use uuid::Uuid;

#[tokio::test(start_paused = true)]
async fn buy_win_settles_on_schedule() {
    let mut h = harness();
    h.funded(1, dec!(1000)).await;

    let trade = h
        .state
        .trading
        .place_trade(1, order("BTC-USDT", Direction::Buy, dec!(100), 300))
        .await
        .unwrap();
    assert_eq!(trade.entry_price, dec!(50000));
    assert_eq!(trade.profit_rate, dec!(0.85));
    assert_eq!(h.balance(1).await, dec!(900));

    h.prices.set_price("BTC", dec!(50100)).await;
    advance(299).await;
    assert!(!h.store.find_trade(trade.id).await.unwrap().unwrap().is_settled());

    advance(2).await;
    let settled = h.store.find_trade(trade.id).await.unwrap().unwrap();
    let s = settled.settlement.clone().expect("settled after expiry");
    assert_eq!(s.outcome, TradeOutcome::Win);
    assert_eq!(s.exit_price, dec!(50100));
    assert_eq!(s.commission, dec!(1));
    assert_eq!(s.net_profit, dec!(84));
    assert_eq!(s.payout, dec!(185));
    assert!(s.settled_at >= settled.settlement_time);
    assert_eq!(h.balance(1).await, dec!(1084));

    let events = h.drain_events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0].1, TradeEvent::Placed { .. }));
    assert_eq!(
        events[1],
        (
            1,
            TradeEvent::Settled {
                trade_id: trade.id,
                outcome: TradeOutcome::Win,
                net_profit: dec!(84),
                payout: dec!(185),
            }
        )
    );
}

#[tokio::test(start_paused = true)]
async fn sell_loses_when_price_rises() {
    let h = harness();
    h.funded(2, dec!(50)).await;

    let trade = h
        .state
        .trading
        .place_trade(2, order("eth", Direction::Sell, dec!(50), 100))
        .await
        .unwrap();
    assert_eq!(trade.profit_rate, dec!(0.20));
    assert_eq!(h.balance(2).await, Decimal::ZERO);

    h.prices.set_price("ETH", dec!(2550)).await;
    advance(101).await;

    let s = h.store.find_trade(trade.id).await.unwrap().unwrap().settlement.unwrap();
    assert_eq!(s.outcome, TradeOutcome::Lose);
    assert_eq!(s.net_profit, dec!(-50));
    assert_eq!(s.payout, Decimal::ZERO);
    assert_eq!(h.balance(2).await, Decimal::ZERO);
}

#[tokio::test(start_paused = true)]
async fn long_sell_pays_top_tier() {
    let h = harness();
    h.funded(3, dec!(20)).await;

    let trade = h
        .state
        .trading
        .place_trade(3, order("SOL/USDT", Direction::Sell, dec!(20), 600))
        .await
        .unwrap();
    h.prices.set_price("SOL", dec!(290)).await;
    advance(601).await;

    let s = h.store.find_trade(trade.id).await.unwrap().unwrap().settlement.unwrap();
    assert_eq!(s.outcome, TradeOutcome::Win);
    assert_eq!(s.net_profit, dec!(7.8));
    assert_eq!(h.balance(3).await, dec!(27.8));
}

#[tokio::test(start_paused = true)]
async fn unchanged_price_is_a_loss() {
    let h = harness();
    h.funded(4, dec!(10)).await;

    let trade = h
        .state
        .trading
        .place_trade(4, order("BTC", Direction::Buy, dec!(10), 60))
        .await
        .unwrap();
    advance(61).await;

    let s = h.store.find_trade(trade.id).await.unwrap().unwrap().settlement.unwrap();
    assert_eq!(s.outcome, TradeOutcome::Lose);
    assert_eq!(h.balance(4).await, Decimal::ZERO);
}

#[tokio::test(start_paused = true)]
async fn second_settlement_is_a_no_op() {
    let mut h = harness();
    h.funded(5, dec!(100)).await;

    let trade = h
        .state
        .trading
        .place_trade(5, order("BTC", Direction::Buy, dec!(100), 60))
        .await
        .unwrap();
    h.prices.set_price("BTC", dec!(50500)).await;
    advance(61).await;

    let first = h.store.find_trade(trade.id).await.unwrap().unwrap();
    let balance = h.balance(5).await;

    h.prices.set_price("BTC", dec!(10)).await;
    let again = h.state.settlement.settle(trade.id).await.unwrap();
    assert!(matches!(again, SettlementApplied::AlreadySettled(_)));
    assert_eq!(again.trade(), &first);
    assert_eq!(h.balance(5).await, balance);

    let settled_events = h
        .drain_events()
        .into_iter()
        .filter(|(_, e)| matches!(e, TradeEvent::Settled { .. }))
        .count();
    assert_eq!(settled_events, 1);
}

#[tokio::test(start_paused = true)]
async fn settlement_waits_for_expiry() {
    let h = harness();
    h.funded(6, dec!(100)).await;

    let trade = h
        .state
        .trading
        .place_trade(6, order("BTC", Direction::Buy, dec!(100), 200))
        .await
        .unwrap();
    let err = h.state.settlement.settle(trade.id).await.unwrap_err();
    assert!(matches!(err, TradeError::NotYetDue { trade_id, .. } if trade_id == trade.id));
    assert_eq!(h.balance(6).await, Decimal::ZERO);

    assert!(matches!(
        h.state.settlement.settle(Uuid::new_v4()).await,
        Err(TradeError::TradeNotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn price_outage_delays_but_never_fakes_settlement() {
    let h = harness();
    h.funded(7, dec!(100)).await;

    let trade = h
        .state
        .trading
        .place_trade(7, order("BTC", Direction::Buy, dec!(100), 60))
        .await
        .unwrap();
    h.prices.set_price("BTC", dec!(50200)).await;
    h.prices.fail_next(4);

    advance(60).await;
    // Backoff: 200ms, 400ms, 800ms, 1.6s.
    assert!(!h.store.find_trade(trade.id).await.unwrap().unwrap().is_settled());

    advance(5).await;
    let settled = h.store.find_trade(trade.id).await.unwrap().unwrap();
    let s = settled.settlement.unwrap();
    assert_eq!(s.exit_price, dec!(50200));
    assert_eq!(s.outcome, TradeOutcome::Win);
    assert!(s.settled_at > settled.settlement_time);
}

#[tokio::test(start_paused = true)]
async fn owner_settle_gives_up_while_the_timer_keeps_trying() {
    let h = harness();
    h.funded(9, dec!(100)).await;

    let trade = h
        .state
        .trading
        .place_trade(9, order("BTC", Direction::Buy, dec!(100), 60))
        .await
        .unwrap();
    h.prices.remove("BTC").await;
    advance(61).await;

    let attempt = tokio::time::timeout(
        std::time::Duration::from_secs(60),
        h.state.trading.settle_now(9, trade.id),
    )
    .await
    .expect("owner settlement answers within a minute");
    assert!(matches!(attempt, Err(TradeError::PriceUnavailable { ref symbol, .. }) if symbol == "BTC"));
    assert!(!h.store.find_trade(trade.id).await.unwrap().unwrap().is_settled());
    assert_eq!(h.state.settlement.pending(), 1);

    h.prices.set_price("BTC", dec!(50500)).await;
    advance(5).await;
    let s = h.store.find_trade(trade.id).await.unwrap().unwrap().settlement.unwrap();
    assert_eq!(s.exit_price, dec!(50500));
    assert_eq!(s.outcome, TradeOutcome::Win);
    assert_eq!(h.state.settlement.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn recovery_rearms_trades_without_timers() {
    let h = harness();
    h.funded(8, dec!(100)).await;

    // Opened straight through the store, as if by a process that has since exited.
    let trade = h
        .store
        .open_trade(
            engine::NewTrade {
                id: Uuid::new_v4(),
                user_id: 8,
                symbol: "ETH".into(),
                direction: Direction::Sell,
                stake: dec!(40),
                duration_secs: 60,
                entry_price: dec!(2500),
                terms: shared::PayoutSchedule::default().quote(Direction::Sell, 60).unwrap(),
                start_time: chrono::Utc::now() - chrono::Duration::seconds(120),
                settlement_time: chrono::Utc::now() - chrono::Duration::seconds(60),
            },
            true,
        )
        .await
        .unwrap();

    h.prices.set_price("ETH", dec!(2400)).await;
    assert_eq!(h.state.settlement.recover().await.unwrap(), 1);
    advance(1).await;

    let s = h.store.find_trade(trade.id).await.unwrap().unwrap().settlement.unwrap();
    assert_eq!(s.outcome, TradeOutcome::Win);
    assert_eq!(h.balance(8).await, dec!(60) + dec!(40) + dec!(40) * dec!(0.08) - dec!(0.4));
    assert_eq!(h.state.settlement.recover().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn balance_moves_by_net_profit_per_trade() {
    let h = common::harness_with(false);
    h.funded(9, dec!(1000)).await;

    let orders = [
        ("BTC", Direction::Buy, dec!(100), 60, dec!(50001)),
        ("ETH", Direction::Sell, dec!(75), 100, dec!(2499)),
        ("SOL", Direction::Buy, dec!(25), 300, dec!(299)),
    ];
    let mut ids = Vec::new();
    for (pair, direction, stake, duration, _) in orders {
        let trade = h
            .state
            .trading
            .place_trade(9, common::order(pair, direction, stake, duration))
            .await
            .unwrap();
        ids.push(trade.id);
    }
    assert_eq!(h.balance(9).await, dec!(800));

    for (pair, _, _, _, exit) in orders {
        h.prices.set_price(pair, exit).await;
    }
    advance(301).await;

    let mut net = Decimal::ZERO;
    for id in ids {
        net += h.store.find_trade(id).await.unwrap().unwrap().settlement.unwrap().net_profit;
    }
    assert_eq!(h.balance(9).await, dec!(1000) + net);

    let ledger_sum: Decimal = h
        .store
        .transactions(9, 100)
        .await
        .unwrap()
        .iter()
        .map(|tx| tx.kind.balance_delta())
        .sum();
    assert_eq!(ledger_sum, h.balance(9).await);
}
