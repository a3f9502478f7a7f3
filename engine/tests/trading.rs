mod common;

use common::{advance, harness, harness_with, order};
use engine::TradeStore;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use shared::{Direction, TradeError, TradeOutcome, TransactionKind};
use uuid::Uuid;

#[tokio::test(start_paused = true)]
async fn stake_above_balance_is_rejected_without_mutation() {
    let h = harness();
    h.funded(1, dec!(50)).await;

    let err = h
        .state
        .trading
        .place_trade(1, order("BTC", Direction::Buy, dec!(50.01), 60))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TradeError::InsufficientBalance { available, requested }
            if available == dec!(50) && requested == dec!(50.01)
    ));
    assert_eq!(h.balance(1).await, dec!(50));
    assert!(h.state.trading.history(1, 50).await.unwrap().is_empty());
    assert_eq!(h.state.settlement.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn invalid_requests_are_rejected_in_order() {
    let h = harness();
    h.funded(1, dec!(100)).await;
    let trading = &h.state.trading;

    assert!(matches!(
        trading.place_trade(1, order("BTC", Direction::Buy, Decimal::ZERO, 45)).await,
        Err(TradeError::InvalidStake(_))
    ));
    assert!(matches!(
        trading.place_trade(1, order("BTC", Direction::Buy, dec!(-5), 60)).await,
        Err(TradeError::InvalidStake(_))
    ));
    assert!(matches!(
        trading.place_trade(1, order("BTC", Direction::Buy, dec!(0.000000001), 60)).await,
        Err(TradeError::InvalidStake(_))
    ));
    assert!(matches!(
        trading.place_trade(1, order("NOPE-EUR", Direction::Buy, dec!(5), 45)).await,
        Err(TradeError::InvalidDuration(45))
    ));
    assert!(matches!(
        trading.place_trade(1, order("BTC-EUR", Direction::Buy, dec!(5), 60)).await,
        Err(TradeError::UnknownInstrument(_))
    ));
    assert!(matches!(
        trading.place_trade(1, order("DOGE", Direction::Sell, dec!(5), 60)).await,
        Err(TradeError::UnknownInstrument(_))
    ));
    assert_eq!(h.balance(1).await, dec!(100));
}

#[tokio::test(start_paused = true)]
async fn price_outage_at_creation_leaves_no_trade() {
    let h = harness();
    h.funded(1, dec!(100)).await;
    h.prices.fail_next(1);

    let err = h
        .state
        .trading
        .place_trade(1, order("BTC", Direction::Buy, dec!(10), 60))
        .await
        .unwrap_err();
    assert!(matches!(err, TradeError::PriceUnavailable { .. }));
    assert_eq!(h.balance(1).await, dec!(100));
    assert!(h.store.active_trades(1).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn one_active_trade_per_user_when_enforced() {
    let h = harness();
    h.funded(1, dec!(100)).await;
    h.funded(2, dec!(100)).await;
    let trading = &h.state.trading;

    trading
        .place_trade(1, order("BTC", Direction::Buy, dec!(10), 60))
        .await
        .unwrap();
    assert!(matches!(
        trading.place_trade(1, order("ETH", Direction::Sell, dec!(10), 60)).await,
        Err(TradeError::ActiveTradeExists(1))
    ));
    // Other users are unaffected.
    trading
        .place_trade(2, order("ETH", Direction::Sell, dec!(10), 60))
        .await
        .unwrap();

    advance(61).await;
    trading
        .place_trade(1, order("ETH", Direction::Sell, dec!(10), 60))
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn concurrent_trades_when_not_enforced_cannot_overspend() {
    let h = harness_with(false);
    h.funded(1, dec!(100)).await;
    let trading = h.state.trading.clone();

    let mut tasks = Vec::new();
    for _ in 0..5 {
        let trading = trading.clone();
        tasks.push(tokio::spawn(async move {
            trading
                .place_trade(1, order("BTC", Direction::Buy, dec!(30), 60))
                .await
        }));
    }
    let mut opened = 0;
    let mut refused = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => opened += 1,
            Err(TradeError::InsufficientBalance { .. }) => refused += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!((opened, refused), (3, 2));
    assert_eq!(h.balance(1).await, dec!(10));
}

#[tokio::test(start_paused = true)]
async fn trades_are_visible_only_to_their_owner() {
    let h = harness();
    h.funded(1, dec!(100)).await;
    let trade = h
        .state
        .trading
        .place_trade(1, order("BTC", Direction::Buy, dec!(10), 60))
        .await
        .unwrap();

    assert_eq!(h.state.trading.trade(1, trade.id).await.unwrap().id, trade.id);
    assert!(matches!(
        h.state.trading.trade(2, trade.id).await,
        Err(TradeError::Unauthorized { user_id: 2, .. })
    ));
    assert!(matches!(
        h.state.trading.mark_result_seen(2, trade.id).await,
        Err(TradeError::Unauthorized { .. })
    ));
    assert!(matches!(
        h.state.trading.trade(1, Uuid::new_v4()).await,
        Err(TradeError::TradeNotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn active_views_count_down_and_value_provisionally() {
    let h = harness();
    h.funded(1, dec!(100)).await;
    let trade = h
        .state
        .trading
        .place_trade(1, order("ETH", Direction::Sell, dec!(100), 300))
        .await
        .unwrap();

    advance(100).await;
    h.prices.set_price("ETH", dec!(2600)).await;
    let views = h.state.trading.active_trade_views(1).await.unwrap();
    assert_eq!(views.len(), 1);
    let view = &views[0];
    assert_eq!(view.trade.id, trade.id);
    assert_eq!(view.pair, "ETH-USDT");
    assert!((199..=200).contains(&view.time_left_secs));
    assert_eq!(view.live_price, Some(dec!(2600)));
    // A rising price loses a sell even while in flight.
    assert_eq!(view.provisional_outcome, Some(TradeOutcome::Lose));
    assert_eq!(view.provisional_net_profit, Some(dec!(-100)));

    h.prices.fail_next(1);
    let views = h.state.trading.active_trade_views(1).await.unwrap();
    assert_eq!(views[0].live_price, None);
    assert_eq!(views[0].provisional_outcome, None);

    advance(201).await;
    assert!(h.state.trading.active_trades(1).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unseen_results_feed_and_acknowledgement() {
    let h = harness_with(false);
    h.funded(1, dec!(100)).await;
    let first = h
        .state
        .trading
        .place_trade(1, order("BTC", Direction::Buy, dec!(10), 60))
        .await
        .unwrap();
    let second = h
        .state
        .trading
        .place_trade(1, order("ETH", Direction::Buy, dec!(10), 100))
        .await
        .unwrap();

    assert!(h.state.trading.recent_results(1).await.unwrap().is_empty());
    // Acknowledging an unsettled trade changes nothing.
    assert!(!h.state.trading.mark_result_seen(1, first.id).await.unwrap().result_seen);

    advance(101).await;
    let results = h.state.trading.recent_results(1).await.unwrap();
    let ids: Vec<_> = results.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let seen = h.state.trading.mark_result_seen(1, second.id).await.unwrap();
    assert!(seen.result_seen);
    let again = h.state.trading.mark_result_seen(1, second.id).await.unwrap();
    assert!(again.result_seen);

    let results = h.state.trading.recent_results(1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, first.id);
}

#[tokio::test(start_paused = true)]
async fn history_is_newest_first_and_limited() {
    let h = harness_with(false);
    h.funded(1, dec!(100)).await;
    let mut ids = Vec::new();
    for _ in 0..3 {
        let trade = h
            .state
            .trading
            .place_trade(1, order("BTC", Direction::Buy, dec!(5), 600))
            .await
            .unwrap();
        ids.push(trade.id);
        advance(1).await;
    }

    let history = h.state.trading.history(1, 2).await.unwrap();
    assert_eq!(history.iter().map(|t| t.id).collect::<Vec<_>>(), vec![ids[2], ids[1]]);
    assert_eq!(h.state.trading.history(1, 0).await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn deposits_and_withdrawals_update_the_ledger() {
    let h = harness();
    let trading = &h.state.trading;

    assert!(matches!(
        trading.balance(42).await,
        Err(TradeError::AccountNotFound(42))
    ));
    assert!(matches!(
        trading.deposit(42, Decimal::ZERO).await,
        Err(TradeError::InvalidAmount(_))
    ));

    assert!(matches!(
        trading.deposit(42, dec!(10.123456789)).await,
        Err(TradeError::InvalidAmount(_))
    ));

    trading.deposit(42, dec!(250)).await.unwrap();
    assert!(matches!(
        trading.withdraw(42, dec!(0.000000001), "TAddr").await,
        Err(TradeError::InvalidAmount(_))
    ));
    assert!(matches!(
        trading.withdraw(42, dec!(300), "TAddr").await,
        Err(TradeError::InsufficientBalance { .. })
    ));
    let tx = trading.withdraw(42, dec!(100), "TAddr").await.unwrap();
    assert!(matches!(tx.kind, TransactionKind::Withdrawal { ref address, .. } if address == "TAddr"));
    assert_eq!(trading.balance(42).await.unwrap(), dec!(150));

    let ledger = trading.transactions(42, 10).await.unwrap();
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger[0].kind.label(), "withdrawal");
    assert_eq!(ledger[1].kind.label(), "deposit");
}

#[tokio::test(start_paused = true)]
async fn pnl_summary_tracks_settled_and_open_trades() {
    let h = harness_with(false);
    h.funded(1, dec!(1000)).await;
    let trading = &h.state.trading;

    trading
        .place_trade(1, order("BTC", Direction::Buy, dec!(100), 60))
        .await
        .unwrap();
    trading
        .place_trade(1, order("ETH", Direction::Buy, dec!(100), 60))
        .await
        .unwrap();
    h.prices.set_price("BTC", dec!(51000)).await;
    h.prices.set_price("ETH", dec!(2400)).await;
    advance(61).await;
    trading
        .place_trade(1, order("SOL", Direction::Sell, dec!(50), 600))
        .await
        .unwrap();

    let summary = trading.pnl_summary(1).await.unwrap();
    assert_eq!(summary.settled_trades, 2);
    assert_eq!(summary.winning_trades, 1);
    assert_eq!(summary.active_trades, 1);
    assert_eq!(summary.open_stake, dec!(50));
    assert_eq!(summary.win_rate, dec!(50));
    assert_eq!(summary.total_net_profit, dec!(84) - dec!(100));
}

#[tokio::test]
async fn payout_menu_and_quotes() {
    let h = harness();
    let menu = h.state.trading.payout_menu(Direction::Sell);
    let rates: Vec<_> = menu.iter().map(|m| (m.duration_secs, m.profit_rate)).collect();
    assert_eq!(
        rates,
        vec![
            (60, dec!(0.08)),
            (100, dec!(0.20)),
            (200, dec!(0.20)),
            (300, dec!(0.20)),
            (600, dec!(0.40)),
        ]
    );

    let (symbol, price) = h.state.trading.price("btcusdt").await.unwrap();
    assert_eq!(symbol, "BTC");
    assert_eq!(price, dec!(50000));
}

#[tokio::test]
async fn market_lists_every_quoted_instrument() {
    let h = harness();
    h.prices.set_price("ADA", dec!(0.58486)).await;

    let market = h.state.trading.market().await.unwrap();
    let symbols: Vec<_> = market.iter().map(|q| q.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["ADA", "BTC", "ETH", "SOL"]);
    assert_eq!(market[1].current_price, dec!(50000));

    h.prices.fail_next(1);
    assert!(matches!(
        h.state.trading.market().await,
        Err(TradeError::PriceUnavailable { .. })
    ));
}
