use cli::commands::{add_rule, add_to_watchlist, list_symbols, remove_from_watchlist};
use engine::RuleKind;
use market::{ListedSymbol, SymbolKind};
use store::{Db, NewUser, Repositories};
use uuid::Uuid;

async fn setup() -> (Repositories, i64) {
    let url = format!("sqlite:file:{}?mode=memory&cache=shared", Uuid::new_v4());
    let db = Db::connect(&url).await.unwrap();
    db.migrate().await.unwrap();
    let repos = Repositories::sqlx(db.pool);

    let listed = [
        ("AAPL", "Apple Inc.", SymbolKind::Stock),
        ("MSFT", "Microsoft Corporation", SymbolKind::Stock),
        ("SPY", "SPDR S&P 500 ETF Trust", SymbolKind::Etf),
    ]
    .map(|(ticker, name, kind)| ListedSymbol {
        ticker: ticker.into(),
        name: name.into(),
        kind,
        exchange: "NASDAQ".into(),
    });
    repos.symbols.bulk_upsert(&listed).await.unwrap();

    let user = repos
        .users
        .create(&NewUser {
            email: Some("me@example.com".into()),
            discord_webhook_url: None,
        })
        .await
        .unwrap();

    (repos, user.id)
}

fn tickers(t: &[&str]) -> Vec<String> {
    t.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn watchlist_add_reports_each_ticker() {
    let (repos, user) = setup().await;

    let first = add_to_watchlist(&repos, user, &tickers(&["aapl", "NOPE"])).await.unwrap();
    assert_eq!(first.changed, vec!["AAPL"]);
    assert_eq!(first.not_found, vec!["NOPE"]);

    let second = add_to_watchlist(&repos, user, &tickers(&["AAPL", "msft"])).await.unwrap();
    assert_eq!(second.changed, vec!["MSFT"]);
    assert_eq!(second.unchanged, vec!["AAPL"]);

    let removed = remove_from_watchlist(&repos, user, &tickers(&["AAPL"])).await.unwrap();
    assert_eq!(removed.changed, vec!["AAPL"]);

    let left: Vec<String> = repos
        .watchlist
        .list_for_user(user)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.ticker)
        .collect();
    assert_eq!(left, vec!["MSFT"]);
}

#[tokio::test]
async fn watchlist_add_needs_an_existing_user() {
    let (repos, _) = setup().await;
    assert!(add_to_watchlist(&repos, 999, &tickers(&["AAPL"])).await.is_err());
}

#[tokio::test]
async fn rules_are_validated_before_storing() {
    let (repos, user) = setup().await;

    let rule = add_rule(&repos, user, RuleKind::DailyChange, r#"{"threshold": 3}"#, Some("msft"))
        .await
        .unwrap();
    assert!(rule.id.is_some());
    assert!(rule.symbol_id.is_some());

    assert!(add_rule(&repos, user, RuleKind::DailyChange, "not json", None).await.is_err());
    assert!(
        add_rule(&repos, user, RuleKind::Custom, r#"{"condition": "price >"}"#, None)
            .await
            .is_err()
    );
    assert!(add_rule(&repos, user, RuleKind::VolumeSpike, "{}", Some("ZZZZ")).await.is_err());

    assert_eq!(repos.rules.list_for_user(user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn symbol_listing_filters() {
    let (repos, _) = setup().await;

    let etfs = list_symbols(&repos, None, Some(SymbolKind::Etf)).await.unwrap();
    assert_eq!(etfs.len(), 1);
    assert_eq!(etfs[0].ticker, "SPY");

    let found = list_symbols(&repos, Some("micro"), None).await.unwrap();
    assert_eq!(found[0].ticker, "MSFT");

    assert_eq!(list_symbols(&repos, None, None).await.unwrap().len(), 3);
}
