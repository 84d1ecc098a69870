//! Resolution order and timing of the identifier → description → text chain.

mod common;

use std::time::Duration;

use common::{ElementSpec, MockScreen};

use droidscope_core::config::EngineConfig;
use droidscope_core::element::{NodeKey, EDIT_TEXT};
use droidscope_core::events::{CollectingSink, EngineEvent};
use droidscope_core::executor::{ActionExecutor, InputOptions, Outcome};
use droidscope_core::host::Query;
use droidscope_core::locator::{LocatorChain, LocatorSpec, StrategyKind};
use tokio::time::Instant;

fn chain(screen: &std::sync::Arc<MockScreen>) -> (LocatorChain, std::sync::Arc<CollectingSink>) {
    let events = CollectingSink::new();
    (LocatorChain::new(screen.clone(), events.clone()), events)
}

#[tokio::test(start_paused = true)]
async fn test_identifier_match_skips_other_strategies() {
    let screen = MockScreen::new();
    let key = screen.add(ElementSpec::new("android.widget.Button").id("com.example:id/ok").text("OK"));
    let (chain, events) = chain(&screen);

    let spec = LocatorSpec::new("ok")
        .ids(["com.example:id/ok"])
        .descriptions(["confirm"])
        .texts(["OK"]);
    let resolved = chain.locate(&spec).await.expect("should resolve");

    assert_eq!(resolved.element.key(), key);
    assert_eq!(resolved.strategy, StrategyKind::Identifier);
    assert_eq!(screen.journal.find_one_queries(), vec![Query::id("com.example:id/ok")]);
    assert_eq!(
        events.count(|e| matches!(e, EngineEvent::StrategyAttempt { .. })),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_falls_through_in_priority_order() {
    let screen = MockScreen::new();
    screen.add(ElementSpec::new("android.widget.TextView").text("确认"));
    let (chain, _events) = chain(&screen);

    let spec = LocatorSpec::new("confirm")
        .ids(["com.example:id/confirm"])
        .descriptions(["Confirm"])
        .texts(["OK", "确认"]);
    let start = Instant::now();
    let resolved = chain.locate(&spec).await.expect("should resolve");

    assert_eq!(resolved.strategy, StrategyKind::Text);
    assert_eq!(resolved.candidate, "确认");
    assert_eq!(
        screen.journal.find_one_queries(),
        vec![
            Query::id("com.example:id/confirm"),
            Query::description("Confirm"),
            Query::text("OK"),
            Query::text("确认"),
        ]
    );
    // Three misses, each waiting out the default timeout.
    assert_eq!(start.elapsed(), Duration::from_millis(3000));
}

#[tokio::test(start_paused = true)]
async fn test_not_found_within_timeout_sum() {
    let screen = MockScreen::new();
    screen.add(ElementSpec::new("android.widget.Button").text("Cancel"));
    let (chain, events) = chain(&screen);

    let spec = LocatorSpec::new("missing")
        .ids(["a", "b"])
        .texts(["c"])
        .timeout(Duration::from_millis(250));
    let start = Instant::now();

    assert!(chain.resolve(&spec).await.is_none());
    let bound = spec.worst_case_wait(chain.default_timeout());
    assert!(start.elapsed() <= bound);
    assert_eq!(bound, Duration::from_millis(750));
    assert_eq!(
        events.events().last(),
        Some(&EngineEvent::NotFound {
            label: "missing".to_string()
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_chain_default_timeout_applies_to_specs_without_one() {
    let screen = MockScreen::new();
    let (chain, _events) = chain(&screen);
    let chain = chain.with_default_timeout(Duration::from_millis(200));

    let start = Instant::now();
    assert!(chain.resolve(&LocatorSpec::new("menu").ids(["a", "b"])).await.is_none());
    assert_eq!(start.elapsed(), Duration::from_millis(400));

    // An explicit per-spec timeout still wins.
    let start = Instant::now();
    let spec = LocatorSpec::new("menu").ids(["a"]).timeout(Duration::from_millis(50));
    assert!(chain.resolve(&spec).await.is_none());
    assert_eq!(start.elapsed(), Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_executor_uses_configured_lookup_timeout() {
    let screen = MockScreen::new();
    let config = EngineConfig {
        lookup_timeout_ms: 250,
        ..EngineConfig::default()
    };
    let executor = ActionExecutor::new(screen.clone(), screen.clone(), CollectingSink::new(), config);

    let start = Instant::now();
    let outcome = executor
        .input_text(&LocatorSpec::new("search").ids(["x"]), "tea", &InputOptions::default())
        .await;

    assert_eq!(outcome, Outcome::NotFound);
    assert_eq!(start.elapsed(), Duration::from_millis(250));
    assert_eq!(executor.locator().default_timeout(), Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn test_empty_spec_resolves_nothing_immediately() {
    let screen = MockScreen::new();
    let (chain, _events) = chain(&screen);

    let start = Instant::now();
    assert!(chain.resolve(&LocatorSpec::new("nothing")).await.is_none());
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert!(screen.journal.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_host_error_falls_through_to_next_strategy() {
    let screen = MockScreen::new();
    let key = screen.add(ElementSpec::new("android.widget.ImageButton").desc("Search"));
    screen.fail_query(&Query::id("com.example:id/search"));
    let (chain, events) = chain(&screen);

    let spec = LocatorSpec::new("search")
        .ids(["com.example:id/search"])
        .descriptions(["Search"]);
    let resolved = chain.locate(&spec).await.expect("should resolve");

    assert_eq!(resolved.element.key(), key);
    assert_eq!(resolved.strategy, StrategyKind::Description);
    assert_eq!(
        events.count(|e| matches!(e, EngineEvent::StrategyErrored { strategy: StrategyKind::Identifier, .. })),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_class_restriction_applies_to_every_query() {
    let screen = MockScreen::new();
    screen.add(ElementSpec::new("android.widget.TextView").text("Search"));
    let field = screen.add(ElementSpec::new(EDIT_TEXT).text("Search").editable());
    let (chain, _events) = chain(&screen);

    let spec = LocatorSpec::new("field").texts(["Search"]).class_name(EDIT_TEXT);
    let element = chain.resolve(&spec).await.expect("should resolve");

    assert_eq!(element.key(), field);
    assert_ne!(element.key(), NodeKey(0));
    assert_eq!(
        screen.journal.find_one_queries(),
        vec![Query::text("Search").with_class(EDIT_TEXT)]
    );
}
