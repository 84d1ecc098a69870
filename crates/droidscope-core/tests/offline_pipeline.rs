//! End-to-end runs of the locator, executor and inventory builder against a
//! captured screen dump.

use std::sync::Arc;

use droidscope_core::config::EngineConfig;
use droidscope_core::element::EDIT_TEXT;
use droidscope_core::events::{CollectingSink, EngineEvent};
use droidscope_core::executor::{ActionExecutor, ClickOptions, InputOptions, Outcome};
use droidscope_core::host::{AccessibilitySurface, Query};
use droidscope_core::introspect::ElementRecord;
use droidscope_core::inventory::{InventoryBuilder, InventoryOptions};
use droidscope_core::locator::LocatorSpec;
use droidscope_core::snapshot::{DirectorySink, InventorySnapshot};
use droidscope_core::tree::ScreenTree;

const DUMP: &str = r#"{
    "screen": {"width": 1080, "height": 2400},
    "root": {
        "class": "android.widget.FrameLayout",
        "package": "com.example.food",
        "bounds": [0, 0, 1080, 2400],
        "children": [
            {"id": "com.example.food:id/search", "class": "android.widget.EditText",
             "bounds": [40, 120, 900, 240], "clickable": true, "editable": true, "focusable": true,
             "hint": "Search dishes", "input_type": "text", "text_size": 16.0},
            {"text": "搜索", "class": "android.widget.TextView",
             "bounds": [900, 120, 1040, 240], "clickable": true},
            {"desc": "Cart", "class": "android.widget.ImageButton",
             "bounds": [960, 2200, 1060, 2300], "clickable": true, "enabled": false},
            {"class": "android.widget.RecyclerView", "bounds": [0, 260, 1080, 2180], "scrollable": true,
             "children": [
                {"text": "Noodles", "class": "android.widget.TextView", "bounds": [0, 260, 1080, 400]},
                {"text": "Dumplings", "class": "android.widget.TextView", "bounds": [0, 400, 1080, 540],
                 "unreadable": ["bounds"]},
                {"text": "Tea", "class": "android.widget.TextView", "detached": true}
             ]}
        ]
    }
}"#;

fn tree() -> Arc<ScreenTree> {
    Arc::new(ScreenTree::from_json(DUMP).unwrap())
}

#[tokio::test(start_paused = true)]
async fn test_input_then_submit_on_dump() {
    let tree = tree();
    let events = CollectingSink::new();
    let executor = ActionExecutor::new(tree.clone(), tree.clone(), events.clone(), EngineConfig::default());

    let spec = LocatorSpec::new("search").ids(["com.example.food:id/search"]);
    let outcome = executor.input_text(&spec, "面条", &InputOptions::default()).await;

    assert_eq!(outcome, Outcome::Ok);
    assert!(tree.exists(&Query::text("面条").with_class(EDIT_TEXT)).await.unwrap());
    assert!(events.events().contains(&EngineEvent::SubmitClicked {
        label: "搜索".to_string()
    }));
}

#[tokio::test(start_paused = true)]
async fn test_disabled_control_falls_back_to_coordinates() {
    let tree = tree();
    let events = CollectingSink::new();
    let executor = ActionExecutor::new(tree.clone(), tree, events.clone(), EngineConfig::default());

    let cart = LocatorSpec::new("cart").descriptions(["Cart"]);
    assert!(matches!(
        executor.find_and_click(&cart, &ClickOptions::new("cart")).await,
        Outcome::ActionFailed(_)
    ));

    let cart = cart.coordinates([(1010, 2250)]);
    assert_eq!(
        executor.find_and_click(&cart, &ClickOptions::new("cart")).await,
        Outcome::Degraded
    );
}

#[tokio::test]
async fn test_inventory_of_dump_with_export() {
    let tree = tree();
    let events = CollectingSink::new();
    let dir = std::env::temp_dir().join(format!("droidscope_pipeline_{}", uuid::Uuid::new_v4().simple()));
    let builder = InventoryBuilder::new(
        tree.clone(),
        tree,
        events.clone(),
        Arc::new(DirectorySink::new(&dir)),
    );

    let opts = InventoryOptions {
        export_snapshot: true,
        ..InventoryOptions::default()
    };
    let inventory = builder.build(&opts).await;

    // All eight nodes are visible; the detached row degrades.
    assert_eq!(inventory.records.len(), 8);
    assert_eq!(inventory.stats.degraded, 1);
    assert_eq!(inventory.stats.clickable, 3);

    let field = inventory.records[0].info().unwrap();
    assert_eq!(field.identifier, "com.example.food:id/search");
    assert_eq!(field.extras.hint.as_deref(), Some("Search dishes"));
    assert_eq!(field.bounds.unwrap().center_x, 470);

    let dumplings = inventory
        .records
        .iter()
        .filter_map(ElementRecord::info)
        .find(|i| i.text == "Dumplings")
        .unwrap();
    assert!(dumplings.bounds.is_none());
    assert_eq!(dumplings.unreadable, vec!["bounds"]);

    let location = inventory.exported_to.clone().expect("snapshot should be written");
    let snapshot: InventorySnapshot =
        serde_json::from_str(&std::fs::read_to_string(&location).unwrap()).unwrap();
    std::fs::remove_dir_all(&dir).ok();

    assert_eq!(snapshot.elements, inventory.records);
    assert_eq!(snapshot.device_info.width, 1080);
}
