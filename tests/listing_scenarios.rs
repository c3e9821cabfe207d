//! End-to-end listing scenarios over file-backed content and preferences.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use volvox_listing::services::{
    ContentService, FilePreferenceStore, HistoryRouter, JsonFileSource, MemoryRouter,
    PreferenceStore, TokioScheduler,
};
use volvox_listing::{ListController, ListDomain, ListingView, SortOption, ViewMode};

const POSTS: &str = r#"[
  {"id":"announcing-volvox","title":"Announcing Volvox","description":"Our first public release","timestamp":"2024-01-10T09:00:00Z","tags":["release","news"],"views":1200},
  {"id":"design-system","title":"Building a Design System","description":"Tokens, themes and components","timestamp":"2024-02-14T09:00:00Z","tags":["design"],"views":430},
  {"id":"volvox-1-1","title":"Volvox 1.1","description":"Dark mode and faster search","timestamp":"2024-03-02T09:00:00Z","tags":["release"],"views":880},
  {"id":"team-update","title":"Team Update","description":"Meet the people behind Volvox","timestamp":"2024-04-20T09:00:00Z","tags":["culture"],"views":150},
  {"id":"open-source","title":"Why We Open Source","description":"Community first","timestamp":"2024-05-05T09:00:00Z","tags":["community","news"],"views":610}
]"#;

const PRODUCTS: &str = r#"[
  {"id":"volvox-bot","title":"Volvox Bot","description":"Discord moderation bot","timestamp":"2024-04-01T00:00:00Z","tags":["Rust","Discord"]},
  {"id":"atlas","title":"Atlas","description":"Docs site generator","timestamp":"2024-02-01T00:00:00Z","tags":["TypeScript"]},
  {"id":"pulse","title":"Pulse","description":"Uptime dashboard","timestamp":"2024-03-01T00:00:00Z","tags":["Rust","TypeScript"]}
]"#;

struct Site {
    _dir: tempfile::TempDir,
    content: ContentService<JsonFileSource>,
    store: Arc<FilePreferenceStore>,
}

fn site() -> Site {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("posts.json"), POSTS).unwrap();
    std::fs::write(dir.path().join("products.json"), PRODUCTS).unwrap();
    let store = Arc::new(FilePreferenceStore::open(dir.path().join("prefs.json")).unwrap());
    let content = ContentService::new(Arc::new(JsonFileSource::new(dir.path())));
    Site {
        _dir: dir,
        content,
        store,
    }
}

fn ids(view: ListingView) -> Vec<String> {
    match view {
        ListingView::Items(items) => items.into_iter().map(|i| i.id.to_string()).collect(),
        other => panic!("expected items, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn debounced_search_updates_url_once() {
    let site = site();
    let router = Arc::new(MemoryRouter::parse("https://volvox.dev/blog").unwrap());
    let controller = ListController::new(
        ListDomain::Posts,
        router.clone(),
        site.store.clone(),
        Arc::new(TokioScheduler::current().unwrap()),
    );
    controller.load_items(site.content.load(ListDomain::Posts).await);
    controller.mount();
    let revision = controller.revision();

    for text in ["a", "an", "ann", "announcing"] {
        controller.set_search_input(text);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(router.replace_count(), 0);

    tokio::time::sleep(Duration::from_millis(300)).await;
    tokio::task::yield_now().await;

    assert_eq!(controller.revision(), revision + 1);
    assert_eq!(router.replace_count(), 1);
    assert_eq!(router.current_url().query(), Some("q=announcing"));
    assert_eq!(ids(controller.view()), vec!["announcing-volvox"]);
}

#[tokio::test]
async fn shared_url_reproduces_listing() {
    let site = site();
    let scheduler = Arc::new(TokioScheduler::current().unwrap());
    let posts = site.content.load(ListDomain::Posts).await;

    let router = Arc::new(MemoryRouter::parse("https://volvox.dev/blog?utm_campaign=launch").unwrap());
    let first = ListController::new(ListDomain::Posts, router.clone(), site.store.clone(), scheduler.clone());
    first.load_items(posts.clone());
    first.mount();
    first.toggle_tag("news");
    first.toggle_tag("release");
    first.set_sort(SortOption::Views);
    first.set_view_mode(ViewMode::List);
    let shared_url = router.current_url();
    let expected = ids(first.view());
    first.unmount();

    assert_eq!(
        shared_url.query(),
        Some("utm_campaign=launch&tags=news%2Crelease&sort=views&view=list")
    );

    let reopened = Arc::new(MemoryRouter::new(shared_url));
    let second = ListController::new(ListDomain::Posts, reopened, site.store.clone(), scheduler);
    second.load_items(posts);
    second.mount();

    assert_eq!(second.state(), first.state());
    assert_eq!(ids(second.view()), expected);
    assert_eq!(expected, vec!["announcing-volvox", "volvox-1-1", "open-source"]);
}

#[tokio::test]
async fn product_listing_uses_tech_and_remembers_view() {
    let site = site();
    let scheduler = Arc::new(TokioScheduler::current().unwrap());
    let products = site.content.load(ListDomain::Products).await;

    let router = Arc::new(MemoryRouter::parse("https://volvox.dev/products?tech=Rust").unwrap());
    let controller = ListController::new(ListDomain::Products, router.clone(), site.store.clone(), scheduler.clone());
    controller.load_items(products.clone());
    controller.mount();

    assert_eq!(ids(controller.view()), vec!["pulse", "volvox-bot"]);
    controller.set_view_mode(ViewMode::List);
    assert_eq!(site.store.read("volvox-view-mode").as_deref(), Some("list"));

    // a later visit without a view parameter picks up the remembered mode
    let later = ListController::new(
        ListDomain::Products,
        Arc::new(MemoryRouter::parse("https://volvox.dev/products").unwrap()),
        site.store.clone(),
        scheduler,
    );
    later.load_items(products);
    later.mount();
    assert_eq!(later.state().view_mode, ViewMode::List);
    assert_eq!(ids(later.view()), vec!["atlas", "pulse", "volvox-bot"]);
}

#[tokio::test]
async fn missing_content_renders_empty_state() {
    let dir = tempfile::tempdir().unwrap();
    let content = ContentService::new(Arc::new(JsonFileSource::new(dir.path())));
    let router = Arc::new(MemoryRouter::parse("https://volvox.dev/blog").unwrap());

    let controller = ListController::new(
        ListDomain::Posts,
        router,
        Arc::new(volvox_listing::services::MemoryPreferenceStore::new()),
        Arc::new(TokioScheduler::current().unwrap()),
    );
    assert_eq!(controller.view(), ListingView::Loading);

    controller.load_items(content.load(ListDomain::Posts).await);
    controller.mount();
    assert_eq!(
        controller.view(),
        ListingView::Empty {
            filters_active: false
        }
    );
}
