use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use volvox_listing::services::{
    ContentService, ContentSource, FilePreferenceStore, HttpContentSource, JsonFileSource,
    HistoryRouter, MemoryRouter, TokioScheduler,
};
use volvox_listing::{ListController, ListDomain, ListingConfig, ListingView};

const USAGE: &str = "usage: volvox-listing <posts|products> <content-dir-or-url> [query-string]";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("volvox_listing=info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (domain, content, query) = match args.as_slice() {
        [domain, content] => (domain, content, ""),
        [domain, content, query] => (domain, content, query.as_str()),
        _ => bail!(USAGE),
    };
    let domain = ListDomain::parse(domain).with_context(|| format!("unknown listing {:?}", domain))?;

    let config_path = env::var("VOLVOX_CONFIG").ok().map(PathBuf::from);
    let config = ListingConfig::load(config_path.as_deref()).context("loading configuration")?;

    let items = if content.starts_with("http://") || content.starts_with("https://") {
        load(HttpContentSource::new(content)?, domain, &config).await
    } else {
        load(JsonFileSource::new(content), domain, &config).await
    };

    let query = query.trim_start_matches('?');
    let mut page = format!("https://volvox.local/{}", domain.as_str());
    if !query.is_empty() {
        page.push('?');
        page.push_str(query);
    }

    let router = Arc::new(MemoryRouter::parse(&page)?);
    let store = Arc::new(
        FilePreferenceStore::open(config.preferences_path()).context("opening preferences")?,
    );
    let scheduler = Arc::new(TokioScheduler::current().context("no tokio runtime")?);

    let controller =
        ListController::new(domain, router.clone(), store, scheduler).with_config(&config);
    controller.load_items(items);
    controller.mount();

    let state = controller.state();
    println!(
        "{} | sort: {} | view: {} | tags: {}",
        domain,
        state.sort_option.label(),
        state.view_mode,
        if state.selected_tags.is_empty() {
            "all".to_string()
        } else {
            state.selected_tags.iter().cloned().collect::<Vec<_>>().join(", ")
        }
    );

    match controller.view() {
        ListingView::Loading => println!("loading..."),
        ListingView::Empty { filters_active } => {
            if filters_active {
                println!("No results match your filters.");
            } else {
                println!("Nothing published yet.");
            }
        }
        ListingView::Items(items) => {
            for item in items {
                println!(
                    "{}  {:<40} {}",
                    item.timestamp.format("%Y-%m-%d"),
                    item.title,
                    item.id
                );
            }
        }
    }

    println!("{}", router.current_url());
    controller.unmount();
    Ok(())
}

async fn load<S: ContentSource>(
    source: S,
    domain: ListDomain,
    config: &ListingConfig,
) -> Arc<[volvox_listing::ListItem]> {
    ContentService::with_settings(Arc::new(source), config.cache_settings())
        .load(domain)
        .await
}
