use page_sync::{
    ContentTree, Dispatcher, IssueTracker, JiraClient, MockMode, MockTracker,
    MockTranslationService, PluginTypes, SOURCE_LANGUAGE, SyncConfig, SyncContext,
    TextFieldKind, TransifexClient, TranslationService,
};
use page_sync_web::build_router;
use std::sync::Arc;
use tracing::{info, warn};

/// Snapshot from disk, or a fresh tree holding just the two roots
fn load_tree(config: &SyncConfig) -> Result<ContentTree, Box<dyn std::error::Error>> {
    if let Some(path) = config.snapshot_path.as_deref().filter(|p| p.exists()) {
        info!("Loading content tree from {}", path.display());
        return Ok(ContentTree::load_json(path)?);
    }

    let mut types = PluginTypes::new();
    types
        .register("TextPlugin", Some(TextFieldKind::Body))
        .register("LinkPlugin", Some(TextFieldKind::Name))
        .register("TeaserPlugin", Some(TextFieldKind::Title))
        .register("PicturePlugin", None);
    let mut tree = ContentTree::with_plugin_types(types);
    for root in [&config.staging_root, &config.production_root] {
        tree.add_page(None, SOURCE_LANGUAGE, root, root)?;
    }
    warn!("No snapshot found, starting from an empty tree");
    Ok(tree)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .init();

    let config = SyncConfig::from_env()?;
    let tree = load_tree(&config)?;

    let translations: Arc<dyn TranslationService> = match &config.transifex {
        Some(settings) => {
            let client = TransifexClient::new(settings.api_token.clone())?;
            Arc::new(match &settings.base_url {
                Some(base_url) => client.with_base_url(base_url),
                None => client,
            })
        }
        None => {
            warn!("TRANSIFEX_API_TOKEN not set, using the echo translation service");
            Arc::new(MockTranslationService::new(MockMode::Echo))
        }
    };
    let tracker: Arc<dyn IssueTracker> = match &config.jira {
        Some(settings) => Arc::new(JiraClient::new(settings, &config.page_address_field)?),
        None => {
            warn!("Jira settings incomplete, ticket transitions are only recorded");
            Arc::new(MockTracker::new())
        }
    };

    info!(
        "Translations via {}, tickets via {}",
        translations.provider_name(),
        tracker.provider_name()
    );

    let bind_address = config.bind_address.clone();
    let context = SyncContext::new(config, tree, translations, tracker);
    let app = build_router(Dispatcher::new(Arc::new(context)));

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Listening on http://{}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
