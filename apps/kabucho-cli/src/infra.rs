use kabucho_application::config::{resolve_db_url, Config};
use kabucho_domain::repositories::action_feed::CorporateActionFeed;
use kabucho_domain::repositories::price_store::PriceStore;
use kabucho_domain::repositories::reports::ReportWriter;
use kabucho_infrastructure::feeds::kabu_actions::HtmlActionFeed;
use kabucho_infrastructure::persistence::postgres_store::PostgresPriceStore;
use kabucho_infrastructure::reporting::FilesystemReportWriter;

pub struct BacktestDeps {
    pub store: Box<dyn PriceStore>,
    pub reports: Box<dyn ReportWriter>,
}

pub fn build_backtest_deps(config: &Config) -> Result<BacktestDeps, String> {
    let db_url = resolve_db_url(config)?;
    let store = PostgresPriceStore::new(db_url, config.db.pool_max_size.unwrap_or(8))?;
    Ok(BacktestDeps {
        store: Box::new(store),
        reports: Box::new(FilesystemReportWriter::new()),
    })
}

pub fn build_action_feed(config: &Config) -> Result<Box<dyn CorporateActionFeed>, String> {
    let feed = HtmlActionFeed::new(
        config.feed.split_url.clone(),
        config.feed.consolidation_url.clone(),
        config.feed.symbol_suffix.clone(),
    )?;
    Ok(Box::new(feed))
}
