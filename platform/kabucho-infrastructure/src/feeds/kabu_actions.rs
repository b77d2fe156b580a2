use chrono::NaiveDate;
use kabucho_domain::errors::FeedError;
use kabucho_domain::repositories::action_feed::CorporateActionFeed;
use kabucho_domain::value_objects::corporate_action::CorporateAction;
use scraper::{Html, Selector};
use std::time::Duration;

/// Scraped split/consolidation notices. The source publishes two HTML
/// pages with the same table layout: announcement cell, 4-digit code,
/// company name, ratio text, effective ("last date with rights") date in
/// `YYYY/MM/DD`. Split ratios read "1：N", consolidations "N株→1株".
pub struct HtmlActionFeed {
    http: reqwest::blocking::Client,
    split_url: String,
    consolidation_url: String,
    symbol_suffix: String,
    row_selector: Selector,
    cell_selector: Selector,
}

impl HtmlActionFeed {
    pub fn new(
        split_url: String,
        consolidation_url: String,
        symbol_suffix: String,
    ) -> Result<Self, String> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        let row_selector = Selector::parse("tbody tr")
            .map_err(|err| format!("invalid row selector: {err}"))?;
        let cell_selector =
            Selector::parse("td").map_err(|err| format!("invalid cell selector: {err}"))?;
        Ok(Self {
            http,
            split_url,
            consolidation_url,
            symbol_suffix,
            row_selector,
            cell_selector,
        })
    }

    fn fetch_page(&self, url: &str) -> Result<String, FeedError> {
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|err| FeedError::SourceUnavailable(format!("{url}: {err}")))?;
        if !response.status().is_success() {
            return Err(FeedError::SourceUnavailable(format!(
                "{url}: status {}",
                response.status()
            )));
        }
        response
            .text()
            .map_err(|err| FeedError::SourceUnavailable(format!("{url}: {err}")))
    }

    fn parse_rows(&self, html: &str, page: &str) -> Result<Vec<Vec<String>>, FeedError> {
        let document = Html::parse_document(html);
        let rows: Vec<Vec<String>> = document
            .select(&self.row_selector)
            .map(|row| {
                row.select(&self.cell_selector)
                    .map(|cell| cell.text().collect::<String>().trim().to_string())
                    .collect()
            })
            .collect();
        if rows.is_empty() {
            // A page without the expected table shape is a broken source,
            // not an empty announcement list.
            return Err(FeedError::SourceUnavailable(format!(
                "{page} page: no table rows found"
            )));
        }
        Ok(rows)
    }

    fn parse_split_page(&self, html: &str) -> Result<Vec<CorporateAction>, FeedError> {
        self.parse_rows(html, "split")?
            .into_iter()
            .map(|cells| self.split_from_cells(&cells))
            .collect()
    }

    fn parse_consolidation_page(&self, html: &str) -> Result<Vec<CorporateAction>, FeedError> {
        self.parse_rows(html, "consolidation")?
            .into_iter()
            .map(|cells| self.consolidation_from_cells(&cells))
            .collect()
    }

    fn split_from_cells(&self, cells: &[String]) -> Result<CorporateAction, FeedError> {
        let (symbol, name, ratio_text, date_text) = self.common_cells(cells)?;
        // "1：5" reads as one share becoming five.
        let denominator = ratio_text
            .split('：')
            .nth(1)
            .ok_or_else(|| malformed("split ratio", &ratio_text))?
            .trim()
            .parse::<f64>()
            .map_err(|_| malformed("split ratio", &ratio_text))?;
        if denominator <= 0.0 {
            return Err(malformed("split ratio", &ratio_text));
        }
        Ok(CorporateAction::split(
            symbol,
            name,
            denominator,
            parse_effective_date(&date_text)?,
        ))
    }

    fn consolidation_from_cells(&self, cells: &[String]) -> Result<CorporateAction, FeedError> {
        let (symbol, name, ratio_text, date_text) = self.common_cells(cells)?;
        // "5株→1株" reads as five shares becoming one.
        let numerator = ratio_text
            .split('→')
            .next()
            .ok_or_else(|| malformed("consolidation ratio", &ratio_text))?
            .trim_end_matches('株')
            .trim()
            .parse::<f64>()
            .map_err(|_| malformed("consolidation ratio", &ratio_text))?;
        if numerator <= 0.0 {
            return Err(malformed("consolidation ratio", &ratio_text));
        }
        Ok(CorporateAction::consolidation(
            symbol,
            name,
            numerator,
            parse_effective_date(&date_text)?,
        ))
    }

    fn common_cells(&self, cells: &[String]) -> Result<(String, String, String, String), FeedError> {
        if cells.len() < 5 {
            return Err(FeedError::MalformedRow(format!(
                "expected 5 cells, got {}",
                cells.len()
            )));
        }
        let symbol = format!("{}{}", cells[1], self.symbol_suffix);
        Ok((
            symbol,
            cells[2].clone(),
            cells[3].clone(),
            cells[4].clone(),
        ))
    }
}

impl CorporateActionFeed for HtmlActionFeed {
    fn refresh(&self) -> Result<Vec<CorporateAction>, FeedError> {
        let split_html = self.fetch_page(&self.split_url)?;
        let mut actions = self.parse_split_page(&split_html)?;

        let consolidation_html = self.fetch_page(&self.consolidation_url)?;
        actions.extend(self.parse_consolidation_page(&consolidation_html)?);

        tracing::info!(count = actions.len(), "parsed corporate action notices");
        Ok(actions)
    }
}

fn parse_effective_date(value: &str) -> Result<NaiveDate, FeedError> {
    NaiveDate::parse_from_str(value.trim(), "%Y/%m/%d")
        .map_err(|_| malformed("effective date", value))
}

fn malformed(field: &str, value: &str) -> FeedError {
    FeedError::MalformedRow(format!("unparseable {field}: {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::HtmlActionFeed;
    use chrono::NaiveDate;
    use kabucho_domain::errors::FeedError;

    fn feed() -> HtmlActionFeed {
        HtmlActionFeed::new(
            "https://example.com/bunkatu.html".to_string(),
            "https://example.com/gensi.html".to_string(),
            ".T".to_string(),
        )
        .unwrap()
    }

    const SPLIT_PAGE: &str = r#"
        <html><body><table>
        <thead><tr><th>発表日</th><th>コード</th><th>銘柄名</th><th>分割比率</th><th>権利付最終日</th></tr></thead>
        <tbody>
        <tr><td>2026/03/01</td><td>7203</td><td>トヨタ自動車</td><td>1：5</td><td>2026/03/31</td></tr>
        <tr><td>2026/03/02</td><td>6758</td><td>ソニーグループ</td><td>1：2</td><td>2026/04/07</td></tr>
        </tbody></table></body></html>"#;

    const CONSOLIDATION_PAGE: &str = r#"
        <html><body><table>
        <tbody>
        <tr><td>2026/03/01</td><td>9501</td><td>東京電力HD</td><td>10株→1株</td><td>2026/03/31</td></tr>
        </tbody></table></body></html>"#;

    #[test]
    fn parses_split_rows_with_inverse_ratio() {
        let actions = feed().parse_split_page(SPLIT_PAGE).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].symbol, "7203.T");
        assert_eq!(actions[0].company_name, "トヨタ自動車");
        assert!((actions[0].ratio - 0.2).abs() < 1e-12);
        assert_eq!(
            actions[0].effective_date,
            NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()
        );
        assert!((actions[1].ratio - 0.5).abs() < 1e-12);
    }

    #[test]
    fn parses_consolidation_rows_with_direct_ratio() {
        let actions = feed().parse_consolidation_page(CONSOLIDATION_PAGE).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].symbol, "9501.T");
        assert!((actions[0].ratio - 10.0).abs() < 1e-12);
    }

    #[test]
    fn page_without_table_body_is_source_unavailable() {
        let err = feed()
            .parse_split_page("<html><body><p>mainte</p></body></html>")
            .unwrap_err();
        assert!(matches!(err, FeedError::SourceUnavailable(_)));
    }

    #[test]
    fn short_row_is_malformed() {
        let html = r#"<table><tbody><tr><td>2026/03/01</td><td>7203</td></tr></tbody></table>"#;
        let err = feed().parse_split_page(html).unwrap_err();
        assert!(matches!(err, FeedError::MalformedRow(_)));
    }

    #[test]
    fn garbage_ratio_is_malformed() {
        let html = r#"<table><tbody>
        <tr><td>2026/03/01</td><td>7203</td><td>トヨタ</td><td>未定</td><td>2026/03/31</td></tr>
        </tbody></table>"#;
        let err = feed().parse_split_page(html).unwrap_err();
        assert!(matches!(err, FeedError::MalformedRow(_)));
    }

    #[test]
    fn garbage_date_is_malformed() {
        let html = r#"<table><tbody>
        <tr><td>2026/03/01</td><td>7203</td><td>トヨタ</td><td>1：5</td><td>March 31</td></tr>
        </tbody></table>"#;
        let err = feed().parse_split_page(html).unwrap_err();
        assert!(matches!(err, FeedError::MalformedRow(_)));
    }
}
