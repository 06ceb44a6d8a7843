//! Response models for the Yahoo Finance API.

use serde::Deserialize;

// ============================================================================
// Chart API (v8/finance/chart)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    pub chart: Chart,
}

#[derive(Debug, Deserialize)]
pub struct Chart {
    pub result: Option<Vec<ChartResult>>,
    pub error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    pub symbol: String,
    pub currency: Option<String>,
    pub exchange_name: Option<String>,
    pub regular_market_price: Option<f64>,
    pub regular_market_time: Option<i64>,
    /// Previous close as reported by the chart endpoint
    pub chart_previous_close: Option<f64>,
    pub previous_close: Option<f64>,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChartError {
    pub code: String,
    pub description: String,
}

// ============================================================================
// Search API (v1/finance/search)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub quotes: Vec<SearchQuote>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuote {
    #[serde(default)]
    pub symbol: String,
    pub shortname: Option<String>,
    pub longname: Option<String>,
    pub exchange: Option<String>,
}

// ============================================================================
// quoteSummary API (v10/finance/quoteSummary)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    pub quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
pub struct QuoteSummary {
    #[serde(default)]
    pub result: Vec<QuoteSummaryResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummaryResult {
    pub price: Option<PriceModule>,
    pub summary_profile: Option<SummaryProfileModule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceModule {
    pub short_name: Option<String>,
    pub long_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryProfileModule {
    pub sector: Option<String>,
    pub industry: Option<String>,
}
