use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use finsource_core::models::Period;
use finsource_core::CacheNamespace;

#[derive(Parser, Debug)]
#[command(
    name = "finsource",
    version,
    about = "Cached, rate-limited financial data with provider failover"
)]
pub struct Cli {
    /// Primary data source (overrides FINSOURCE_DATA_SOURCE).
    #[arg(long, global = true)]
    pub source: Option<String>,

    /// Fail with an error when every source fails instead of printing an empty result.
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Skip the cache read and fetch from providers.
    #[arg(long, global = true, default_value_t = false)]
    pub force: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Daily price bars for one ticker.
    Prices(RangeArgs),
    /// Financial metrics, newest first.
    Metrics(PeriodArgs),
    /// Market capitalization on a date.
    MarketCap(DateArgs),
    /// Selected financial statement line items.
    LineItems {
        #[command(flatten)]
        period: PeriodArgs,

        /// Comma-separated line item names, e.g. revenue,free_cash_flow.
        #[arg(long, value_delimiter = ',', required = true)]
        items: Vec<String>,
    },
    /// Company news articles.
    News(WindowArgs),
    /// Insider trades.
    InsiderTrades(WindowArgs),
    /// Prices for several tickers with bounded concurrency.
    BatchPrices {
        #[arg(required = true)]
        tickers: Vec<String>,

        #[arg(long)]
        start: NaiveDate,

        #[arg(long)]
        end: NaiveDate,
    },
    /// Cache administration.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Provider availability, limiter state and cache statistics.
    Status,
}

#[derive(Args, Debug)]
pub struct RangeArgs {
    pub ticker: String,

    /// Start date (YYYY-MM-DD).
    #[arg(long)]
    pub start: NaiveDate,

    /// End date (YYYY-MM-DD).
    #[arg(long)]
    pub end: NaiveDate,
}

#[derive(Args, Debug)]
pub struct DateArgs {
    pub ticker: String,

    /// As-of date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub end: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct PeriodArgs {
    #[command(flatten)]
    pub date: DateArgs,

    /// ttm, annual or quarterly.
    #[arg(long, default_value = "ttm")]
    pub period: Period,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct WindowArgs {
    #[command(flatten)]
    pub date: DateArgs,

    /// Earliest date to include (YYYY-MM-DD).
    #[arg(long)]
    pub start: Option<NaiveDate>,

    #[arg(long, default_value_t = 1000)]
    pub limit: usize,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Entry counts, size and hit rate per namespace.
    Stats,
    /// Remove every entry, or one namespace.
    Clear {
        #[arg(long)]
        namespace: Option<CacheNamespace>,
    },
    /// Remove every entry keyed on a ticker.
    ClearTicker { ticker: String },
    /// List the keys stored in a namespace.
    Keys { namespace: CacheNamespace },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_line_items() {
        let cli = Cli::try_parse_from([
            "finsource",
            "--source",
            "poly",
            "line-items",
            "aapl",
            "--items",
            "revenue,free_cash_flow",
            "--period",
            "annual",
        ])
        .unwrap();
        assert_eq!(cli.source.as_deref(), Some("poly"));
        match cli.command {
            Command::LineItems { period, items } => {
                assert_eq!(items, vec!["revenue", "free_cash_flow"]);
                assert_eq!(period.period, Period::Annual);
                assert_eq!(period.limit, 10);
                assert!(period.date.end.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_cache_keys_namespace() {
        let cli = Cli::try_parse_from(["finsource", "cache", "keys", "prices"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Cache {
                action: CacheAction::Keys {
                    namespace: CacheNamespace::Prices
                }
            }
        ));
        assert!(Cli::try_parse_from(["finsource", "cache", "keys", "bogus"]).is_err());
    }
}
