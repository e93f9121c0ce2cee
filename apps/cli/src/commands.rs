use anyhow::Result;
use chrono::{NaiveDate, Utc};
use finsource_core::models::{
    InsiderTradeQuery, LineItemQuery, MarketCapQuery, MetricsQuery, NewsQuery, PriceQuery,
};
use finsource_market_data::{FinancialDataService, Operation};
use log::info;
use serde_json::{json, Value};

use crate::cli::{CacheAction, Cli, Command, DateArgs, WindowArgs};

pub async fn run(cli: &Cli, service: &FinancialDataService) -> Result<Value> {
    match &cli.command {
        Command::BatchPrices {
            tickers,
            start,
            end,
        } => {
            let prices = service
                .prices_for_tickers(tickers, *start, *end, cli.force)
                .await;
            Ok(serde_json::to_value(prices)?)
        }
        Command::Cache { action } => run_cache(action, service),
        Command::Status => Ok(serde_json::to_value(service.status())?),
        command => {
            let op = operation(command)?;
            fetch(cli, service, &op).await
        }
    }
}

async fn fetch(cli: &Cli, service: &FinancialDataService, op: &Operation) -> Result<Value> {
    info!("Fetching {} for {}", op.name(), op.ticker());
    let output = if cli.strict {
        service.try_execute(op, cli.force).await?
    } else {
        service.execute(op, cli.force).await
    };
    Ok(serde_json::to_value(output)?)
}

fn as_of(date: &DateArgs) -> NaiveDate {
    date.end.unwrap_or_else(|| Utc::now().date_naive())
}

fn news_query(args: &WindowArgs) -> Result<NewsQuery> {
    let query = NewsQuery::new(&args.date.ticker, as_of(&args.date))?.with_limit(args.limit);
    Ok(match args.start {
        Some(start) => query.with_start(start)?,
        None => query,
    })
}

fn insider_query(args: &WindowArgs) -> Result<InsiderTradeQuery> {
    let query =
        InsiderTradeQuery::new(&args.date.ticker, as_of(&args.date))?.with_limit(args.limit);
    Ok(match args.start {
        Some(start) => query.with_start(start)?,
        None => query,
    })
}

fn operation(command: &Command) -> Result<Operation> {
    let op = match command {
        Command::Prices(args) => {
            Operation::Prices(PriceQuery::new(&args.ticker, args.start, args.end)?)
        }
        Command::Metrics(args) => Operation::FinancialMetrics(
            MetricsQuery::new(&args.date.ticker, as_of(&args.date))?
                .with_period(args.period)
                .with_limit(args.limit),
        ),
        Command::MarketCap(args) => {
            Operation::MarketCap(MarketCapQuery::new(&args.ticker, as_of(args))?)
        }
        Command::LineItems { period, items } => Operation::LineItems(
            LineItemQuery::new(&period.date.ticker, items, as_of(&period.date))?
                .with_period(period.period)
                .with_limit(period.limit),
        ),
        Command::News(args) => Operation::CompanyNews(news_query(args)?),
        Command::InsiderTrades(args) => Operation::InsiderTrades(insider_query(args)?),
        Command::BatchPrices { .. } | Command::Cache { .. } | Command::Status => {
            anyhow::bail!("command does not fetch a single dataset")
        }
    };
    Ok(op)
}

fn run_cache(action: &CacheAction, service: &FinancialDataService) -> Result<Value> {
    let value = match action {
        CacheAction::Stats => serde_json::to_value(service.cache_stats()?)?,
        CacheAction::Clear { namespace: None } => json!({ "removed": service.clear_all()? }),
        CacheAction::Clear {
            namespace: Some(namespace),
        } => json!({
            "namespace": namespace.as_str(),
            "removed": service.cache().clear(Some(*namespace))?,
        }),
        CacheAction::ClearTicker { ticker } => json!({
            "ticker": ticker.trim().to_ascii_uppercase(),
            "removed": service.clear_for_ticker(ticker)?,
        }),
        CacheAction::Keys { namespace } => json!({
            "namespace": namespace.as_str(),
            "keys": service.cache().keys(*namespace)?,
        }),
    };
    Ok(value)
}
