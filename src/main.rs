//! evalboard-inspect: load an analysis payload, print chart props, and
//! optionally drill into one bar against the configured backend.
//!
//! Usage: evalboard-inspect <analysis.json> [--metric NAME] [--bar FEATURE:BUCKET[:SYSTEM]] [--page N]

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::json;

use evalboard::logging::{self, log, obj, v_int, v_str, Domain, Level};
use evalboard::results::report::AnalysisPayload;
use evalboard::{ComparisonReport, Config, HttpProvider, ResultsExplorer, Transition};

struct Args {
    path: String,
    metric: Option<String>,
    bar: Option<(String, usize, usize)>,
    page: usize,
}

fn parse_bar(raw: &str) -> Result<(String, usize, usize)> {
    let mut parts = raw.rsplitn(3, ':').collect::<Vec<_>>();
    parts.reverse();
    match parts.as_slice() {
        [feature, bucket] => Ok((feature.to_string(), bucket.parse()?, 0)),
        [feature, bucket, system] => {
            // feature names may themselves contain ':'
            match (bucket.parse::<usize>(), system.parse::<usize>()) {
                (Ok(b), Ok(s)) => Ok((feature.to_string(), b, s)),
                _ => Ok((format!("{}:{}", feature, bucket), system.parse()?, 0)),
            }
        }
        _ => bail!("--bar expects FEATURE:BUCKET[:SYSTEM], got {}", raw),
    }
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut parsed = Args {
        path: String::new(),
        metric: None,
        bar: None,
        page: 1,
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--metric" => parsed.metric = Some(args.next().ok_or_else(|| anyhow!("--metric needs a value"))?),
            "--bar" => parsed.bar = Some(parse_bar(&args.next().ok_or_else(|| anyhow!("--bar needs a value"))?)?),
            "--page" => parsed.page = args.next().ok_or_else(|| anyhow!("--page needs a value"))?.parse()?,
            _ if parsed.path.is_empty() => parsed.path = arg,
            other => bail!("unexpected argument: {}", other),
        }
    }
    if parsed.path.is_empty() {
        bail!("usage: evalboard-inspect <analysis.json> [--metric NAME] [--bar FEATURE:BUCKET[:SYSTEM]] [--page N]");
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args()?;
    let cfg = Config::from_env();
    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[("api_base", v_str(&cfg.api_base)), ("payload", v_str(&args.path))]),
    );

    let raw = std::fs::read_to_string(&args.path).with_context(|| format!("failed to read {}", args.path))?;
    let payload: AnalysisPayload = serde_json::from_str(&raw).with_context(|| format!("invalid payload in {}", args.path))?;
    let report = ComparisonReport::build(&payload);
    for rejected in &report.rejected {
        eprintln!(
            "skipped {} by {} ({}): {}",
            rejected.metric, rejected.feature, rejected.system_id, rejected.error
        );
    }

    let provider = Arc::new(HttpProvider::new(&cfg)?);
    let mut explorer = ResultsExplorer::new(report, provider);
    if let Some(metric) = &args.metric {
        if !explorer.set_active_metric(metric) {
            bail!("unknown metric {}", metric);
        }
    }

    let mut out = json!({
        "metric": explorer.active_metric(),
        "charts": explorer.charts(),
    });

    if let Some((feature, bucket, system)) = &args.bar {
        let transition = explorer.on_bar_click(feature, *bucket, *system).await?;
        if args.page > 1 && transition == Transition::Committed {
            explorer.on_page_change(args.page);
            explorer.refresh_table().await;
        }
        if let Some(notice) = explorer.notice() {
            eprintln!("{}", notice.message);
        }
        out["examples"] = json!(explorer.table_props());
        log(
            Level::Info,
            Domain::System,
            "drilldown_done",
            obj(&[
                ("feature", v_str(feature)),
                ("bucket", v_int(*bucket as u64)),
                ("committed", json!(transition == Transition::Committed)),
            ]),
        );
    }

    println!("{}", serde_json::to_string_pretty(&out)?);
    logging::flush();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bar_forms() {
        assert_eq!(parse_bar("len:2").unwrap(), ("len".to_string(), 2, 0));
        assert_eq!(parse_bar("len:2:1").unwrap(), ("len".to_string(), 2, 1));
        assert_eq!(parse_bar("a:b:3").unwrap(), ("a:b".to_string(), 3, 0));
        assert!(parse_bar("len").is_err());
    }
}
