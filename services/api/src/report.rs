use chrono::{Duration, NaiveDate, Utc};
use clap::Args;
use std::path::PathBuf;
use vaultra::config::PipelineConfig;
use vaultra::error::{ApiError, AppError};
use vaultra::ids::BusinessId;
use vaultra::integrations::{LedgerCsvImporter, LedgerTransaction};
use vaultra::metrics::{compute_snapshot, score_snapshot, MetricSnapshot, ScoreOutcome, SnapshotInputs};
use vaultra::recommendations::rules;
use vaultra::recommendations::Recommendation;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Charge export with id, created, amount, currency, status columns
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// First day of the window (YYYY-MM-DD). Defaults to the window length before --end.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) start: Option<NaiveDate>,
    /// Last day of the window (YYYY-MM-DD). Defaults to the newest charge in the export.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) end: Option<NaiveDate>,
    /// Window length in days when --start is omitted
    #[arg(long)]
    pub(crate) window_days: Option<i64>,
}

pub(crate) struct ScoreReport {
    pub(crate) snapshot: MetricSnapshot,
    pub(crate) outcome: ScoreOutcome,
    pub(crate) recommendations: Vec<Recommendation>,
}

pub(crate) fn run_score_report(args: ScoreArgs) -> Result<(), AppError> {
    let transactions = LedgerCsvImporter::from_path(&args.csv)?;
    let report = build_score_report(
        &transactions,
        args.start,
        args.end,
        args.window_days,
        Utc::now().date_naive(),
    )?;
    render_score_report(&report);
    Ok(())
}

pub(crate) fn build_score_report(
    transactions: &[LedgerTransaction],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    window_days: Option<i64>,
    today: NaiveDate,
) -> Result<ScoreReport, ApiError> {
    let defaults = PipelineConfig::default();
    let window_days = window_days.unwrap_or(defaults.window_days);

    let end = end
        .or_else(|| {
            transactions
                .iter()
                .map(|transaction| transaction.created_at.date_naive())
                .max()
        })
        .unwrap_or(today);
    let start = start.unwrap_or(end - Duration::days(window_days));
    if start > end {
        return Err(ApiError::validation("--start must not be after --end"));
    }

    let business_id = BusinessId::new();
    let now = Utc::now();
    let snapshot = compute_snapshot(
        business_id,
        start,
        end,
        SnapshotInputs {
            transactions,
            payouts: &[],
            payout_grace_days: defaults.payout_grace_days,
        },
        now,
    );
    let outcome = score_snapshot(&snapshot);
    let recommendations = rules::evaluate(business_id, Some(&snapshot), Some(outcome.score), now);

    Ok(ScoreReport {
        snapshot,
        outcome,
        recommendations,
    })
}

fn render_score_report(report: &ScoreReport) {
    let snapshot = &report.snapshot;
    println!("Funding readiness report");
    println!(
        "Window: {} -> {}",
        snapshot.period_start, snapshot.period_end
    );
    println!(
        "Readiness: {} ({})",
        report.outcome.score,
        report.outcome.tier.as_str()
    );

    println!("\nMetrics");
    println!("- Revenue: {:.2}", snapshot.revenue_total);
    println!("- Transactions: {}", snapshot.transaction_count);
    println!("- Revenue volatility: {}", optional(snapshot.revenue_volatility));
    println!("- Chargeback ratio: {}", optional(snapshot.chargeback_ratio));
    println!("- Refund ratio: {}", optional(snapshot.refund_ratio));
    println!("- MRR: {}", optional(snapshot.mrr));

    if !report.outcome.components.is_empty() {
        println!("\nComponents");
        for (name, value) in &report.outcome.components {
            println!("- {name}: {value:.3}");
        }
    }

    if report.recommendations.is_empty() {
        println!("\nRecommendations: none");
    } else {
        println!("\nRecommendations");
        for recommendation in &report.recommendations {
            println!(
                "- [{}] {} ({})",
                recommendation.priority.as_str(),
                recommendation.title,
                recommendation.estimated_impact
            );
        }
    }
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |value| format!("{value:.3}"))
}
