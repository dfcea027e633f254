use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use vaultra::jobs::JobKind;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_job(raw: &str) -> Result<JobKind, String> {
    raw.parse::<JobKind>().map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cli_arguments() {
        assert_eq!(
            parse_date("2024-03-31"),
            Ok(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap())
        );
        assert!(parse_date("31/03/2024").is_err());
        assert_eq!(parse_job("metrics"), Ok(JobKind::Metrics));
        assert_eq!(parse_job("reindex"), Err("unknown job 'reindex'".to_string()));
    }
}
