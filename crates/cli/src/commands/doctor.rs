use chantier_agent::{AgentRuntime, QuoteGenerator};
use chantier_core::config::{AppConfig, LoadOptions};
use chantier_db::DatastoreRepositories;
use serde::Serialize;

use super::escape_json;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const COMPONENT_CHECKS: [&str; 4] =
    ["llm_readiness", "datastore_readiness", "orchestrator_readiness", "runtime_assembly"];

pub fn run(json_output: bool) -> String {
    let report = build_report(AppConfig::load(LoadOptions::default()));

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\
                 \"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report(loaded: Result<AppConfig, chantier_core::ConfigError>) -> DoctorReport {
    let mut checks = Vec::new();

    match loaded {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_llm(&config));
            checks.push(check_datastore(&config));
            checks.push(check_orchestrator(&config));
            checks.push(check_runtime_assembly(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(COMPONENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let degraded = checks.iter().any(|check| check.status == CheckStatus::Warn);
    let (overall_status, summary) = if failed {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else if degraded {
        (CheckStatus::Warn, "doctor: ready with degraded components")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_llm(config: &AppConfig) -> DoctorCheck {
    if config.llm.is_configured() {
        DoctorCheck {
            name: "llm_readiness",
            status: CheckStatus::Pass,
            details: format!(
                "classification model `{}`, quote model `{}`",
                config.llm.model, config.llm.quote_model
            ),
        }
    } else {
        DoctorCheck {
            name: "llm_readiness",
            status: CheckStatus::Warn,
            details: "no api key: turns default to dictation and quote generation is refused"
                .to_string(),
        }
    }
}

fn check_datastore(config: &AppConfig) -> DoctorCheck {
    if config.datastore.is_configured() {
        DoctorCheck {
            name: "datastore_readiness",
            status: CheckStatus::Pass,
            details: format!("datastore api at `{}`", config.datastore.base_url),
        }
    } else {
        DoctorCheck {
            name: "datastore_readiness",
            status: CheckStatus::Warn,
            details: "no credentials: readback, correction, info and quotes cannot read data"
                .to_string(),
        }
    }
}

fn check_orchestrator(config: &AppConfig) -> DoctorCheck {
    match config.orchestrator.url.as_deref() {
        Some(url) => DoctorCheck {
            name: "orchestrator_readiness",
            status: CheckStatus::Pass,
            details: format!("remote orchestrator at `{url}`"),
        },
        None => DoctorCheck {
            name: "orchestrator_readiness",
            status: CheckStatus::Warn,
            details: "no webhook: every turn uses the local classifier".to_string(),
        },
    }
}

fn check_runtime_assembly(config: &AppConfig) -> DoctorCheck {
    let assembled = DatastoreRepositories::from_config(&config.datastore)
        .map_err(|error| format!("datastore client: {error}"))
        .and_then(|repositories| {
            AgentRuntime::from_config(config, &repositories)
                .map_err(|error| format!("agent runtime: {error}"))?;
            QuoteGenerator::from_config(config, &repositories)
                .map_err(|error| format!("quote generator: {error}"))
        });

    match assembled {
        Ok(_) => DoctorCheck {
            name: "runtime_assembly",
            status: CheckStatus::Pass,
            details: "agent runtime and quote generator built".to_string(),
        },
        Err(details) => {
            DoctorCheck { name: "runtime_assembly", status: CheckStatus::Fail, details }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use chantier_core::config::AppConfig;
    use chantier_core::ConfigError;

    use super::{build_report, render_human, CheckStatus};

    #[test]
    fn default_config_is_ready_but_degraded() {
        let report = build_report(Ok(AppConfig::default()));

        assert_eq!(report.overall_status, CheckStatus::Warn);
        assert_eq!(report.checks.len(), 5);
        let assembly = report.checks.last().expect("assembly check");
        assert_eq!(assembly.status, CheckStatus::Pass);
    }

    #[test]
    fn config_failure_skips_component_checks() {
        let report =
            build_report(Err(ConfigError::Validation("server.port must be > 0".to_string())));

        assert_eq!(report.overall_status, CheckStatus::Fail);
        assert!(report.checks[1..].iter().all(|check| check.status == CheckStatus::Skipped));
        assert!(render_human(&report).contains("- [fail] config_validation: "));
    }
}
