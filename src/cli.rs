use crate::engine::{ingest, AnalysisEngine};
use crate::flow::{reduce, validate_submission, Action, AppState, AppStatus};
use crate::model::{AnalysisConfig, AnalysisParams, TierId};
use crate::notify::Notifier;
use crate::storage::Storage;
use anyhow::{Context, Result};
use clap::Parser;
use rand::RngCore;
use std::time::Duration;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "cloudcost-anomaly",
    version,
    about = "AI-assisted cloud billing anomaly detection with optional TUI"
)]
pub struct Cli {
    /// Billing document(s) to analyze (CSV, PDF, PNG or JPEG)
    #[arg(value_name = "FILE")]
    pub documents: Vec<std::path::PathBuf>,

    /// Cloud provider(s) in use, e.g. "AWS, GCP"
    #[arg(long)]
    pub provider: Option<String>,

    /// Expected monthly budget range, e.g. "$5,000 - $7,000"
    #[arg(long)]
    pub budget: Option<String>,

    /// Core services in use, e.g. "EC2, S3, RDS"
    #[arg(long)]
    pub services: Option<String>,

    /// Pricing tier (scan, monitoring, bonus)
    #[arg(long)]
    pub tier: Option<TierId>,

    /// Print the sectioned report as JSON and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print the sectioned report as text and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Base URL of the AI service
    #[arg(long, default_value = "https://generativelanguage.googleapis.com")]
    pub base_url: String,

    /// Model to request
    #[arg(long, default_value = "gemini-1.5-pro-latest")]
    pub model: String,

    /// API key for the AI service
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Request timeout for the AI call
    #[arg(long, default_value = "120s")]
    pub request_timeout: humantime::Duration,

    /// Simulated payment-confirmation delay (interactive mode only)
    #[arg(long, default_value = "9500ms")]
    pub payment_confirm_delay: humantime::Duration,

    /// Save the report as markdown under the data dir
    #[arg(long)]
    pub save: bool,

    /// Export the raw report to an explicit markdown path
    #[arg(long)]
    pub export_md: Option<std::path::PathBuf>,

    /// Email the report to this address after a successful analysis
    #[arg(long)]
    pub email: Option<String>,

    /// Endpoint for report email delivery
    #[arg(long, env = "ANOMALY_EMAIL_ENDPOINT")]
    pub email_endpoint: Option<String>,

    /// Endpoint for shareable report links
    #[arg(long, env = "ANOMALY_SHARE_ENDPOINT")]
    pub share_endpoint: Option<String>,

    /// Data directory override (reports, remembered parameters)
    #[arg(long)]
    pub data_dir: Option<std::path::PathBuf>,
}

pub async fn run(args: Cli) -> Result<()> {
    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_oneshot(args).await;
        }
    }

    run_oneshot(args).await
}

/// Generate a random request id for log correlation.
fn gen_request_id() -> String {
    let mut b = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut b);
    format!("{:016x}", u64::from_le_bytes(b))
}

/// Build an `AnalysisConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> AnalysisConfig {
    AnalysisConfig {
        base_url: args.base_url.clone(),
        model: args.model.clone(),
        request_id: gen_request_id(),
        user_agent: format!("cloudcost-anomaly/{}", env!("CARGO_PKG_VERSION")),
        request_timeout: Duration::from(args.request_timeout),
        payment_confirm_delay: Duration::from(args.payment_confirm_delay),
        email_endpoint: args.email_endpoint.clone(),
        share_endpoint: args.share_endpoint.clone(),
    }
}

pub fn build_storage(args: &Cli) -> Storage {
    Storage::new(
        args.data_dir
            .clone()
            .unwrap_or_else(Storage::default_root),
    )
}

/// One-shot mode: ingest, drive the state machine end to end without the
/// payment simulation, call the AI, and print the sectioned report.
async fn run_oneshot(args: Cli) -> Result<()> {
    let params = AnalysisParams {
        provider: args
            .provider
            .clone()
            .context("--provider is required in non-interactive mode")?,
        budget: args
            .budget
            .clone()
            .context("--budget is required in non-interactive mode")?,
        services: args
            .services
            .clone()
            .context("--services is required in non-interactive mode")?,
    };
    if args.documents.is_empty() {
        anyhow::bail!("at least one billing document is required");
    }

    let cfg = build_config(&args);
    let storage = build_storage(&args);
    let engine = AnalysisEngine::new(cfg.clone(), args.api_key.clone())?;
    let notifier = Notifier::new(cfg.email_endpoint.clone(), cfg.share_endpoint.clone());

    // The reducer is the single source of truth for flow state even here; the
    // payment stop simply collapses to an immediate confirmation.
    let tier = args.tier.unwrap_or(TierId::Scan);
    let mut state = reduce(&AppState::default(), Action::SelectTier(tier));
    let documents = match ingest::load_documents(&args.documents) {
        Ok(docs) => docs,
        Err(e) => {
            state = reduce(
                &state,
                Action::AnalysisFailed {
                    message: e.to_string(),
                },
            );
            anyhow::bail!("{}", state.error_message);
        }
    };
    state = reduce(&state, Action::SetDocuments(documents));
    validate_submission(&state).map_err(anyhow::Error::msg)?;
    state = reduce(&state, Action::SubmitParameters(params.clone()));
    state = reduce(&state, Action::ProceedToPayment);
    state = reduce(&state, Action::StartAnalysis);
    debug_assert_eq!(state.status, AppStatus::Analyzing);

    let action = match engine.analyze(&state.documents, &params).await {
        Ok(report) => Action::AnalysisSucceeded { result: report },
        Err(e) => Action::AnalysisFailed {
            message: e.to_string(),
        },
    };
    state = reduce(&state, action);

    if state.status == AppStatus::Error {
        anyhow::bail!("{}", state.error_message);
    }

    let report = state.analysis_result.as_str();
    let sections = crate::report::sectionize(report);

    if args.json {
        let out = serde_json::json!({
            "status": state.status,
            "tier": tier,
            "params": params,
            "sections": sections
                .iter()
                .map(|(k, v)| (k, v.to_string()))
                .collect::<std::collections::BTreeMap<_, _>>(),
            "report": report,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        let summary = crate::text_summary::build_text_summary(report, &sections);
        for line in summary.lines {
            println!("{line}");
        }
    }

    if let Some(path) = args.export_md.as_deref() {
        Storage::export_markdown(path, report)?;
        eprintln!("Exported: {}", path.display());
    }
    if args.save {
        let path = storage.save_report(report)?;
        eprintln!("Saved: {}", path.display());
    }
    if let Some(params) = state.last_params.as_ref() {
        let _ = storage.save_last_params(params);
    }
    if let Some(to) = args.email.as_deref() {
        crate::notify::validate_email(to).map_err(anyhow::Error::msg)?;
        notifier
            .send_report_email(to, report)
            .await
            .context("send report email")?;
        eprintln!("Report sent to {to}");
    }

    Ok(())
}
