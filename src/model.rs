use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub base_url: String,
    pub model: String,
    pub request_id: String,
    pub user_agent: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub payment_confirm_delay: Duration,
    pub email_endpoint: Option<String>,
    pub share_endpoint: Option<String>,
}

/// Fixed pricing catalog id. Tier selection is required before analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierId {
    Scan,
    Monitoring,
    Bonus,
}

impl std::str::FromStr for TierId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scan" => Ok(TierId::Scan),
            "monitoring" => Ok(TierId::Monitoring),
            "bonus" => Ok(TierId::Bonus),
            other => Err(format!(
                "unknown tier '{other}' (expected scan, monitoring or bonus)"
            )),
        }
    }
}

pub struct Tier {
    pub id: TierId,
    pub name: &'static str,
    pub price: &'static str,
    pub description: &'static str,
}

pub const TIERS: &[Tier] = &[
    Tier {
        id: TierId::Scan,
        name: "One-Time Leak Scan",
        price: "$35",
        description: "A comprehensive, one-off analysis of a single billing document.",
    },
    Tier {
        id: TierId::Monitoring,
        name: "Auto-Alert Monitoring",
        price: "$55",
        description: "Monthly monitoring with automated email alerts for detected anomalies.",
    },
    Tier {
        id: TierId::Bonus,
        name: "Savings-Triggered Bonus",
        price: "10-15%",
        description: "Pay only a small percentage of the actual savings we identify for you.",
    },
];

/// Look up the catalog entry for a tier id.
pub fn tier_details(id: TierId) -> &'static Tier {
    TIERS.iter().find(|t| t.id == id).unwrap_or(&TIERS[0])
}

/// Free-text context supplied by the user alongside the billing document(s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisParams {
    pub provider: String,
    pub budget: String,
    pub services: String,
}

/// Mime types the AI collaborator accepts. Anything else is rejected at ingestion.
pub const ACCEPTED_MIME_TYPES: &[&str] = &[
    "text/csv",
    "text/plain",
    "application/pdf",
    "image/png",
    "image/jpeg",
];

/// One user-supplied billing document. Contents live in memory only for the
/// duration of the session; nothing is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub content: Vec<u8>,
}

impl Document {
    /// CSV and plain-text payloads are inlined into the prompt; everything else
    /// travels as base64 inline data.
    pub fn is_textual(&self) -> bool {
        matches!(self.mime_type.as_str(), "text/csv" | "text/plain")
    }
}

/// Events emitted by the session controller and consumed by presentation layers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Full state snapshot after a transition. Boxed to keep the enum small.
    State(Box<crate::flow::AppState>),
    /// Human-readable status line (payment staging, save confirmations, ...).
    Info(String),
    /// Simulated analysis progress for the TUI spinner.
    Progress { percent: u8, message: String },
}

/// Payment-confirmation staging messages, shown while the confirmation timers run.
pub const PAYMENT_STAGE_MESSAGES: &[&str] = &[
    "Waiting for payment confirmation...",
    "This may take a moment. Please complete the payment.",
    "Payment confirmed! Preparing your analysis environment...",
];

/// Progress thresholds and messages for the analyzing phase.
pub const ANALYSIS_STAGE_MESSAGES: &[(u8, &str)] = &[
    (0, "Connecting to AI..."),
    (15, "Parsing your document(s)..."),
    (40, "Analyzing spending patterns..."),
    (65, "Checking for anomalies..."),
    (85, "Compiling your report..."),
];

/// Latest stage message at or below the given progress percentage.
pub fn analysis_stage_message(percent: u8) -> &'static str {
    ANALYSIS_STAGE_MESSAGES
        .iter()
        .rev()
        .find(|(at, _)| percent >= *at)
        .map(|(_, msg)| *msg)
        .unwrap_or(ANALYSIS_STAGE_MESSAGES[0].1)
}
