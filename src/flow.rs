//! Checkout/analysis state machine.
//!
//! A pure reducer over a single `AppState` instance. The session controller
//! dispatches actions and applies the returned state wholesale; timers and the
//! outstanding AI call live in the controller, never here.

use crate::model::{AnalysisParams, Document, TierId};

/// Application status. Exactly one is active at a time and it determines which
/// other `AppState` fields are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AppStatus {
    Initial,
    PendingPayment,
    AwaitingPaymentConfirmation,
    Analyzing,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub status: AppStatus,
    pub selected_tier: Option<TierId>,
    pub documents: Vec<Document>,
    /// Params for the submission currently in flight. Cleared on cancel/reset.
    pub pending_params: Option<AnalysisParams>,
    /// Params of the last completed analysis. Survives `Rerun` so the next form
    /// can be pre-filled.
    pub last_params: Option<AnalysisParams>,
    /// Raw report text. Meaningful only in `Complete`.
    pub analysis_result: String,
    /// Meaningful only in `Error`.
    pub error_message: String,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            status: AppStatus::Initial,
            selected_tier: None,
            documents: Vec::new(),
            pending_params: None,
            last_params: None,
            analysis_result: String::new(),
            error_message: String::new(),
        }
    }
}

/// One discrete user action or task/timer completion.
#[derive(Debug, Clone)]
pub enum Action {
    SelectTier(TierId),
    SetDocuments(Vec<Document>),
    SubmitParameters(AnalysisParams),
    CancelPayment,
    ProceedToPayment,
    StartAnalysis,
    AnalysisSucceeded { result: String },
    AnalysisFailed { message: String },
    Reset,
    Rerun,
}

/// Why a `SubmitParameters` action was rejected, surfaced to the user without
/// leaving `Initial`.
pub fn validate_submission(state: &AppState) -> Result<(), String> {
    if state.selected_tier.is_none() {
        return Err("Please choose a plan before starting the analysis.".into());
    }
    if state.documents.is_empty() {
        return Err("Please add at least one billing document before starting the analysis.".into());
    }
    Ok(())
}

/// Pure transition function. Every `(status, action)` pair yields a next state;
/// pairs outside the transition table are no-ops.
pub fn reduce(state: &AppState, action: Action) -> AppState {
    use AppStatus::*;

    match (state.status, action) {
        (Initial, Action::SelectTier(tier)) => AppState {
            selected_tier: Some(tier),
            ..state.clone()
        },
        (Initial, Action::SetDocuments(docs)) => AppState {
            documents: docs,
            ..state.clone()
        },
        (Initial, Action::SubmitParameters(params)) => {
            if validate_submission(state).is_err() {
                return state.clone();
            }
            AppState {
                status: PendingPayment,
                pending_params: Some(params),
                ..state.clone()
            }
        }
        // Cancel works until the analysis itself starts; the controller aborts
        // the confirmation timer on the way out.
        (PendingPayment | AwaitingPaymentConfirmation, Action::CancelPayment) => AppState {
            status: Initial,
            pending_params: None,
            ..state.clone()
        },
        (PendingPayment, Action::ProceedToPayment) => AppState {
            status: AwaitingPaymentConfirmation,
            ..state.clone()
        },
        (AwaitingPaymentConfirmation, Action::StartAnalysis) => AppState {
            status: Analyzing,
            analysis_result: String::new(),
            error_message: String::new(),
            ..state.clone()
        },
        (Analyzing, Action::AnalysisSucceeded { result }) => AppState {
            status: Complete,
            analysis_result: result,
            last_params: state.pending_params.clone(),
            ..state.clone()
        },
        // Any phase may fail: file ingestion errors arrive before Analyzing.
        (_, Action::AnalysisFailed { message }) => AppState {
            status: Error,
            error_message: message,
            ..state.clone()
        },
        (Complete | Error, Action::Reset) => AppState::default(),
        (Complete | Error, Action::Rerun) => AppState {
            last_params: state.last_params.clone(),
            ..AppState::default()
        },
        // Everything else is outside the transition table.
        (_, _) => state.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, mime: &str) -> Document {
        Document {
            name: name.into(),
            size: 64,
            mime_type: mime.into(),
            content: b"service,cost\nec2,100\n".to_vec(),
        }
    }

    fn params() -> AnalysisParams {
        AnalysisParams {
            provider: "AWS".into(),
            budget: "$5,000".into(),
            services: "EC2,S3".into(),
        }
    }

    fn ready_state() -> AppState {
        let s = reduce(&AppState::default(), Action::SelectTier(TierId::Scan));
        reduce(&s, Action::SetDocuments(vec![doc("bill.csv", "text/csv")]))
    }

    #[test]
    fn submit_without_documents_stays_initial() {
        let s = reduce(&AppState::default(), Action::SelectTier(TierId::Scan));
        let next = reduce(&s, Action::SubmitParameters(params()));
        assert_eq!(next.status, AppStatus::Initial);
        assert!(next.pending_params.is_none());
        assert!(validate_submission(&s).is_err());
    }

    #[test]
    fn submit_without_tier_stays_initial() {
        let s = reduce(
            &AppState::default(),
            Action::SetDocuments(vec![doc("bill.csv", "text/csv")]),
        );
        let next = reduce(&s, Action::SubmitParameters(params()));
        assert_eq!(next.status, AppStatus::Initial);
        assert!(validate_submission(&s).is_err());
    }

    #[test]
    fn happy_path_reaches_complete() {
        let s = ready_state();
        let s = reduce(&s, Action::SubmitParameters(params()));
        assert_eq!(s.status, AppStatus::PendingPayment);
        let s = reduce(&s, Action::ProceedToPayment);
        assert_eq!(s.status, AppStatus::AwaitingPaymentConfirmation);
        let s = reduce(&s, Action::StartAnalysis);
        assert_eq!(s.status, AppStatus::Analyzing);
        let s = reduce(
            &s,
            Action::AnalysisSucceeded {
                result: "🔍 Cloud Cost Anomaly Summary\nAll clear.".into(),
            },
        );
        assert_eq!(s.status, AppStatus::Complete);
        assert!(s.analysis_result.contains("All clear"));
        assert_eq!(s.last_params, Some(params()));
    }

    #[test]
    fn cancel_payment_returns_to_initial_and_clears_pending() {
        let s = reduce(&ready_state(), Action::SubmitParameters(params()));
        let s = reduce(&s, Action::CancelPayment);
        assert_eq!(s.status, AppStatus::Initial);
        assert!(s.pending_params.is_none());
        // Tier and documents survive a cancel.
        assert_eq!(s.selected_tier, Some(TierId::Scan));
        assert_eq!(s.documents.len(), 1);
    }

    #[test]
    fn status_serializes_camel_case() {
        let json = serde_json::to_string(&AppStatus::AwaitingPaymentConfirmation).unwrap();
        assert_eq!(json, "\"awaitingPaymentConfirmation\"");
    }

    #[test]
    fn cancel_during_confirmation_returns_to_initial() {
        let s = reduce(&ready_state(), Action::SubmitParameters(params()));
        let s = reduce(&s, Action::ProceedToPayment);
        assert_eq!(s.status, AppStatus::AwaitingPaymentConfirmation);
        let s = reduce(&s, Action::CancelPayment);
        assert_eq!(s.status, AppStatus::Initial);
        assert!(s.pending_params.is_none());
        assert_eq!(s.selected_tier, Some(TierId::Scan));
        assert_eq!(s.documents.len(), 1);
    }

    #[test]
    fn failure_routes_to_error_with_message() {
        let s = reduce(&ready_state(), Action::SubmitParameters(params()));
        let s = reduce(&s, Action::ProceedToPayment);
        let s = reduce(&s, Action::StartAnalysis);
        let s = reduce(
            &s,
            Action::AnalysisFailed {
                message: "Unsupported file type: application/zip".into(),
            },
        );
        assert_eq!(s.status, AppStatus::Error);
        assert_eq!(s.error_message, "Unsupported file type: application/zip");
    }

    #[test]
    fn reset_yields_true_initial_state() {
        let mut s = reduce(&ready_state(), Action::SubmitParameters(params()));
        s = reduce(&s, Action::ProceedToPayment);
        s = reduce(&s, Action::StartAnalysis);
        s = reduce(
            &s,
            Action::AnalysisSucceeded {
                result: "report".into(),
            },
        );
        let reset = reduce(&s, Action::Reset);
        assert_eq!(reset, AppState::default());

        // Same property from the error phase.
        let failed = reduce(
            &s,
            Action::AnalysisFailed {
                message: "boom".into(),
            },
        );
        assert_eq!(failed.status, AppStatus::Error);
        assert_eq!(reduce(&failed, Action::Reset), AppState::default());
    }

    #[test]
    fn rerun_keeps_only_last_params() {
        let mut s = reduce(&ready_state(), Action::SubmitParameters(params()));
        s = reduce(&s, Action::ProceedToPayment);
        s = reduce(&s, Action::StartAnalysis);
        s = reduce(
            &s,
            Action::AnalysisSucceeded {
                result: "report".into(),
            },
        );
        let rerun = reduce(&s, Action::Rerun);
        assert_eq!(rerun.last_params, Some(params()));
        assert_eq!(
            AppState {
                last_params: None,
                ..rerun
            },
            AppState::default()
        );

        // Same property from the error phase.
        let failed = reduce(
            &s,
            Action::AnalysisFailed {
                message: "boom".into(),
            },
        );
        assert_eq!(failed.status, AppStatus::Error);
        let rerun = reduce(&failed, Action::Rerun);
        assert_eq!(rerun.last_params, Some(params()));
        assert_eq!(
            AppState {
                last_params: None,
                ..rerun
            },
            AppState::default()
        );
    }

    #[test]
    fn select_and_set_are_noops_outside_initial() {
        let pending = reduce(&ready_state(), Action::SubmitParameters(params()));
        let after_select = reduce(&pending, Action::SelectTier(TierId::Bonus));
        assert_eq!(after_select, pending);
        let after_set = reduce(&pending, Action::SetDocuments(vec![]));
        assert_eq!(after_set, pending);
    }

    #[test]
    fn undefined_pairs_never_change_status() {
        let actions = || {
            vec![
                Action::SelectTier(TierId::Scan),
                Action::SetDocuments(vec![doc("a.csv", "text/csv")]),
                Action::SubmitParameters(params()),
                Action::CancelPayment,
                Action::ProceedToPayment,
                Action::StartAnalysis,
                Action::AnalysisSucceeded {
                    result: "r".into(),
                },
                Action::Reset,
                Action::Rerun,
            ]
        };
        // From Analyzing, only success/failure transitions apply.
        let mut s = reduce(&ready_state(), Action::SubmitParameters(params()));
        s = reduce(&s, Action::ProceedToPayment);
        s = reduce(&s, Action::StartAnalysis);
        for a in actions() {
            let next = reduce(&s, a);
            assert!(matches!(
                next.status,
                AppStatus::Analyzing | AppStatus::Complete
            ));
        }
    }

    #[test]
    fn status_always_one_of_six() {
        // Drive a long arbitrary action sequence and check the invariant holds.
        let seq = vec![
            Action::ProceedToPayment,
            Action::SelectTier(TierId::Monitoring),
            Action::SetDocuments(vec![doc("bill.pdf", "application/pdf")]),
            Action::SubmitParameters(params()),
            Action::SubmitParameters(params()),
            Action::ProceedToPayment,
            Action::StartAnalysis,
            Action::StartAnalysis,
            Action::AnalysisFailed {
                message: "boom".into(),
            },
            Action::Rerun,
            Action::Reset,
        ];
        let mut s = AppState::default();
        for a in seq {
            s = reduce(&s, a);
            assert!(matches!(
                s.status,
                AppStatus::Initial
                    | AppStatus::PendingPayment
                    | AppStatus::AwaitingPaymentConfirmation
                    | AppStatus::Analyzing
                    | AppStatus::Complete
                    | AppStatus::Error
            ));
        }
    }
}
