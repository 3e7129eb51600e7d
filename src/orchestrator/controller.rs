//! Interactive session controller.
//!
//! Drives the checkout/analysis state machine: applies user actions through
//! the reducer, runs the payment-confirmation timers, spawns the AI call, and
//! publishes state snapshots and status lines for the UI.

use crate::engine::AnalysisEngine;
use crate::error::AnalysisError;
use crate::flow::{reduce, validate_submission, Action, AppState, AppStatus};
use crate::model::{analysis_stage_message, AnalysisConfig, SessionEvent, PAYMENT_STAGE_MESSAGES};
use crate::notify::Notifier;
use crate::storage::Storage;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Duration;
use tracing::{debug, warn};

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    /// A state-machine action from the transition table.
    Dispatch(Action),
    /// Save the completed report under the data dir.
    SaveReport,
    /// Email the completed report to the given address.
    EmailReport(String),
    /// Store the completed report at the share endpoint.
    ShareReport,
    /// Copy-to-clipboard and similar UI-local concerns never reach here.
    Quit,
}

/// Messages from the controller's own background tasks.
enum TaskMsg {
    PaymentStage(usize),
    PaymentConfirmed,
    AnalysisDone(Result<String, AnalysisError>),
    ShareDone(Result<String, anyhow::Error>),
}

/// Everything the controller needs besides its channels.
pub(crate) struct SessionDeps {
    pub engine: Arc<AnalysisEngine>,
    pub storage: Arc<Storage>,
    pub notifier: Notifier,
    pub cfg: AnalysisConfig,
    pub initial: AppState,
}

pub(crate) async fn run_controller(
    deps: SessionDeps,
    event_tx: UnboundedSender<SessionEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let SessionDeps {
        engine,
        storage,
        notifier,
        cfg,
        initial,
    } = deps;

    let mut state = initial;
    let (task_tx, mut task_rx) = mpsc::unbounded_channel::<TaskMsg>();

    // At most one of each outstanding at a time. The payment timer is aborted
    // on any transition away from AwaitingPaymentConfirmation so it cannot
    // fire into a stale state.
    let mut payment_task: Option<tokio::task::JoinHandle<()>> = None;
    let mut analysis_task: Option<tokio::task::JoinHandle<()>> = None;

    // Simulated progress while an analysis is outstanding.
    let mut progress: u8 = 0;
    let mut progress_tick = tokio::time::interval(Duration::from_millis(150));

    let _ = event_tx.send(SessionEvent::State(Box::new(state.clone())));

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Dispatch(action)) => {
                        handle_dispatch(
                            action,
                            &mut state,
                            &engine,
                            &cfg,
                            &event_tx,
                            &task_tx,
                            &mut payment_task,
                            &mut analysis_task,
                            &mut progress,
                        );
                    }
                    Some(UiCommand::SaveReport) => {
                        if state.status == AppStatus::Complete {
                            match storage.save_report(&state.analysis_result) {
                                Ok(p) => {
                                    let _ = event_tx.send(SessionEvent::Info(
                                        format!("Saved: {}", p.display()),
                                    ));
                                }
                                Err(e) => {
                                    let _ = event_tx.send(SessionEvent::Info(
                                        format!("Save failed: {e:#}"),
                                    ));
                                }
                            }
                        }
                    }
                    Some(UiCommand::EmailReport(to)) => {
                        if state.status == AppStatus::Complete {
                            if !notifier.email_configured() {
                                let _ = event_tx.send(SessionEvent::Info(
                                    "Email service is not configured.".into(),
                                ));
                            } else {
                                match crate::notify::validate_email(&to) {
                                    Ok(()) => {
                                        notifier.send_report_email_detached(
                                            to.clone(),
                                            state.analysis_result.clone(),
                                        );
                                        let _ = event_tx.send(SessionEvent::Info(
                                            format!("Report sent to {to}. Please check your inbox."),
                                        ));
                                    }
                                    Err(msg) => {
                                        let _ = event_tx.send(SessionEvent::Info(msg));
                                    }
                                }
                            }
                        }
                    }
                    Some(UiCommand::ShareReport) => {
                        if state.status == AppStatus::Complete {
                            if !notifier.share_configured() {
                                let _ = event_tx.send(SessionEvent::Info(
                                    "Share service is not configured.".into(),
                                ));
                            } else {
                                let notifier = notifier.clone();
                                let report = state.analysis_result.clone();
                                let tx = task_tx.clone();
                                tokio::spawn(async move {
                                    let _ = tx.send(TaskMsg::ShareDone(
                                        notifier.share_report(&report).await,
                                    ));
                                });
                            }
                        }
                    }
                    Some(UiCommand::Quit) | None => {
                        if let Some(t) = payment_task.take() {
                            t.abort();
                        }
                        if let Some(t) = analysis_task.take() {
                            // No mid-analysis cancellation in the flow itself;
                            // quitting drops the request on the floor.
                            t.abort();
                        }
                        return Ok(());
                    }
                }
            }
            msg = task_rx.recv() => {
                match msg {
                    Some(TaskMsg::PaymentStage(i)) => {
                        if state.status == AppStatus::AwaitingPaymentConfirmation {
                            if let Some(text) = PAYMENT_STAGE_MESSAGES.get(i) {
                                let _ = event_tx.send(SessionEvent::Info((*text).into()));
                            }
                        }
                    }
                    Some(TaskMsg::PaymentConfirmed) => {
                        payment_task = None;
                        // Guard against a stale timer firing after a quit race.
                        if state.status == AppStatus::AwaitingPaymentConfirmation {
                            handle_dispatch(
                                Action::StartAnalysis,
                                &mut state,
                                &engine,
                                &cfg,
                                &event_tx,
                                &task_tx,
                                &mut payment_task,
                                &mut analysis_task,
                                &mut progress,
                            );
                        }
                    }
                    Some(TaskMsg::AnalysisDone(result)) => {
                        analysis_task = None;
                        let action = match result {
                            Ok(report) => {
                                let _ = event_tx.send(SessionEvent::Progress {
                                    percent: 100,
                                    message: "Report ready.".into(),
                                });
                                Action::AnalysisSucceeded { result: report }
                            }
                            Err(e) => {
                                debug!(error = ?e, "analysis failed");
                                Action::AnalysisFailed { message: e.to_string() }
                            }
                        };
                        apply(&mut state, action, &event_tx, &mut payment_task);
                        if state.status == AppStatus::Complete {
                            if let Some(params) = state.last_params.as_ref() {
                                if let Err(e) = storage.save_last_params(params) {
                                    warn!(error = %e, "could not persist last params");
                                }
                            }
                        }
                    }
                    Some(TaskMsg::ShareDone(result)) => {
                        let line = match result {
                            Ok(id) => format!("Shareable report id: {id}"),
                            Err(e) => {
                                warn!(error = %e, "share failed");
                                "Could not create a share link. Please try again later.".into()
                            }
                        };
                        let _ = event_tx.send(SessionEvent::Info(line));
                    }
                    None => return Ok(()),
                }
            }
            _ = progress_tick.tick() => {
                if state.status == AppStatus::Analyzing && progress < 99 {
                    progress += 1;
                    let _ = event_tx.send(SessionEvent::Progress {
                        percent: progress,
                        message: analysis_stage_message(progress).to_string(),
                    });
                }
            }
        }
    }
}

/// Apply one reducer action, publish the snapshot, and run entry effects for
/// the new status.
#[allow(clippy::too_many_arguments)]
fn handle_dispatch(
    action: Action,
    state: &mut AppState,
    engine: &Arc<AnalysisEngine>,
    cfg: &AnalysisConfig,
    event_tx: &UnboundedSender<SessionEvent>,
    task_tx: &UnboundedSender<TaskMsg>,
    payment_task: &mut Option<tokio::task::JoinHandle<()>>,
    analysis_task: &mut Option<tokio::task::JoinHandle<()>>,
    progress: &mut u8,
) {
    // Surface validation failures instead of silently ignoring the submit.
    if matches!(action, Action::SubmitParameters(_)) && state.status == AppStatus::Initial {
        if let Err(msg) = validate_submission(state) {
            let _ = event_tx.send(SessionEvent::Info(msg));
            return;
        }
    }

    // No re-entrant analysis: triggering actions are ignored while a call or
    // the payment confirmation is outstanding.
    if analysis_task.is_some()
        && matches!(
            action,
            Action::SubmitParameters(_) | Action::ProceedToPayment | Action::StartAnalysis
        )
    {
        return;
    }

    let prev_status = state.status;
    apply(state, action, event_tx, payment_task);

    if state.status == prev_status {
        return;
    }

    match state.status {
        AppStatus::AwaitingPaymentConfirmation => {
            let tx = task_tx.clone();
            let delay = cfg.payment_confirm_delay;
            *payment_task = Some(tokio::spawn(async move {
                // Staged messages at roughly 40% / 80% of the delay, then the
                // confirmation itself.
                let stage = delay.mul_f64(0.4);
                let _ = tx.send(TaskMsg::PaymentStage(0));
                tokio::time::sleep(stage).await;
                let _ = tx.send(TaskMsg::PaymentStage(1));
                tokio::time::sleep(stage).await;
                let _ = tx.send(TaskMsg::PaymentStage(2));
                tokio::time::sleep(delay.mul_f64(0.2)).await;
                let _ = tx.send(TaskMsg::PaymentConfirmed);
            }));
        }
        AppStatus::Analyzing => {
            *progress = 0;
            let engine = engine.clone();
            let documents = state.documents.clone();
            let params = state.pending_params.clone();
            let tx = task_tx.clone();
            *analysis_task = Some(tokio::spawn(async move {
                let result = match params {
                    Some(p) => engine.analyze(&documents, &p).await,
                    None => Err(AnalysisError::Validation(
                        "analysis started without parameters".into(),
                    )),
                };
                let _ = tx.send(TaskMsg::AnalysisDone(result));
            }));
        }
        _ => {}
    }
}

/// Reduce and publish. Aborts the payment timer whenever the machine leaves
/// `AwaitingPaymentConfirmation` so it cannot fire into a stale state.
fn apply(
    state: &mut AppState,
    action: Action,
    event_tx: &UnboundedSender<SessionEvent>,
    payment_task: &mut Option<tokio::task::JoinHandle<()>>,
) {
    let next = reduce(state, action);
    if next == *state {
        return;
    }
    if state.status == AppStatus::AwaitingPaymentConfirmation
        && next.status != AppStatus::AwaitingPaymentConfirmation
    {
        if let Some(t) = payment_task.take() {
            t.abort();
        }
    }
    *state = next;
    let _ = event_tx.send(SessionEvent::State(Box::new(state.clone())));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnalysisParams, Document, TierId};

    fn test_deps(payment_delay_ms: u64) -> SessionDeps {
        let cfg = AnalysisConfig {
            // A closed port so the spawned analysis task fails fast.
            base_url: "http://127.0.0.1:9".into(),
            model: "test-model".into(),
            request_id: "test".into(),
            user_agent: "cloudcost-anomaly/test".into(),
            request_timeout: Duration::from_secs(2),
            payment_confirm_delay: Duration::from_millis(payment_delay_ms),
            email_endpoint: None,
            share_endpoint: None,
        };
        let root = std::env::temp_dir().join(format!(
            "cloudcost-anomaly-ctrl-{payment_delay_ms}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&root);
        SessionDeps {
            engine: Arc::new(AnalysisEngine::new(cfg.clone(), "test-key".into()).unwrap()),
            storage: Arc::new(Storage::new(root)),
            notifier: Notifier::new(None, None),
            cfg,
            initial: AppState::default(),
        }
    }

    fn csv_doc() -> Document {
        Document {
            name: "bill.csv".into(),
            size: 20,
            mime_type: "text/csv".into(),
            content: b"service,cost\nec2,10\n".to_vec(),
        }
    }

    fn params() -> AnalysisParams {
        AnalysisParams {
            provider: "AWS".into(),
            budget: "$5,000".into(),
            services: "EC2, S3".into(),
        }
    }

    async fn next_status(
        rx: &mut UnboundedReceiver<SessionEvent>,
        current: AppStatus,
    ) -> AppStatus {
        loop {
            let ev = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            if let SessionEvent::State(s) = ev {
                if s.status != current {
                    return s.status;
                }
            }
        }
    }

    #[tokio::test]
    async fn full_session_walks_every_phase() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_controller(test_deps(50), event_tx, cmd_rx));

        cmd_tx
            .send(UiCommand::Dispatch(Action::SelectTier(TierId::Scan)))
            .unwrap();
        cmd_tx
            .send(UiCommand::Dispatch(Action::SetDocuments(vec![csv_doc()])))
            .unwrap();
        cmd_tx
            .send(UiCommand::Dispatch(Action::SubmitParameters(params())))
            .unwrap();

        assert_eq!(
            next_status(&mut event_rx, AppStatus::Initial).await,
            AppStatus::PendingPayment
        );

        cmd_tx
            .send(UiCommand::Dispatch(Action::ProceedToPayment))
            .unwrap();
        assert_eq!(
            next_status(&mut event_rx, AppStatus::PendingPayment).await,
            AppStatus::AwaitingPaymentConfirmation
        );

        // The payment timer promotes the session into Analyzing on its own.
        assert_eq!(
            next_status(&mut event_rx, AppStatus::AwaitingPaymentConfirmation).await,
            AppStatus::Analyzing
        );

        // The unreachable endpoint routes the session to the error phase
        // with the generic user-facing message.
        assert_eq!(
            next_status(&mut event_rx, AppStatus::Analyzing).await,
            AppStatus::Error
        );

        cmd_tx.send(UiCommand::Quit).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn cancel_during_payment_stops_the_timer() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_controller(test_deps(80), event_tx, cmd_rx));

        cmd_tx
            .send(UiCommand::Dispatch(Action::SelectTier(TierId::Monitoring)))
            .unwrap();
        cmd_tx
            .send(UiCommand::Dispatch(Action::SetDocuments(vec![csv_doc()])))
            .unwrap();
        cmd_tx
            .send(UiCommand::Dispatch(Action::SubmitParameters(params())))
            .unwrap();
        cmd_tx
            .send(UiCommand::Dispatch(Action::ProceedToPayment))
            .unwrap();
        cmd_tx
            .send(UiCommand::Dispatch(Action::CancelPayment))
            .unwrap();

        // Wait well past the payment delay; the aborted timer must not push
        // the session into Analyzing.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let mut last = None;
        while let Ok(ev) = event_rx.try_recv() {
            if let SessionEvent::State(s) = ev {
                last = Some(*s);
            }
        }
        let last = last.unwrap();
        assert_eq!(last.status, AppStatus::Initial);
        assert!(last.pending_params.is_none());
        assert_eq!(last.selected_tier, Some(TierId::Monitoring));

        cmd_tx.send(UiCommand::Quit).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn submit_without_documents_reports_validation_message() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_controller(test_deps(60), event_tx, cmd_rx));

        cmd_tx
            .send(UiCommand::Dispatch(Action::SelectTier(TierId::Scan)))
            .unwrap();
        cmd_tx
            .send(UiCommand::Dispatch(Action::SubmitParameters(params())))
            .unwrap();

        let mut saw_info = false;
        for _ in 0..10 {
            match tokio::time::timeout(Duration::from_millis(200), event_rx.recv()).await {
                Ok(Some(SessionEvent::Info(msg))) => {
                    assert!(msg.contains("document"));
                    saw_info = true;
                    break;
                }
                Ok(Some(SessionEvent::State(s))) => {
                    assert_eq!(s.status, AppStatus::Initial);
                }
                _ => break,
            }
        }
        assert!(saw_info);

        cmd_tx.send(UiCommand::Quit).unwrap();
        handle.await.unwrap().unwrap();
    }
}
