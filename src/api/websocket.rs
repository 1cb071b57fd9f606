// src/api/websocket.rs
//
// Streaming analysis. Each connection owns one MonitoringSession driven by a
// worker task. The reader hands frames over a latest-wins watch channel, so a
// session that falls behind drops frames instead of queueing them. Results
// and per-frame errors go back through a small mpsc queue to the writer.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::dto::{wall_clock_seconds, FrameRequest, StreamMessage};
use super::state::AppState;
use crate::error::Result;
use crate::pipeline::{FrameAnalysis, MonitoringSession, PipelineMetrics};
use crate::profiles::Sport;

const OUTBOUND_CAPACITY: usize = 16;

/// A frame waiting for the worker, stamped by the reader.
#[derive(Debug, Clone)]
struct Inbound {
    seq: u64,
    sport: Sport,
    received_at: f64,
    request: FrameRequest,
}

/// Reader-side state: the sport currently selected by the client and the
/// sequence stamp of the last frame handed to the worker.
#[derive(Debug)]
struct StreamReader {
    sport: Sport,
    seq: u64,
}

impl Default for StreamReader {
    fn default() -> Self {
        Self {
            sport: Sport::Generic,
            seq: 0,
        }
    }
}

impl StreamReader {
    /// None for a sport-only control message.
    fn accept(&mut self, request: FrameRequest, received_at: f64) -> Option<Inbound> {
        if let Some(sport) = request.sport() {
            self.sport = sport;
        }
        if request.is_control_only() {
            return None;
        }
        self.seq += 1;
        Some(Inbound {
            seq: self.seq,
            sport: self.sport,
            received_at,
            request,
        })
    }
}

#[tracing::instrument(skip(state, ws))]
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let session = state.new_session();
    let session_id = session.id();
    info!("🔌 Stream client connected (session {})", session_id);

    let (frame_tx, frame_rx) = watch::channel::<Option<Inbound>>(None);
    let (out_tx, mut out_rx) = mpsc::channel::<StreamMessage>(OUTBOUND_CAPACITY);

    let worker = tokio::spawn(run_session(session, frame_rx, out_tx, state.metrics().clone()));

    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Failed to serialize stream message: {}", e),
            }
        }
    });

    let mut reader = StreamReader::default();
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                let request: FrameRequest = match serde_json::from_str(&text) {
                    Ok(r) => r,
                    Err(e) => {
                        warn!("Malformed stream message: {}", e);
                        continue;
                    }
                };
                match reader.accept(request, wall_clock_seconds()) {
                    Some(inbound) => {
                        frame_tx.send_replace(Some(inbound));
                    }
                    None => debug!("Session {} sport set to {}", session_id, reader.sport),
                }
            }
            Message::Binary(_) => debug!("Ignoring binary stream message"),
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    drop(frame_tx);
    if let Err(e) = worker.await {
        error!("Stream worker for session {} failed: {}", session_id, e);
    }
    let _ = writer.await;
    info!("🔌 Stream client disconnected (session {})", session_id);
}

/// Process the latest pending frame until the reader goes away.
async fn run_session(
    mut session: MonitoringSession,
    mut frames: watch::Receiver<Option<Inbound>>,
    out: mpsc::Sender<StreamMessage>,
    metrics: PipelineMetrics,
) {
    let mut last_seq = 0u64;

    while frames.changed().await.is_ok() {
        let Some(inbound) = frames.borrow_and_update().clone() else {
            continue;
        };

        let dropped = inbound.seq.saturating_sub(last_seq + 1);
        if dropped > 0 {
            warn!(
                "⚠️  Session {} lagging: dropped {} frame(s)",
                session.id(),
                dropped
            );
            metrics.add(&metrics.frames_skipped, dropped);
        }
        last_seq = inbound.seq;

        let task_metrics = metrics.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let result = analyze(&mut session, inbound, &task_metrics);
            (session, result)
        })
        .await;
        let result = match joined {
            Ok((s, result)) => {
                session = s;
                result
            }
            Err(e) => {
                error!("Stream analysis task failed: {}", e);
                return;
            }
        };

        let msg = match result {
            Ok(Some(analysis)) => StreamMessage::Analysis(Box::new(analysis)),
            Ok(None) => continue,
            Err(e) => {
                warn!("Frame rejected: {}", e);
                StreamMessage::error(&e)
            }
        };
        if out.send(msg).await.is_err() {
            return;
        }
    }
}

fn analyze(
    session: &mut MonitoringSession,
    inbound: Inbound,
    metrics: &PipelineMetrics,
) -> Result<Option<FrameAnalysis>> {
    session.set_sport(inbound.sport);
    let frame = inbound
        .request
        .into_frame(inbound.received_at)
        .inspect_err(|_| metrics.inc(&metrics.frames_rejected))?;
    session.offer_frame(&frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::tests::png_base64;
    use crate::prediction::PredictorRegistry;
    use crate::types::{Config, PredictorConfig};
    use serde_json::json;
    use std::sync::Arc;

    fn request(value: serde_json::Value) -> FrameRequest {
        serde_json::from_value(value).unwrap()
    }

    fn keypoint_frame() -> serde_json::Value {
        json!({"keypoints": {"nose": {"x": 0.5, "y": 0.2}}, "timestamp": 1.0})
    }

    struct Worker {
        frames: watch::Sender<Option<Inbound>>,
        out: mpsc::Receiver<StreamMessage>,
        metrics: PipelineMetrics,
        task: tokio::task::JoinHandle<()>,
    }

    fn spawn_worker() -> Worker {
        let mut config = Config::default();
        config.predictor = PredictorConfig::fast();
        let registry = Arc::new(PredictorRegistry::new(config.predictor.clone()));
        let metrics = PipelineMetrics::new();
        let session = MonitoringSession::new(&config, registry, metrics.clone());

        let (frames, frame_rx) = watch::channel(None);
        let (out_tx, out) = mpsc::channel(OUTBOUND_CAPACITY);
        let task = tokio::spawn(run_session(session, frame_rx, out_tx, metrics.clone()));
        Worker {
            frames,
            out,
            metrics,
            task,
        }
    }

    #[test]
    fn test_control_message_switches_sport_without_a_frame() {
        let mut reader = StreamReader::default();
        assert!(reader.accept(request(json!({"sport": "cricket"})), 0.0).is_none());
        assert_eq!(reader.sport, Sport::Cricket);

        let inbound = reader.accept(request(keypoint_frame()), 2.0).unwrap();
        assert_eq!(inbound.seq, 1, "control messages are not numbered");
        assert_eq!(inbound.sport, Sport::Cricket);

        let next = reader
            .accept(request(json!({"sport": "weightlifting", "image_base64": "x"})), 3.0)
            .unwrap();
        assert_eq!((next.seq, next.sport), (2, Sport::Weightlifting));
    }

    #[tokio::test]
    async fn test_bad_frame_errors_and_session_continues() {
        let mut w = spawn_worker();
        let mut reader = StreamReader::default();
        reader.accept(request(json!({"sport": "football"})), 0.0);

        let bad = reader.accept(request(json!({"image_base64": "@@@@"})), 0.5).unwrap();
        w.frames.send_replace(Some(bad));
        match w.out.recv().await.unwrap() {
            StreamMessage::Error { code, .. } => assert_eq!(code, "DECODE_ERROR"),
            other => panic!("expected an error message, got {other:?}"),
        }

        let good = reader
            .accept(request(json!({"image_base64": png_base64(32, 24), "timestamp": 1.0})), 1.0)
            .unwrap();
        w.frames.send_replace(Some(good));
        match w.out.recv().await.unwrap() {
            StreamMessage::Analysis(a) => {
                assert_eq!(a.frame_index, 1, "the rejected frame left the session untouched");
                assert_eq!(a.sport, Sport::Football);
            }
            other => panic!("expected an analysis, got {other:?}"),
        }
        assert_eq!(w.metrics.summary().frames_rejected, 1);
        assert_eq!(w.metrics.summary().frames_skipped, 0);

        drop(w.frames);
        w.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_lagging_session_keeps_only_the_latest_frame() {
        let mut w = spawn_worker();
        let mut reader = StreamReader::default();

        let first = reader.accept(request(keypoint_frame()), 0.0).unwrap();
        w.frames.send_replace(Some(first));
        assert!(matches!(w.out.recv().await.unwrap(), StreamMessage::Analysis(_)));

        // The worker is idle on the watch channel. Three frames arrive before
        // it is polled again; only the last survives.
        for ts in [1.0, 2.0, 3.0] {
            let inbound = reader
                .accept(request(json!({"keypoints": {"nose": {"x": 0.5, "y": 0.2}}, "timestamp": ts})), ts)
                .unwrap();
            w.frames.send_replace(Some(inbound));
        }
        match w.out.recv().await.unwrap() {
            StreamMessage::Analysis(a) => {
                assert_eq!(a.frame_index, 2);
                assert_eq!(a.timestamp, 3.0);
            }
            other => panic!("expected an analysis, got {other:?}"),
        }
        assert_eq!(w.metrics.summary().frames_skipped, 2);
        assert_eq!(w.metrics.summary().frames_admitted, 2);

        drop(w.frames);
        w.task.await.unwrap();
    }
}
