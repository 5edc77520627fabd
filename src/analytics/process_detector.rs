use crate::analytics::detection::{Detection, Detector};
use crate::capture::Frame;
use crate::config::DetectionConfig;
use crate::error::Error;
use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

/// Header line sent ahead of the raw RGB bytes
#[derive(Debug, Serialize)]
struct InferRequest {
    width: u32,
    height: u32,
    format: &'static str,
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct InferResponse {
    #[serde(default)]
    detections: Vec<[f64; 5]>,
    #[serde(default)]
    error: Option<String>,
}

struct DetectorProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Person detector running as a long-lived child process.
///
/// Each request is a JSON header line followed by `width * height * 3` RGB
/// bytes; the reply is one JSON line. The process is restarted on the next
/// call after any failure.
pub struct ProcessDetector {
    command: String,
    args: Vec<String>,
    timeout: Duration,
    model_version: String,
    process: Mutex<Option<DetectorProcess>>,
}

impl ProcessDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            model_version: config.model_version.clone(),
            process: Mutex::new(None),
        }
    }

    fn spawn(&self) -> Result<DetectorProcess> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Inference(format!("Failed to start detector '{}': {}", self.command, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Inference("Detector stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Inference("Detector stdout unavailable".to_string()))?;

        info!("Started detector process '{}' ({})", self.command, self.model_version);

        Ok(DetectorProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    async fn exchange(
        process: &mut DetectorProcess,
        frame: &Frame,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>> {
        let header = serde_json::to_string(&InferRequest {
            width: frame.width,
            height: frame.height,
            format: "rgb24",
            confidence: confidence_threshold,
        })?;

        process.stdin.write_all(header.as_bytes()).await?;
        process.stdin.write_all(b"\n").await?;
        process.stdin.write_all(&frame.data).await?;
        process.stdin.flush().await?;

        let mut line = String::new();
        let read = process.stdout.read_line(&mut line).await?;
        if read == 0 {
            return Err(Error::Inference("Detector process closed its output".to_string()).into());
        }

        parse_response(&line, confidence_threshold)
    }
}

/// Decode one reply line, dropping boxes under the threshold
fn parse_response(line: &str, confidence_threshold: f32) -> Result<Vec<Detection>> {
    let response: InferResponse = serde_json::from_str(line.trim())
        .map_err(|e| Error::Inference(format!("Malformed detector reply: {}", e)))?;

    if let Some(err) = response.error {
        return Err(Error::Inference(err).into());
    }

    Ok(response
        .detections
        .into_iter()
        .map(|[x1, y1, x2, y2, conf]| {
            Detection::new(x1 as i32, y1 as i32, x2 as i32, y2 as i32, conf as f32)
        })
        .filter(|d| d.confidence >= confidence_threshold)
        .collect())
}

#[async_trait]
impl Detector for ProcessDetector {
    async fn infer(&self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>> {
        let mut guard = self.process.lock().await;

        if guard.is_none() {
            *guard = Some(self.spawn()?);
        }
        let Some(process) = guard.as_mut() else {
            return Err(Error::Internal("Detector process missing".to_string()).into());
        };

        let outcome = tokio::time::timeout(
            self.timeout,
            Self::exchange(process, frame, confidence_threshold),
        )
        .await;

        match outcome {
            Ok(Ok(detections)) => Ok(detections),
            Ok(Err(e)) => {
                warn!("Detector call failed, restarting process: {}", e);
                if let Some(mut p) = guard.take() {
                    let _ = p.child.start_kill();
                }
                Err(e)
            }
            Err(_) => {
                warn!("Detector timed out after {:?}, restarting process", self.timeout);
                if let Some(mut p) = guard.take() {
                    let _ = p.child.start_kill();
                }
                Err(Error::Inference(format!("Detector timed out after {:?}", self.timeout)).into())
            }
        }
    }

    fn model_version(&self) -> &str {
        &self.model_version
    }
}
