//! The opener pool
//!
//! Encrypted charts are read through an external helper process that
//! performs the decrypt. The helper speaks a fixed frame protocol: each
//! request is a 1025 byte frame (1 opcode byte, 256 bytes of
//! zero-terminated file name, padding), the response is the raw chart
//! byte stream until EOF.
//!
//! The pool bounds concurrency to a configurable worker count. Requests
//! queue FIFO; a worker that finds its helper dead respawns it and
//! retries the request once before failing it. Submissions carry a
//! maximum wait, surfaced as [`CacheError::OpenerTimeout`].

use crate::error::{CacheError, CacheResult};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Size of a request frame
pub const FRAME_LEN: usize = 1025;
/// Bytes reserved for the file name inside a frame
pub const NAME_LEN: usize = 256;

/// Opener pool configuration
#[derive(Debug, Clone)]
pub struct OpenerConfig {
    /// The helper executable
    pub command: PathBuf,
    /// Extra arguments for the helper
    pub args: Vec<String>,
    /// Number of worker tasks (= maximum concurrent decrypts)
    pub workers: usize,
    /// Queue depth before submits start blocking
    pub queue_len: usize,
    /// Maximum total wait for one request
    pub request_timeout: Duration,
}

impl Default for OpenerConfig {
    fn default() -> Self {
        OpenerConfig {
            command: PathBuf::from("oexserverd"),
            args: Vec::new(),
            workers: 2,
            queue_len: 32,
            request_timeout: Duration::from_secs(60),
        }
    }
}

struct Request {
    opcode: u8,
    file_name: String,
    resp: oneshot::Sender<CacheResult<Vec<u8>>>,
}

/// Build the fixed request frame for an opcode and file name
pub fn build_frame(opcode: u8, file_name: &str) -> CacheResult<[u8; FRAME_LEN]> {
    let mut frame = [0u8; FRAME_LEN];
    frame[0] = opcode;
    let name = file_name.as_bytes();
    if name.len() >= NAME_LEN {
        return Err(CacheError::Internal(format!(
            "file name too long for opener frame: {}",
            file_name
        )));
    }
    frame[1..1 + name.len()].copy_from_slice(name);
    Ok(frame)
}

/// The bounded pool of opener helpers
pub struct OpenerPool {
    tx: mpsc::Sender<Request>,
    request_timeout: Duration,
}

impl OpenerPool {
    /// Start the pool with `config.workers` worker tasks
    pub fn new(config: OpenerConfig) -> Self {
        let (tx, rx) = mpsc::channel::<Request>(config.queue_len.max(1));
        let rx = std::sync::Arc::new(tokio::sync::Mutex::new(rx));
        for worker in 0..config.workers.max(1) {
            let rx = rx.clone();
            let config = config.clone();
            tokio::spawn(async move {
                loop {
                    let request = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    let Some(request) = request else {
                        debug!(worker, "opener worker shutting down");
                        return;
                    };
                    let result = run_request(&config, &request).await;
                    let _ = request.resp.send(result);
                }
            });
        }
        info!(workers = config.workers, "opener pool started");
        OpenerPool {
            tx,
            request_timeout: config.request_timeout,
        }
    }

    /// Read a chart through an opener helper.
    ///
    /// Blocks until a worker picked up and finished the request or the
    /// timeout elapsed; the timeout covers queueing and the read.
    pub async fn read_chart(&self, opcode: u8, file_name: &str) -> CacheResult<Vec<u8>> {
        let (resp_tx, resp_rx) = oneshot::channel();
        let request = Request {
            opcode,
            file_name: file_name.to_string(),
            resp: resp_tx,
        };
        let deadline = tokio::time::Instant::now() + self.request_timeout;
        tokio::time::timeout_at(deadline, self.tx.send(request))
            .await
            .map_err(|_| CacheError::OpenerTimeout(self.request_timeout))?
            .map_err(|_| CacheError::Interrupted)?;
        match tokio::time::timeout_at(deadline, resp_rx).await {
            Err(_) => Err(CacheError::OpenerTimeout(self.request_timeout)),
            Ok(Err(_)) => Err(CacheError::Interrupted),
            Ok(Ok(result)) => result,
        }
    }
}

/// Run one request against a fresh helper connection, retrying once
/// after a crash.
async fn run_request(config: &OpenerConfig, request: &Request) -> CacheResult<Vec<u8>> {
    match run_once(config, request).await {
        Ok(data) => Ok(data),
        Err(CacheError::OpenerCrashed(detail)) => {
            warn!(
                file = %request.file_name,
                detail,
                "opener crashed, respawning and retrying"
            );
            run_once(config, request).await
        }
        Err(e) => Err(e),
    }
}

async fn run_once(config: &OpenerConfig, request: &Request) -> CacheResult<Vec<u8>> {
    let mut child = Command::new(&config.command)
        .args(&config.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| CacheError::OpenerCrashed(format!("spawn failed: {}", e)))?;

    let frame = build_frame(request.opcode, &request.file_name)?;
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| CacheError::OpenerCrashed("no stdin".to_string()))?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| CacheError::OpenerCrashed("no stdout".to_string()))?;

    if let Err(e) = stdin.write_all(&frame).await {
        return Err(CacheError::OpenerCrashed(format!("write failed: {}", e)));
    }
    drop(stdin);

    let mut data = Vec::new();
    if let Err(e) = stdout.read_to_end(&mut data).await {
        return Err(CacheError::OpenerCrashed(format!("read failed: {}", e)));
    }
    let status = child
        .wait()
        .await
        .map_err(|e| CacheError::OpenerCrashed(e.to_string()))?;
    if !status.success() {
        return Err(CacheError::OpenerCrashed(format!(
            "exit status {}",
            status
        )));
    }
    if data.is_empty() {
        error!(file = %request.file_name, "opener returned no data");
        return Err(CacheError::DecryptError(request.file_name.clone()));
    }
    debug!(file = %request.file_name, bytes = data.len(), "opener delivered chart");
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let frame = build_frame(9, "/charts/DE5.oesu").unwrap();
        assert_eq!(frame.len(), FRAME_LEN);
        assert_eq!(frame[0], 9);
        assert_eq!(&frame[1..17], b"/charts/DE5.oesu");
        assert_eq!(frame[17], 0);
        assert_eq!(frame[FRAME_LEN - 1], 0);
    }

    #[test]
    fn test_frame_name_too_long() {
        let long = "x".repeat(NAME_LEN);
        assert!(build_frame(1, &long).is_err());
    }

    #[tokio::test]
    async fn test_pool_reads_through_helper() {
        // `cat` echoes the request frame back, standing in for a helper
        let pool = OpenerPool::new(OpenerConfig {
            command: PathBuf::from("cat"),
            args: Vec::new(),
            workers: 2,
            queue_len: 4,
            request_timeout: Duration::from_secs(5),
        });
        let data = pool.read_chart(9, "some-chart.oesu").await.unwrap();
        assert_eq!(data.len(), FRAME_LEN);
        assert_eq!(data[0], 9);
    }

    #[tokio::test]
    async fn test_pool_missing_helper_fails() {
        let pool = OpenerPool::new(OpenerConfig {
            command: PathBuf::from("/nonexistent/opener"),
            workers: 1,
            queue_len: 2,
            request_timeout: Duration::from_secs(2),
            args: Vec::new(),
        });
        let err = pool.read_chart(1, "x.oesenc").await.unwrap_err();
        assert!(matches!(err, CacheError::OpenerCrashed(_)));
    }

    #[tokio::test]
    async fn test_pool_bounds_concurrency() {
        let pool = std::sync::Arc::new(OpenerPool::new(OpenerConfig {
            command: PathBuf::from("cat"),
            workers: 1,
            queue_len: 8,
            request_timeout: Duration::from_secs(5),
            args: Vec::new(),
        }));
        let mut handles = Vec::new();
        for i in 0..4 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                pool.read_chart(1, &format!("c{}.oesu", i)).await
            }));
        }
        for h in handles {
            assert!(h.await.unwrap().is_ok());
        }
    }
}
