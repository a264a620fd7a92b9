//! FileSink - appends events to a JSON lines file

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use batch_writer::BatchHandler;
use contracts::{ContractError, EventSink, KubeEvent};
use tracing::{debug, error, instrument};

/// Parse the optional `dedot` receiver parameter
///
/// Only "true" and "false" are accepted; absent means false.
pub fn parse_dedot(params: &HashMap<String, String>) -> Result<bool, String> {
    match params.get("dedot").map(String::as_str) {
        Some("true") => Ok(true),
        Some("false") | None => Ok(false),
        Some(other) => Err(format!("invalid 'dedot' value '{}'", other)),
    }
}

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file, created if missing and appended to otherwise
    pub path: PathBuf,
    /// Replace dots in label/annotation keys before writing
    pub dedot: bool,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let path = params
            .get("path")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| "missing 'path' parameter".to_string())?;

        let dedot = parse_dedot(params)?;

        Ok(Self { path, dedot })
    }

    fn open_file(&self) -> std::io::Result<File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(&self.path)
    }

    fn open(&self) -> std::io::Result<BufWriter<File>> {
        Ok(BufWriter::new(self.open_file()?))
    }

    fn encode(&self, event: &KubeEvent, out: &mut Vec<u8>) -> Result<(), ContractError> {
        if self.dedot {
            serde_json::to_writer(&mut *out, &event.dedot())?;
        } else {
            serde_json::to_writer(&mut *out, event)?;
        }
        out.push(b'\n');
        Ok(())
    }
}

/// Sink that writes one JSON line per event
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    writer: Option<BufWriter<File>>,
    line: Vec<u8>,
}

impl FileSink {
    /// Create a new FileSink, opening (or creating) the output file
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        let writer = config.open()?;
        Ok(Self {
            name: name.into(),
            config,
            writer: Some(writer),
            line: Vec::new(),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = FileSinkConfig::from_params(params)
            .map_err(|e| ContractError::sink_connection(&name, e))?;
        Self::new(&name, config).map_err(|e| ContractError::sink_connection(&name, e.to_string()))
    }

    fn persist_event(&mut self, event: &KubeEvent) -> Result<(), ContractError> {
        self.line.clear();
        self.config.encode(event, &mut self.line)?;

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ContractError::sink_send(&self.name, "file already closed"))?;
        writer.write_all(&self.line).map_err(|e| {
            error!(sink = %self.name, uid = %event.uid(), error = %e, "Write failed");
            ContractError::sink_send(&self.name, e.to_string())
        })
    }
}

impl EventSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_send",
        skip(self, event),
        fields(sink = %self.name, uid = %event.uid())
    )]
    async fn send(&mut self, event: &Arc<KubeEvent>) -> Result<(), ContractError> {
        self.persist_event(event)
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        debug!(sink = %self.name, path = %self.config.path.display(), "FileSink closed");
        Ok(())
    }
}

/// Batch handler that appends a whole batch with a single write
///
/// A batch either lands completely or is reported failed item by item,
/// leaving retries to the batch writer. The file is unbuffered so a failed
/// write leaves nothing pending for the next batch.
pub struct FileBatchHandler {
    name: String,
    config: FileSinkConfig,
    file: File,
    buf: Vec<u8>,
}

impl FileBatchHandler {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        let file = config.open_file()?;
        Ok(Self {
            name: name.into(),
            config,
            file,
            buf: Vec::new(),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = FileSinkConfig::from_params(params)
            .map_err(|e| ContractError::sink_connection(&name, e))?;
        Self::new(&name, config).map_err(|e| ContractError::sink_connection(&name, e.to_string()))
    }

    fn write_batch(&mut self, items: &[Arc<KubeEvent>]) -> Result<(), ContractError> {
        self.buf.clear();
        for event in items {
            self.config.encode(event, &mut self.buf)?;
        }
        self.file.write_all(&self.buf)?;
        Ok(())
    }
}

impl BatchHandler<Arc<KubeEvent>> for FileBatchHandler {
    async fn flush(&mut self, items: &[Arc<KubeEvent>]) -> Vec<bool> {
        match self.write_batch(items) {
            Ok(()) => {
                debug!(sink = %self.name, items = items.len(), "Batch appended");
                vec![true; items.len()]
            }
            Err(e) => {
                error!(sink = %self.name, items = items.len(), error = %e, "Batch write failed");
                vec![false; items.len()]
            }
        }
    }
}
