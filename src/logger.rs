use chrono::Local;
use colored::Colorize;
use tokio::{sync::mpsc, task::JoinHandle};

/// Collects every line of tool output in arrival order and optionally echoes
/// it to the terminal.
pub struct Logger {
    tx: mpsc::Sender<LogMessage>,
    handle: JoinHandle<Vec<String>>,
}

impl Logger {
    pub fn new(buffer: usize, echo: bool) -> Self {
        let (tx, mut rx) = mpsc::channel::<LogMessage>(buffer);
        let handle = tokio::spawn(async move {
            let mut store = Vec::new();
            while let Some(log) = rx.recv().await {
                if echo {
                    println!("{}", log.terminal_format());
                }
                store.push(log.file_format());
            }
            store
        });

        Self { tx, handle }
    }

    pub fn tx(&self) -> mpsc::Sender<LogMessage> {
        self.tx.clone()
    }

    pub async fn finish(self) -> anyhow::Result<Vec<String>> {
        drop(self.tx); // Dropping the last TX allows RX to close
        self.handle
            .await
            .map_err(|err| anyhow::anyhow!("Log task failed: {err}"))
    }
}

#[derive(Debug, Clone)]
pub struct LogMessage {
    pub phase: String,
    pub line: String,
    pub is_error: bool,
}

impl LogMessage {
    pub fn new(phase: impl Into<String>, line: impl Into<String>, is_error: bool) -> Self {
        Self {
            phase: phase.into(),
            line: line.into(),
            is_error,
        }
    }

    pub fn terminal_format(&self) -> String {
        let name = format!("[{}]", self.phase).bold().cyan();
        let body = if self.is_error {
            self.line.trim_end().red()
        } else {
            self.line.trim_end().white()
        };
        format!("{name} {body}")
    }

    pub fn file_format(&self) -> String {
        let timestamp = Local::now().format("%H:%M:%S");
        let mode = if self.is_error { "ERR" } else { "OUT" };
        format!(
            "[{timestamp}] [{}] [{mode}] {}",
            self.phase,
            self.line.trim_end()
        )
    }
}
