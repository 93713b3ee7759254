use std::io::IsTerminal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot, Notify};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiError {
    NoTty,
    ShuttingDown,
}

#[derive(Debug, Clone)]
pub struct PromptChoice {
    pub text: String,
    pub choices: Vec<String>,
}

enum HighPriorityEvent {
    Begin(u64),
    End(u64),
    Prompt {
        interaction: u64,
        request: PromptChoice,
        respond: oneshot::Sender<usize>,
    },
    PromptText {
        interaction: u64,
        message: String,
        respond: oneshot::Sender<String>,
    },
    SpinnerLine(String),
}

enum NormalEvent {
    Log(String),
    Error(String),
}

/// Single-consumer serialisation of all terminal I/O (C5). Producers get a
/// cloneable [`UiHandle`]; exactly one background task owns the terminal.
pub struct UiQueue {
    high_tx: mpsc::Sender<HighPriorityEvent>,
    normal_tx: mpsc::Sender<NormalEvent>,
    shutdown: Arc<Notify>,
    interaction_counter: Arc<AtomicU64>,
    quiet: bool,
    is_tty: bool,
}

impl UiQueue {
    /// Spawns the consumer task and returns a queue owning its producer
    /// handles. `quiet` suppresses all interaction output except errors.
    pub fn start(quiet: bool) -> (Self, tokio::task::JoinHandle<()>) {
        let (high_tx, mut high_rx) = mpsc::channel::<HighPriorityEvent>(64);
        let (normal_tx, mut normal_rx) = mpsc::channel::<NormalEvent>(256);
        let shutdown = Arc::new(Notify::new());
        let shutdown_consumer = shutdown.clone();

        let consumer = tokio::spawn(async move {
            let mut buffered_normal: Vec<NormalEvent> = Vec::new();
            let mut interaction_active = false;
            let mut stdin_reader = BufReader::new(tokio::io::stdin());

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_consumer.notified() => {
                        // Bounded-deadline drain of whatever is left.
                        let deadline = tokio::time::Instant::now() + std::time::Duration::from_millis(500);
                        while tokio::time::Instant::now() < deadline {
                            tokio::select! {
                                Some(event) = normal_rx.recv() => render_normal(event, quiet),
                                _ = tokio::time::sleep(std::time::Duration::from_millis(10)) => break,
                            }
                        }
                        break;
                    }

                    Some(event) = high_rx.recv() => {
                        match event {
                            HighPriorityEvent::Begin(_id) => {
                                interaction_active = true;
                            }
                            HighPriorityEvent::End(_id) => {
                                interaction_active = false;
                                for buffered in buffered_normal.drain(..) {
                                    render_normal(buffered, quiet);
                                }
                            }
                            HighPriorityEvent::Prompt { request, respond, .. } => {
                                if !quiet {
                                    render_prompt(&request);
                                }
                                let choice = read_prompt_choice(&mut stdin_reader, request.choices.len()).await;
                                let _ = respond.send(choice);
                            }
                            HighPriorityEvent::PromptText { message, respond, .. } => {
                                if !quiet {
                                    println!("--- {message} ---");
                                }
                                let text = read_prompt_line(&mut stdin_reader).await;
                                let _ = respond.send(text);
                            }
                            HighPriorityEvent::SpinnerLine(line) => {
                                if !quiet {
                                    println!("{line}");
                                }
                            }
                        }
                    }

                    Some(event) = normal_rx.recv(), if !interaction_active => {
                        render_normal(event, quiet);
                    }

                    Some(event) = normal_rx.recv(), if interaction_active => {
                        buffered_normal.push(event);
                    }

                    else => break,
                }
            }
        });

        let queue = UiQueue {
            high_tx,
            normal_tx,
            shutdown,
            interaction_counter: Arc::new(AtomicU64::new(0)),
            quiet,
            is_tty: std::io::stdout().is_terminal(),
        };
        (queue, consumer)
    }

    pub fn handle(&self) -> UiHandle {
        UiHandle {
            high_tx: self.high_tx.clone(),
            normal_tx: self.normal_tx.clone(),
            interaction_counter: self.interaction_counter.clone(),
            is_tty: self.is_tty,
            quiet: self.quiet,
        }
    }

    /// Signals shutdown; the consumer drains on a bounded deadline, then
    /// exits. Sends after this point are simply dropped (unbounded-ness is
    /// fine since the consumer is gone and the channel just fills/closes).
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

fn render_normal(event: NormalEvent, quiet: bool) {
    match event {
        NormalEvent::Log(line) => {
            if !quiet {
                println!("{line}");
            }
        }
        NormalEvent::Error(line) => {
            eprintln!("{line}");
        }
    }
}

fn render_prompt(request: &PromptChoice) {
    println!("--- {} ---", request.text);
    for (i, choice) in request.choices.iter().enumerate() {
        println!("  [{i}] {choice}");
    }
}

/// Reads lines from stdin until one parses to a valid index into the
/// choices, or stdin is closed. On EOF or a read error, falls back to
/// choice 0 rather than hanging the consumer forever.
async fn read_prompt_choice(
    reader: &mut BufReader<tokio::io::Stdin>,
    choice_count: usize,
) -> usize {
    loop {
        print!("> ");
        let _ = std::io::Write::flush(&mut std::io::stdout());

        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) => return 0,
            Ok(_) => match line.trim().parse::<usize>() {
                Ok(index) if index < choice_count => return index,
                _ => println!("enter a number between 0 and {}", choice_count.saturating_sub(1)),
            },
            Err(_) => return 0,
        }
    }
}

/// Reads a single raw line of free-text input, returning an empty string
/// on EOF or a read error.
async fn read_prompt_line(reader: &mut BufReader<tokio::io::Stdin>) -> String {
    print!("> ");
    let _ = std::io::Write::flush(&mut std::io::stdout());
    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(_) => line.trim().to_string(),
        Err(_) => String::new(),
    }
}

/// A cloneable producer handle. Spawned workers either inherit the parent's
/// interaction token (`inherit`) or start a fresh interaction context
/// (`fresh`), per §4.5 "Contexts".
#[derive(Clone)]
pub struct UiHandle {
    high_tx: mpsc::Sender<HighPriorityEvent>,
    normal_tx: mpsc::Sender<NormalEvent>,
    interaction_counter: Arc<AtomicU64>,
    is_tty: bool,
    quiet: bool,
}

impl UiHandle {
    pub async fn log(&self, line: impl Into<String>) {
        let _ = self.normal_tx.send(NormalEvent::Log(line.into())).await;
    }

    pub async fn error(&self, line: impl Into<String>) {
        let _ = self.normal_tx.send(NormalEvent::Error(line.into())).await;
    }

    /// Begins a bracketed interaction. Normal-tier output sent by any
    /// producer while this handle is alive is buffered by the consumer
    /// until `end()` / drop.
    pub async fn begin_interaction(&self) -> InteractionHandle {
        let id = self.interaction_counter.fetch_add(1, Ordering::SeqCst);
        let _ = self.high_tx.send(HighPriorityEvent::Begin(id)).await;
        InteractionHandle {
            id,
            high_tx: self.high_tx.clone(),
            ended: false,
        }
    }

    /// Non-TTY / quiet-mode short-circuit: prompts return `Err(NoTty)`
    /// without ever reaching the consumer (§4.5, §8 Boundary behaviours).
    pub async fn prompt(&self, request: PromptChoice) -> Result<usize, UiError> {
        if !self.is_tty {
            return Err(UiError::NoTty);
        }
        let (tx, rx) = oneshot::channel();
        if self
            .high_tx
            .send(HighPriorityEvent::Prompt {
                interaction: 0,
                request,
                respond: tx,
            })
            .await
            .is_err()
        {
            return Err(UiError::ShuttingDown);
        }
        rx.await.map_err(|_| UiError::ShuttingDown)
    }

    /// Free-text counterpart to [`prompt`](Self::prompt), used where a
    /// fixed choice list can't capture the answer (e.g. an approval
    /// pattern). Same non-TTY short-circuit as `prompt`.
    pub async fn prompt_text(&self, message: impl Into<String>) -> Result<String, UiError> {
        if !self.is_tty {
            return Err(UiError::NoTty);
        }
        let (tx, rx) = oneshot::channel();
        if self
            .high_tx
            .send(HighPriorityEvent::PromptText {
                interaction: 0,
                message: message.into(),
                respond: tx,
            })
            .await
            .is_err()
        {
            return Err(UiError::ShuttingDown);
        }
        rx.await.map_err(|_| UiError::ShuttingDown)
    }

    /// Spinners degrade to a single info line in non-TTY or quiet mode.
    pub async fn spinner_line(&self, line: impl Into<String>) {
        if !self.is_tty || self.quiet {
            self.log(line).await;
        } else {
            let _ = self.high_tx.send(HighPriorityEvent::SpinnerLine(line.into())).await;
        }
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }
}

/// RAII bracket for a high-priority interaction; ends it on drop if not
/// already ended explicitly.
pub struct InteractionHandle {
    id: u64,
    high_tx: mpsc::Sender<HighPriorityEvent>,
    ended: bool,
}

impl InteractionHandle {
    pub async fn end(mut self) {
        let _ = self.high_tx.send(HighPriorityEvent::End(self.id)).await;
        self.ended = true;
    }
}

impl Drop for InteractionHandle {
    fn drop(&mut self) {
        if !self.ended {
            let _ = self.high_tx.try_send(HighPriorityEvent::End(self.id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_and_shutdown_drains() {
        let (queue, consumer) = UiQueue::start(true);
        let handle = queue.handle();
        handle.log("hello").await;
        queue.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(2), consumer)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_interaction_bracket_buffers_normal_output() {
        let (queue, consumer) = UiQueue::start(true);
        let handle = queue.handle();
        let interaction = handle.begin_interaction().await;
        handle.log("during interaction").await;
        interaction.end().await;
        handle.log("after interaction").await;
        queue.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(2), consumer)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_prompt_without_tty_short_circuits() {
        let (queue, _consumer) = UiQueue::start(false);
        let mut handle = queue.handle();
        handle.is_tty = false;
        let result = handle
            .prompt(PromptChoice {
                text: "approve?".to_string(),
                choices: vec!["yes".to_string(), "no".to_string()],
            })
            .await;
        assert_eq!(result, Err(UiError::NoTty));
    }

    #[tokio::test]
    async fn test_prompt_text_without_tty_short_circuits() {
        let (queue, _consumer) = UiQueue::start(false);
        let mut handle = queue.handle();
        handle.is_tty = false;
        let result = handle.prompt_text("pattern?").await;
        assert_eq!(result, Err(UiError::NoTty));
    }

    #[tokio::test]
    async fn test_spinner_degrades_to_log_when_quiet() {
        let (queue, consumer) = UiQueue::start(true);
        let handle = queue.handle();
        handle.spinner_line("working...").await;
        queue.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(2), consumer)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_interaction_handle_drop_ends_interaction() {
        let (queue, consumer) = UiQueue::start(true);
        let handle = queue.handle();
        {
            let _interaction = handle.begin_interaction().await;
        }
        handle.log("after drop").await;
        queue.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(2), consumer)
            .await
            .unwrap()
            .unwrap();
    }
}
