use tokio::sync::mpsc;

/// Queues user-typed interjections sent while a completion round is in
/// flight, so they can be drained and appended before the next model
/// request rather than lost or racing the in-flight round.
#[derive(Clone)]
pub struct InterjectionSender {
    tx: mpsc::UnboundedSender<String>,
}

impl InterjectionSender {
    pub fn send(&self, text: impl Into<String>) {
        let _ = self.tx.send(text.into());
    }
}

pub struct InterjectionQueue {
    rx: mpsc::UnboundedReceiver<String>,
}

impl InterjectionQueue {
    pub fn new() -> (InterjectionSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (InterjectionSender { tx }, InterjectionQueue { rx })
    }

    /// Drains every interjection queued so far without blocking.
    pub fn drain_all(&mut self) -> Vec<String> {
        let mut drained = Vec::new();
        while let Ok(text) = self.rx.try_recv() {
            drained.push(text);
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_all_returns_in_order_and_empties_queue() {
        let (sender, mut queue) = InterjectionQueue::new();
        sender.send("first");
        sender.send("second");
        assert_eq!(queue.drain_all(), vec!["first".to_string(), "second".to_string()]);
        assert!(queue.drain_all().is_empty());
    }
}
