//! # Mailbox
//!
//! The inbound queue of an actor (or of a plain caller waiting for a reply).
//!
//! ## Ordering
//! Two FIFO queues live behind one lock: system events and everything else.
//! [`Mailbox::receive`] always offers system events to the predicate first, so a
//! crash notification overtakes ordinary messages that were queued before it,
//! while each class stays in send order.
//!
//! ## Waiting
//! Receivers park on a [`tokio::sync::Notify`]; every send and the final
//! [`Mailbox::shutdown`] wake them. Nobody spins, and the notifier works across
//! runtimes, so a mailbox can be fed from any actor thread.
//!
//! ## Capacity
//! Calls, block calls and plain messages count against the optional capacity.
//! System events, responses and block responses are owed to a waiting party and
//! are always accepted while the mailbox is alive.

use crate::error::ActorError;
use crate::message::Message;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

static NEXT_MAILBOX_ID: AtomicU64 = AtomicU64::new(1);

struct Queues {
    system: VecDeque<Message>,
    ordinary: VecDeque<Message>,
    /// Queued messages that count against the capacity.
    bounded: usize,
    alive: bool,
}

struct Inner {
    id: u64,
    capacity: Option<usize>,
    queues: Mutex<Queues>,
    notify: Notify,
}

/// Thread-safe message queue with system-message priority.
#[derive(Clone)]
pub struct Mailbox {
    inner: Arc<Inner>,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    /// Unbounded mailbox.
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: NEXT_MAILBOX_ID.fetch_add(1, Ordering::Relaxed),
                capacity,
                queues: Mutex::new(Queues {
                    system: VecDeque::new(),
                    ordinary: VecDeque::new(),
                    bounded: 0,
                    alive: true,
                }),
                notify: Notify::new(),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity
    }

    pub fn is_alive(&self) -> bool {
        self.inner.queues.lock().alive
    }

    pub fn len(&self) -> usize {
        let queues = self.inner.queues.lock();
        queues.system.len() + queues.ordinary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueues a message and wakes the receivers.
    pub fn send(&self, message: Message) -> Result<(), ActorError> {
        {
            let mut queues = self.inner.queues.lock();
            if !queues.alive {
                return Err(ActorError::MailboxDead);
            }
            if message.is_system() {
                queues.system.push_back(message);
            } else {
                if message.is_bounded() {
                    if let Some(capacity) = self.inner.capacity {
                        if queues.bounded >= capacity {
                            return Err(ActorError::MailboxFull(capacity));
                        }
                    }
                    queues.bounded += 1;
                }
                queues.ordinary.push_back(message);
            }
        }
        self.inner.notify.notify_waiters();
        Ok(())
    }

    /// Removes the first message matching `predicate` without waiting.
    pub fn try_receive<F>(&self, mut predicate: F) -> Result<Option<Message>, ActorError>
    where
        F: FnMut(&Message) -> bool,
    {
        let mut queues = self.inner.queues.lock();
        if !queues.alive {
            return Err(ActorError::MailboxDead);
        }
        if let Some(index) = queues.system.iter().position(&mut predicate) {
            return Ok(queues.system.remove(index));
        }
        if let Some(index) = queues.ordinary.iter().position(&mut predicate) {
            let message = queues.ordinary.remove(index);
            if message.as_ref().is_some_and(Message::is_bounded) {
                queues.bounded -= 1;
            }
            return Ok(message);
        }
        Ok(None)
    }

    /// Waits for the first message matching `predicate`.
    ///
    /// Fails with [`ActorError::Timeout`] when `timeout` elapses and with
    /// [`ActorError::MailboxDead`] once the mailbox has been shut down.
    pub async fn receive<F>(
        &self,
        timeout: Option<Duration>,
        predicate: F,
    ) -> Result<Message, ActorError>
    where
        F: FnMut(&Message) -> bool + Send,
    {
        let deadline = timeout.map(|t| (Instant::now() + t, t));
        self.receive_until(deadline, predicate).await
    }

    /// Like [`Mailbox::receive`] against an absolute deadline; the duration is
    /// the one reported in the timeout error.
    pub(crate) async fn receive_until<F>(
        &self,
        deadline: Option<(Instant, Duration)>,
        mut predicate: F,
    ) -> Result<Message, ActorError>
    where
        F: FnMut(&Message) -> bool + Send,
    {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.try_receive(&mut predicate)? {
                return Ok(message);
            }

            match deadline {
                Some((at, timeout)) => {
                    if tokio::time::timeout_at(at, notified).await.is_err() {
                        return Err(ActorError::Timeout(timeout));
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Marks the mailbox dead, wakes every receiver and hands back whatever
    /// was still queued so the owner can fail its responders.
    pub fn shutdown(&self) -> Vec<Message> {
        let undelivered = {
            let mut queues = self.inner.queues.lock();
            if !queues.alive {
                return Vec::new();
            }
            queues.alive = false;
            queues.bounded = 0;
            let mut undelivered: Vec<Message> = queues.system.drain(..).collect();
            undelivered.extend(queues.ordinary.drain(..));
            undelivered
        };
        self.inner.notify.notify_waiters();
        undelivered
    }
}

impl PartialEq for Mailbox {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Mailbox {}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mailbox({})", self.inner.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{CallId, Response, SystemEvent};
    use crate::value::Value;

    fn info(n: i32) -> Message {
        Message::Info(Value::new(n))
    }

    fn info_value(message: Message) -> i32 {
        match message {
            Message::Info(value) => value.get::<i32>().unwrap(),
            other => panic!("expected info, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_receive_preserves_send_order() {
        let mailbox = Mailbox::new();
        for n in 0..5 {
            mailbox.send(info(n)).unwrap();
        }
        for n in 0..5 {
            let message = mailbox.receive(None, |_| true).await.unwrap();
            assert_eq!(info_value(message), n);
        }
    }

    #[tokio::test]
    async fn test_system_events_overtake_queued_messages() {
        let mailbox = Mailbox::new();
        mailbox.send(info(1)).unwrap();
        mailbox.send(info(2)).unwrap();
        mailbox
            .send(Message::System(SystemEvent::Terminate))
            .unwrap();

        let first = mailbox.receive(None, |_| true).await.unwrap();
        assert!(first.is_system());
        assert_eq!(info_value(mailbox.receive(None, |_| true).await.unwrap()), 1);
        assert_eq!(info_value(mailbox.receive(None, |_| true).await.unwrap()), 2);
    }

    #[tokio::test]
    async fn test_predicate_skips_non_matching_messages() {
        let mailbox = Mailbox::new();
        for n in 0..4 {
            mailbox.send(info(n)).unwrap();
        }
        let odd = mailbox
            .receive(None, |m| matches!(m, Message::Info(v) if v.get::<i32>().unwrap() % 2 == 1))
            .await
            .unwrap();
        assert_eq!(info_value(odd), 1);
        assert_eq!(mailbox.len(), 3);
        assert_eq!(info_value(mailbox.receive(None, |_| true).await.unwrap()), 0);
    }

    #[tokio::test]
    async fn test_receive_times_out() {
        let mailbox = Mailbox::new();
        let result = mailbox
            .receive(Some(Duration::from_millis(20)), |_| true)
            .await;
        assert!(matches!(result, Err(ActorError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_receive_wakes_on_send_from_another_thread() {
        let mailbox = Mailbox::new();
        let sender = mailbox.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            sender.send(info(7)).unwrap();
        });
        let message = mailbox
            .receive(Some(Duration::from_secs(2)), |_| true)
            .await
            .unwrap();
        assert_eq!(info_value(message), 7);
    }

    #[tokio::test]
    async fn test_shutdown_wakes_receivers_and_rejects_sends() {
        let mailbox = Mailbox::new();
        let receiver = mailbox.clone();
        let waiting = tokio::spawn(async move { receiver.receive(None, |_| true).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        mailbox.send(info(1)).unwrap();
        assert_eq!(info_value(waiting.await.unwrap().unwrap()), 1);

        let receiver = mailbox.clone();
        let waiting = tokio::spawn(async move { receiver.receive(None, |_| true).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        mailbox.send(info(2)).unwrap();
        mailbox.send(info(3)).unwrap();
        let _ = waiting.await.unwrap();

        let undelivered = mailbox.shutdown();
        assert_eq!(undelivered.len(), 1);
        assert!(matches!(mailbox.send(info(4)), Err(ActorError::MailboxDead)));
        assert!(matches!(
            mailbox.receive(None, |_| true).await,
            Err(ActorError::MailboxDead)
        ));
    }

    #[tokio::test]
    async fn test_blocked_receiver_sees_shutdown() {
        let mailbox = Mailbox::new();
        let receiver = mailbox.clone();
        let waiting = tokio::spawn(async move { receiver.receive(None, |_| false).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        mailbox.shutdown();
        assert!(matches!(
            waiting.await.unwrap(),
            Err(ActorError::MailboxDead)
        ));
    }

    #[test]
    fn test_capacity_bounds_ordinary_messages_only() {
        let mailbox = Mailbox::bounded(1);
        mailbox.send(info(1)).unwrap();
        assert!(matches!(mailbox.send(info(2)), Err(ActorError::MailboxFull(1))));
        mailbox
            .send(Message::System(SystemEvent::Terminate))
            .unwrap();
        assert_eq!(mailbox.len(), 2);
    }

    #[tokio::test]
    async fn test_unread_responses_do_not_use_up_capacity() {
        let mailbox = Mailbox::bounded(1);
        for _ in 0..3 {
            mailbox
                .send(Message::Response(Response {
                    call_id: CallId::next(),
                    outcome: Ok(Value::unit()),
                }))
                .unwrap();
        }
        mailbox.send(info(1)).unwrap();
        assert!(matches!(mailbox.send(info(2)), Err(ActorError::MailboxFull(1))));

        let taken = mailbox
            .receive(None, |m| matches!(m, Message::Info(_)))
            .await
            .unwrap();
        assert_eq!(info_value(taken), 1);
        mailbox.send(info(3)).unwrap();
        assert_eq!(mailbox.len(), 4);
    }
}
