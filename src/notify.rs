use std::time::{Duration, Instant};

pub const SUCCESS_TTL: Duration = Duration::from_millis(1000);
pub const ERROR_TTL: Duration = Duration::from_millis(4000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Error, message: message.into() }
    }

    pub fn ttl(&self) -> Duration {
        match self.kind {
            NoticeKind::Success => SUCCESS_TTL,
            NoticeKind::Error => ERROR_TTL,
        }
    }
}

/// Where notices go. Fire-and-forget.
pub trait Notifier {
    fn notify(&mut self, notice: Notice);
}

/// Auto-dismissing toasts for the terminal UI.
#[derive(Debug, Default)]
pub struct Toasts {
    active: Vec<(Notice, Instant)>,
}

impl Toasts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_at(&mut self, notice: Notice, now: Instant) {
        let expires = now + notice.ttl();
        self.active.push((notice, expires));
    }

    /// Drops expired toasts and returns the ones still showing.
    pub fn visible(&mut self, now: Instant) -> impl Iterator<Item = &Notice> {
        self.active.retain(|(_, expires)| *expires > now);
        self.active.iter().map(|(notice, _)| notice)
    }
}

impl Notifier for Toasts {
    fn notify(&mut self, notice: Notice) {
        self.push_at(notice, Instant::now());
    }
}

/// Prints notices for the one-shot `send` command.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&mut self, notice: Notice) {
        match notice.kind {
            NoticeKind::Success => println!("{}", notice.message),
            NoticeKind::Error => eprintln!("{}", notice.message),
        }
    }
}
