//! Notification Module
//!
//! Delivers drift reports to people. Every notifier renders the same two
//! parts: the human-readable message and the structured summary.

pub mod slack;

pub use slack::{ChatNotifier, ChatTransport, SlackBot, SlackWebhook};

use crate::config::{NotifierSettings, Settings};
use crate::error::DriftResult;
use crate::snapshot::DriftReport;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Delivery channel for drift reports
pub trait Notifier: Send + Sync {
    fn notify(&self, report: &DriftReport) -> DriftResult<()>;

    /// Short channel name for logs
    fn name(&self) -> &'static str;
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&self, report: &DriftReport) -> DriftResult<()> {
        (**self).notify(report)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, report: &DriftReport) -> DriftResult<()> {
        (**self).notify(report)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Writes reports to stderr (or any writer). Never fails.
pub struct ConsoleNotifier {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleNotifier {
    pub fn stderr() -> Self {
        Self::with_writer(io::stderr())
    }

    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(writer)),
        }
    }

    /// The exact text written for one report
    pub fn render(report: &DriftReport) -> String {
        format!("{}\nsummary: {}\n", report.message(), report.summary())
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::stderr()
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, report: &DriftReport) -> DriftResult<()> {
        let text = Self::render(report);

        // A poisoned lock still holds a usable writer
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Nowhere left to report a failed console write
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

/// Build the notifier selected by `settings`
pub fn from_settings(settings: &Settings) -> DriftResult<Box<dyn Notifier>> {
    let notifier: Box<dyn Notifier> = match &settings.notifier {
        NotifierSettings::Console => Box::new(ConsoleNotifier::stderr()),
        NotifierSettings::SlackWebhook { url } => Box::new(ChatNotifier::new(SlackWebhook::new(
            url.clone(),
            settings.http_timeout,
        )?)),
        NotifierSettings::SlackBot { token, channel } => Box::new(ChatNotifier::new(SlackBot::new(
            token.clone(),
            channel.clone(),
            settings.http_timeout,
        )?)),
    };
    Ok(notifier)
}
