use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};
use vkserial_core::{ProgressSink, TransferEvent};

const BAR_TEMPLATE: &str =
    "{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg} [{elapsed_precise}] {bytes}";

/// Draws one progress bar per transfer on stderr
#[derive(Default)]
pub struct BarProgress {
    current: Mutex<Option<ProgressBar>>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for BarProgress {
    fn on_event(&self, label: &str, event: &TransferEvent) {
        let Ok(mut current) = self.current.lock() else {
            return;
        };

        match event {
            TransferEvent::Started {
                total,
                resumed_bytes,
            } => {
                let bar = create_progress_bar(*total);
                bar.set_message(label.to_string());
                bar.set_position(*resumed_bytes);
                *current = Some(bar);
            }
            TransferEvent::Progress { bytes } => {
                if let Some(bar) = current.as_ref() {
                    bar.inc(*bytes);
                }
            }
            TransferEvent::Finished { .. } => {
                if let Some(bar) = current.take() {
                    bar.finish_with_message(format!("{} done", label));
                }
            }
            TransferEvent::Failed { .. } => {
                if let Some(bar) = current.take() {
                    bar.abandon_with_message(format!("{} failed", label));
                }
            }
        }
    }
}

fn create_progress_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(total) => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template(SPINNER_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar
        }
    }
}
