//! Terminal rendering of session progress.

use colored::Colorize;
use facegate_core::{SessionEvent, SessionMode, SessionReport, Subject};

/// Prints human-readable status lines unless quiet.
pub struct Presenter {
    quiet: bool,
}

impl Presenter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn session_started(&self, subject: &Subject, mode: SessionMode) {
        if self.quiet {
            return;
        }
        println!();
        println!(
            "{} {} ({})",
            "Looking for".dimmed(),
            subject.as_str().bold(),
            mode
        );
        println!("{}", "Hold still and face the camera. Ctrl-C to stop.".dimmed());
    }

    pub fn show(&self, event: &SessionEvent) {
        if self.quiet {
            return;
        }
        match event {
            SessionEvent::DeviceError { reason } => {
                println!("   {} {}", "Camera:".dimmed(), reason.red());
            }
            SessionEvent::NoMatch {
                attempt, message, ..
            } => {
                let text = message.as_deref().unwrap_or("Face not recognized");
                println!("   {} {}", format!("[{attempt}]").dimmed(), text.yellow());
            }
            SessionEvent::MatchDetected { attempt } => {
                println!("   {} {}", format!("[{attempt}]").dimmed(), "Match!".green().bold());
            }
            SessionEvent::Success(_) => {}
            SessionEvent::Failure {
                reason,
                message,
                clear_after: Some(_),
            } => {
                println!("   {} {}: {}", "!".yellow(), reason, message.dimmed());
            }
            SessionEvent::Failure { reason, message, .. } => {
                println!();
                println!("{}", "╔════════════════════════════════════════╗".red());
                println!("{}", "║            NOT VERIFIED                ║".red().bold());
                println!("{}", "╚════════════════════════════════════════╝".red());
                println!();
                println!("   {} {}", "Reason:".dimmed(), reason.to_string().red());
                println!("   {} {}", "Detail:".dimmed(), message);
            }
        }
    }

    pub fn report(&self, report: &SessionReport) {
        if self.quiet {
            return;
        }
        println!(
            "   {} {} attempts, {} frames in {:.1}s",
            "Session:".dimmed(),
            report.attempts,
            report.frames_sampled,
            report.elapsed.as_secs_f64()
        );
    }

    pub fn prompt(&self, text: &str) {
        // Prompts are needed to proceed, so they ignore quiet.
        println!("{}", text.cyan());
    }

    pub fn success(&self, title: &str, details: &[(&str, &str)]) {
        if self.quiet {
            return;
        }
        println!();
        println!("{}", "╔════════════════════════════════════════╗".green());
        println!("{}", format!("║{title:^40}║").green().bold());
        println!("{}", "╚════════════════════════════════════════╝".green());
        println!();
        for (label, value) in details {
            println!("   {} {}", label.dimmed(), value.green());
        }
    }
}
