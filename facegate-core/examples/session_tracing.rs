//! Example demonstrating session tracing instrumentation.
//!
//! Runs a login session against the mock camera and services; the verifier
//! matches on the third frame.
//!
//! Run with: cargo run -p facegate-core --example session_tracing

use std::sync::Arc;
use std::time::Duration;

use facegate_core::{
    MockCamera, MockSessionStore, MockVerifier, SessionConfig, SessionEvent, SessionMode,
    Subject, VerificationSession,
};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> facegate_core::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::new("facegate_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    println!("=== Face Session Tracing Demo ===\n");

    let config = SessionConfig::default()
        .with_grace_period(Duration::from_millis(300))
        .with_max_duration(Some(Duration::from_secs(10)));
    println!("Config: {:?}\n", config);

    let (mut session, mut events) =
        VerificationSession::builder(Subject::parse("demo@example.org")?, SessionMode::Login)
            .device(Arc::new(MockCamera::default().with_warmup(5)))
            .verifier(Arc::new(MockVerifier::matching_after(2)))
            .store(Arc::new(MockSessionStore::new()))
            .config(config)
            .build()?;

    session.start().await?;
    while let Some(event) = events.recv().await {
        match &event {
            SessionEvent::NoMatch { attempt, .. } => println!("  attempt {attempt}: not recognized"),
            SessionEvent::MatchDetected { attempt } => println!("  attempt {attempt}: match!"),
            SessionEvent::Success(success) => println!("\n✅ Success: {:?}", success.effect),
            SessionEvent::Failure { reason, message, .. } => println!("  {reason}: {message}"),
            SessionEvent::DeviceError { reason } => println!("\n❌ Camera: {reason}"),
        }
        if event.is_terminal() {
            break;
        }
    }

    if let Some(report) = session.wait().await? {
        println!("\nReport: {:?}", report);
    }
    Ok(())
}
