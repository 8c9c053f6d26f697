//! CLI command implementations.

pub mod control;
pub mod serve;
pub mod sync;

use std::io::Read;
use std::sync::mpsc;
use std::thread;

/// Blocks until Ctrl-C or end of stdin.
pub fn wait_for_interrupt() -> Result<(), Box<dyn std::error::Error>> {
    let (tx, rx) = mpsc::channel::<&'static str>();

    let on_signal = tx.clone();
    ctrlc::set_handler(move || {
        let _ = on_signal.send("interrupt");
    })?;

    thread::Builder::new()
        .name("stdin-watch".into())
        .spawn(move || {
            let mut sink = [0u8; 256];
            let mut stdin = std::io::stdin();
            while matches!(stdin.read(&mut sink), Ok(n) if n > 0) {}
            let _ = tx.send("end of input");
        })?;

    let reason = rx.recv().unwrap_or("channel closed");
    tracing::info!(%reason, "stopping");
    Ok(())
}
