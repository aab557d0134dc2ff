use futures::stream::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::{Handle, Signals};

/// Stream of SIGINT/SIGTERM deliveries that end `ferry serve`
pub struct ShutdownSignals {
    signals: Signals,
    handle: Handle,
}

impl ShutdownSignals {
    /// Register handlers for SIGINT and SIGTERM
    pub fn install() -> std::io::Result<Self> {
        let signals = Signals::new([SIGINT, SIGTERM])?;
        let handle = signals.handle();
        Ok(Self { signals, handle })
    }

    /// Wait for the next shutdown signal; `None` once closed
    pub async fn recv(&mut self) -> Option<i32> {
        self.signals.next().await
    }
}

impl Drop for ShutdownSignals {
    fn drop(&mut self) {
        self.handle.close();
    }
}

/// Conventional name for a shutdown signal, for logs
pub fn signal_name(signal: i32) -> &'static str {
    match signal {
        SIGINT => "SIGINT",
        SIGTERM => "SIGTERM",
        _ => "unknown",
    }
}
