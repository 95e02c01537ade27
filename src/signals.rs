//! SIGINT/SIGTERM handling for the Orchestrator. Installed once, before the
//! main agent is launched (spec §5).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceivedSignal {
    Interrupt,
    Terminate,
}

impl ReceivedSignal {
    /// 130 on SIGINT, 143 on SIGTERM (spec §5, §6).
    pub fn exit_code(self) -> i32 {
        match self {
            ReceivedSignal::Interrupt => 130,
            ReceivedSignal::Terminate => 143,
        }
    }

    /// The raw signal number, for process-group forwarding.
    pub fn raw(self) -> i32 {
        match self {
            ReceivedSignal::Interrupt => libc::SIGINT,
            ReceivedSignal::Terminate => libc::SIGTERM,
        }
    }
}

#[cfg(unix)]
pub async fn wait_for_signal() -> ReceivedSignal {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = sigint.recv() => ReceivedSignal::Interrupt,
        _ = sigterm.recv() => ReceivedSignal::Terminate,
    }
}

#[cfg(not(unix))]
pub async fn wait_for_signal() -> ReceivedSignal {
    tokio::signal::ctrl_c().await.ok();
    ReceivedSignal::Interrupt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_spec() {
        assert_eq!(ReceivedSignal::Interrupt.exit_code(), 130);
        assert_eq!(ReceivedSignal::Terminate.exit_code(), 143);
    }
}
