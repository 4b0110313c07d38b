//! Maps `Box<dyn Error>` from the transport seam to typed errors.
//!
//! With the `hardware-errors` feature the concrete `tuner_hardware::LinkError`
//! is downcast for precise mapping; otherwise the message is inspected.

use crate::error::{ConnectError, StationError};

fn looks_like_timeout(s: &str) -> bool {
    let s = s.to_lowercase();
    s.contains("timeout") || s.contains("timed out")
}

fn looks_truncated(s: &str) -> bool {
    s.to_lowercase().contains("truncated")
}

fn truncated_reply() -> StationError {
    StationError::Protocol("truncated reply from station (no line terminator)".into())
}

/// Map a failed write or read during an exchange.
pub fn map_link_error(e: &(dyn std::error::Error + 'static)) -> StationError {
    #[cfg(feature = "hardware-errors")]
    {
        use tuner_hardware::LinkError;
        if let Some(link) = e.downcast_ref::<LinkError>() {
            return match link {
                LinkError::Timeout => StationError::Protocol("no response from station (timeout)".into()),
                LinkError::Truncated { .. } => truncated_reply(),
                LinkError::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => {
                    StationError::Protocol("no response from station (timeout)".into())
                }
                other => StationError::Protocol(format!("link failure: {other}")),
            };
        }
    }

    let s = e.to_string();
    if looks_truncated(&s) {
        truncated_reply()
    } else if looks_like_timeout(&s) {
        StationError::Protocol("no response from station (timeout)".into())
    } else {
        StationError::Protocol(format!("link failure: {s}"))
    }
}

/// Map a failed open of `port`.
pub fn map_open_error(port: &str, e: &(dyn std::error::Error + 'static)) -> ConnectError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(tuner_hardware::LinkError::PortNotFound(name)) =
            e.downcast_ref::<tuner_hardware::LinkError>()
        {
            return ConnectError::PortUnavailable(name.clone());
        }
    }
    ConnectError::OpenFailed {
        port: port.to_string(),
        reason: e.to_string(),
    }
}
