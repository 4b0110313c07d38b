use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("serial port error: {0}")]
    Serial(String),
    #[error("no line received before read timeout")]
    Timeout,
    #[error("reply truncated: {received} bytes without line terminator before read timeout")]
    Truncated { received: usize },
    #[error("port {0} is not available")]
    PortNotFound(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serialport::Error> for LinkError {
    fn from(e: serialport::Error) -> Self {
        match e.kind() {
            serialport::ErrorKind::Io(kind) => LinkError::Io(std::io::Error::new(kind, e.description)),
            _ => LinkError::Serial(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
