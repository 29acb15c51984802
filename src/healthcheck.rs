use std::time::Duration;
use tokio::net::TcpStream;

/// Default ingestion port for health checks
const DEFAULT_PORT: u16 = 9898;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Error type for healthcheck failures
#[derive(Debug)]
pub struct HealthcheckError(String);

impl std::fmt::Display for HealthcheckError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Healthcheck failed: {}", self.0)
    }
}

impl std::error::Error for HealthcheckError {}

/// Perform a health check against the default port (9898)
pub async fn healthcheck() -> Result<(), HealthcheckError> {
    healthcheck_with_port(DEFAULT_PORT).await
}

/// Check that the daemon accepts connections on a specific local port.
///
/// The probe connection is closed right away, which the daemon treats as an
/// empty session.
pub async fn healthcheck_with_port(port: u16) -> Result<(), HealthcheckError> {
    let address = format!("127.0.0.1:{port}");

    match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&address)).await {
        Ok(Ok(_stream)) => Ok(()),
        Ok(Err(e)) => Err(HealthcheckError(format!("Connect to {address} failed: {e}"))),
        Err(_) => Err(HealthcheckError(format!(
            "Connect to {address} timed out after {CONNECT_TIMEOUT:?}"
        ))),
    }
}
