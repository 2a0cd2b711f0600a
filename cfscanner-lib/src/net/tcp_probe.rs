//! C3: the TCP prober (§4.3).

use std::net::IpAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::pipeline::candidate::CandidateReject;

const DIAL_TIMEOUT: Duration = Duration::from_millis(1500);

/// Opens then immediately closes a TCP connection to `<ip>:443`. No
/// retries; any error or timeout rejects the candidate silently (§7).
pub async fn probe(ip: IpAddr) -> Result<(), CandidateReject> {
    match timeout(DIAL_TIMEOUT, TcpStream::connect((ip, 443))).await {
        Ok(Ok(stream)) => {
            drop(stream);
            Ok(())
        }
        Ok(Err(_)) => Err(CandidateReject::TcpDialFailed),
        Err(_) => Err(CandidateReject::TcpDialTimedOut),
    }
}
