use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::debug;

pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Online when a TCP connection to `target` opens within the timeout.
#[derive(Debug, Clone)]
pub struct TcpConnectivity {
    target: String,
    timeout: Duration,
}

impl TcpConnectivity {
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target: target.into(),
            timeout,
        }
    }
}

impl Default for TcpConnectivity {
    fn default() -> Self {
        Self::new("captive.apple.com:80", Duration::from_secs(3))
    }
}

impl Connectivity for TcpConnectivity {
    fn is_online(&self) -> bool {
        let addrs = match self.target.to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(err) => {
                debug!(target = %self.target, error = %err, "connectivity target resolve failed");
                return false;
            }
        };
        for addr in addrs {
            if TcpStream::connect_timeout(&addr, self.timeout).is_ok() {
                return true;
            }
        }
        debug!(target = %self.target, "connectivity target has no route");
        false
    }
}

/// Connectivity answer set by the caller.
#[derive(Debug)]
pub struct StaticConnectivity {
    online: AtomicBool,
}

impl StaticConnectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Connectivity for StaticConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
