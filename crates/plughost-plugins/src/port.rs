//! Local port allocation for plugin servers.

use std::io;
use std::net::{Ipv4Addr, TcpListener};

/// Asks the operating system for a currently unused TCP port on the
/// loopback interface.
///
/// The probe socket is closed before returning, so another process may claim
/// the port before the plugin binds it. The health check after launch
/// surfaces that case as a start failure.
///
/// # Errors
///
/// Returns the I/O error raised while binding the probe socket.
pub fn free_local_port() -> io::Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(listener.local_addr()?.port())
}
