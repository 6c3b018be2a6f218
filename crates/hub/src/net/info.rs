//! Local network discovery helpers.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Best-guess primary IPv4 address of this machine on the LAN.
///
/// Uses the connected-UDP-socket trick: no packet is actually sent, the
/// OS just picks the route (and therefore the source address) it would
/// use. Falls back to the loopback address on machines with no route.
pub fn local_ipv4() -> IpAddr {
    let probed = UdpSocket::bind(("0.0.0.0", 0)).and_then(|socket| {
        socket.connect(("8.8.8.8", 80))?;
        Ok(socket.local_addr()?.ip())
    });

    probed.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// The URL clients open (or scan) to reach the hub, optionally carrying a
/// session code to join directly.
pub fn hub_url(ip: IpAddr, port: u16, session: Option<&str>) -> String {
    match session {
        Some(code) => format!("http://{ip}:{port}/?session={code}"),
        None => format!("http://{ip}:{port}"),
    }
}
