#![no_main]

use std::net::{IpAddr, Ipv4Addr};

use libfuzzer_sys::fuzz_target;
use sentrypipe_ingest::SyslogUdpAdapter;

fuzz_target!(|data: &[u8]| {
    let peer = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));
    // must return Ok or Err without panicking
    let _ = SyslogUdpAdapter::parse_datagram(data, peer);
});
