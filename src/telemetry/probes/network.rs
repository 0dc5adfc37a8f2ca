use std::sync::Arc;

use super::super::command::CommandRunner;
use super::super::error::ProbeFailure;
use super::super::fallback::{FallbackChain, Strategy};
use super::super::types::{ByteCounters, MetricKind, RawReading, Sample};
use super::Probe;

/// Interface-name prefixes whose traffic counts towards the totals.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceFilter {
    prefixes: Vec<String>,
}

impl InterfaceFilter {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        InterfaceFilter {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }
}

/// Total byte counters over allow-listed interfaces.
///
/// The routing table dump is tried first and `netstat -ib` second; either
/// one matching no interface counts as a structural failure.
pub struct NetworkProbe {
    chain: FallbackChain<ByteCounters>,
}

impl NetworkProbe {
    pub fn new(runner: Arc<dyn CommandRunner>, filter: InterfaceFilter) -> Self {
        let chain = FallbackChain::new()
            .then(RoutingTableCounters {
                filter: filter.clone(),
            })
            .then(NetstatCounters { runner, filter });
        NetworkProbe { chain }
    }

    pub fn with_chain(chain: FallbackChain<ByteCounters>) -> Self {
        NetworkProbe { chain }
    }
}

impl Probe for NetworkProbe {
    fn kind(&self) -> MetricKind {
        MetricKind::Network
    }

    fn sample(&self) -> Result<Sample, ProbeFailure> {
        let (source, counters) = self.chain.run()?;
        Ok(Sample::new(source, RawReading::Network(counters)))
    }
}

pub struct RoutingTableCounters {
    filter: InterfaceFilter,
}

impl RoutingTableCounters {
    pub fn new(filter: InterfaceFilter) -> Self {
        RoutingTableCounters { filter }
    }
}

impl Strategy<ByteCounters> for RoutingTableCounters {
    fn name(&self) -> &'static str {
        "sysctl::NET_RT_IFLIST2"
    }

    fn attempt(&self) -> Result<ByteCounters, ProbeFailure> {
        let interfaces = read_interface_table()?;
        sum_matching(
            &self.filter,
            interfaces
                .iter()
                .map(|(name, counters)| (name.as_str(), *counters)),
        )
    }
}

pub struct NetstatCounters {
    runner: Arc<dyn CommandRunner>,
    filter: InterfaceFilter,
}

impl NetstatCounters {
    pub fn new(runner: Arc<dyn CommandRunner>, filter: InterfaceFilter) -> Self {
        NetstatCounters { runner, filter }
    }
}

impl Strategy<ByteCounters> for NetstatCounters {
    fn name(&self) -> &'static str {
        "netstat -ib"
    }

    fn attempt(&self) -> Result<ByteCounters, ProbeFailure> {
        let output = self.runner.run("netstat", &["-ib"])?;
        parse_netstat(&output, &self.filter)
    }
}

fn sum_matching<'a>(
    filter: &InterfaceFilter,
    interfaces: impl Iterator<Item = (&'a str, ByteCounters)>,
) -> Result<ByteCounters, ProbeFailure> {
    let mut total = ByteCounters::default();
    let mut matched = 0usize;
    for (name, counters) in interfaces {
        if filter.matches(name) {
            total.inbound = total.inbound.wrapping_add(counters.inbound);
            total.outbound = total.outbound.wrapping_add(counters.outbound);
            matched += 1;
        }
    }
    if matched == 0 {
        return Err(ProbeFailure::no_data("no matching interfaces"));
    }
    Ok(total)
}

/// Sums the `<Link#n>` rows of `netstat -ib`.
///
/// The address column is blank for some interfaces, so byte columns are
/// located from the end of the row: `... Ibytes Opkts Oerrs Obytes Coll`.
pub fn parse_netstat(output: &str, filter: &InterfaceFilter) -> Result<ByteCounters, ProbeFailure> {
    let mut lines = output.lines();
    let header = lines
        .next()
        .ok_or_else(|| ProbeFailure::parse("netstat printed nothing"))?;
    if !header.trim_start().starts_with("Name") {
        return Err(ProbeFailure::parse(format!("unexpected netstat header: {}", header)));
    }

    let mut rows = Vec::new();
    for line in lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 || !fields[2].starts_with("<Link#") {
            continue;
        }
        let name = fields[0].trim_end_matches('*');
        let inbound = fields[fields.len() - 5].parse::<u64>();
        let outbound = fields[fields.len() - 2].parse::<u64>();
        if let (Ok(inbound), Ok(outbound)) = (inbound, outbound) {
            rows.push((name, ByteCounters { inbound, outbound }));
        }
    }
    sum_matching(filter, rows.into_iter())
}

#[cfg(target_os = "macos")]
fn read_interface_table() -> Result<Vec<(String, ByteCounters)>, ProbeFailure> {
    use std::mem::size_of;
    use std::ptr;

    let mut mib = [
        libc::CTL_NET,
        libc::PF_ROUTE,
        0,
        0,
        libc::NET_RT_IFLIST2,
        0,
    ];
    let mut len: libc::size_t = 0;
    let result = unsafe {
        libc::sysctl(
            mib.as_mut_ptr(),
            mib.len() as libc::c_uint,
            ptr::null_mut(),
            &mut len,
            ptr::null_mut(),
            0,
        )
    };
    if result != 0 {
        return Err(ProbeFailure::QueryFailed("sysctl(NET_RT_IFLIST2)", last_errno()));
    }

    let mut buf = vec![0u8; len];
    let result = unsafe {
        libc::sysctl(
            mib.as_mut_ptr(),
            mib.len() as libc::c_uint,
            buf.as_mut_ptr() as *mut libc::c_void,
            &mut len,
            ptr::null_mut(),
            0,
        )
    };
    if result != 0 {
        return Err(ProbeFailure::QueryFailed("sysctl(NET_RT_IFLIST2)", last_errno()));
    }
    buf.truncate(len);

    let mut interfaces = Vec::new();
    let mut offset = 0usize;
    while offset + 4 <= buf.len() {
        let msg_len = u16::from_ne_bytes([buf[offset], buf[offset + 1]]) as usize;
        let msg_type = buf[offset + 3] as libc::c_int;
        if msg_len == 0 {
            break;
        }
        if msg_type == libc::RTM_IFINFO2 && offset + size_of::<libc::if_msghdr2>() <= buf.len() {
            let header: libc::if_msghdr2 = unsafe {
                ptr::read_unaligned(buf.as_ptr().add(offset) as *const libc::if_msghdr2)
            };
            if let Some(name) = interface_name(header.ifm_index as u32) {
                interfaces.push((
                    name,
                    ByteCounters {
                        inbound: header.ifm_data.ifi_ibytes,
                        outbound: header.ifm_data.ifi_obytes,
                    },
                ));
            }
        }
        offset += msg_len;
    }
    Ok(interfaces)
}

#[cfg(target_os = "macos")]
fn interface_name(index: u32) -> Option<String> {
    let mut name = [0 as libc::c_char; libc::IF_NAMESIZE];
    let ptr = unsafe { libc::if_indextoname(index, name.as_mut_ptr()) };
    if ptr.is_null() {
        return None;
    }
    let name = unsafe { std::ffi::CStr::from_ptr(name.as_ptr()) };
    Some(name.to_string_lossy().into_owned())
}

#[cfg(target_os = "macos")]
fn last_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(-1)
}

#[cfg(not(target_os = "macos"))]
fn read_interface_table() -> Result<Vec<(String, ByteCounters)>, ProbeFailure> {
    Err(ProbeFailure::Unsupported("sysctl(NET_RT_IFLIST2)"))
}
