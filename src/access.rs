use crate::error::PreviewError;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use url::{Host, Url};

/// An IPv4 or IPv6 network in CIDR notation, e.g. `10.0.0.0/8` or `fc00::/7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpNetwork {
    addr: IpAddr,
    prefix: u8,
}

impl IpNetwork {
    pub fn new(addr: IpAddr, prefix: u8) -> Result<Self, PreviewError> {
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix > max {
            return Err(PreviewError::InvalidNetwork(format!(
                "prefix /{prefix} exceeds {max} bits for {addr}"
            )));
        }
        Ok(Self {
            addr: mask(addr, prefix),
            prefix,
        })
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_)) => {
                mask(ip, self.prefix) == self.addr
            }
            // An IPv4-mapped IPv6 address is matched against IPv4 networks.
            (IpAddr::V4(_), IpAddr::V6(v6)) => v6
                .to_ipv4_mapped()
                .map(|v4| mask(IpAddr::V4(v4), self.prefix) == self.addr)
                .unwrap_or(false),
            (IpAddr::V6(_), IpAddr::V4(_)) => false,
        }
    }
}

fn mask(addr: IpAddr, prefix: u8) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let bits = u32::from(v4);
            let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
            IpAddr::V4((bits & mask).into())
        }
        IpAddr::V6(v6) => {
            let bits = u128::from(v6);
            let mask = u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0);
            IpAddr::V6((bits & mask).into())
        }
    }
}

impl FromStr for IpNetwork {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| PreviewError::InvalidNetwork(format!("missing prefix length: {s}")))?;
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| PreviewError::InvalidNetwork(format!("invalid address: {s}")))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| PreviewError::InvalidNetwork(format!("invalid prefix length: {s}")))?;
        Self::new(addr, prefix)
    }
}

impl fmt::Display for IpNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

/// Parses a space separated list of CIDR ranges.
///
/// An empty (or all-whitespace) string yields an empty list; any malformed
/// entry fails the whole list.
pub fn parse_ranges(ranges: &str) -> Result<Vec<IpNetwork>, PreviewError> {
    ranges.split_whitespace().map(IpNetwork::from_str).collect()
}

/// Allow/deny lists that constrain which addresses a fetch may connect to.
///
/// A destination is permitted when the allow list is empty or contains it,
/// and the deny list does not contain it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    allowed: Vec<IpNetwork>,
    denied: Vec<IpNetwork>,
}

impl AccessPolicy {
    pub fn new(allowed: Vec<IpNetwork>, denied: Vec<IpNetwork>) -> Self {
        Self { allowed, denied }
    }

    /// Builds a policy from the space separated whitelist and blacklist strings.
    pub fn from_ranges(whitelist: &str, blacklist: &str) -> Result<Self, PreviewError> {
        Ok(Self::new(parse_ranges(whitelist)?, parse_ranges(blacklist)?))
    }

    pub fn allowed(&self) -> &[IpNetwork] {
        &self.allowed
    }

    pub fn denied(&self) -> &[IpNetwork] {
        &self.denied
    }

    pub fn permits(&self, ip: IpAddr) -> bool {
        let allowed = self.allowed.is_empty() || self.allowed.iter().any(|n| n.contains(ip));
        allowed && !self.denied.iter().any(|n| n.contains(ip))
    }

    /// Checks a URL whose host is an IP literal. Domain hosts pass here and are
    /// checked after resolution.
    pub fn check_url(&self, url: &Url) -> Result<(), PreviewError> {
        let ip = match url.host() {
            Some(Host::Ipv4(v4)) => IpAddr::V4(v4),
            Some(Host::Ipv6(v6)) => IpAddr::V6(v6),
            Some(Host::Domain(_)) => return Ok(()),
            None => {
                return Err(PreviewError::Internal(format!("no host in {url}")));
            }
        };
        if self.permits(ip) {
            Ok(())
        } else {
            Err(PreviewError::Internal(format!("destination {ip} not permitted")))
        }
    }
}
