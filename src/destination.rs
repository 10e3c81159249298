//! Destination strings
// (c) 2024 Ross Younger

use std::{fmt::Display, str::FromStr};

use anyhow::{anyhow, bail, ensure, Context as _};

/// A remote destination in `scp` style: `[user@]host:path` or `[user@][ipv6]:port:path`
///
/// Parsing never produces a partial result: either the host is non-empty and a path is present, or it fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDestination {
    /// Login name, if one was given
    pub user: Option<String>,
    /// The remote host. This may be a hostname, an IPv4 address or an IPv6 address (without brackets).
    pub host: String,
    /// Remote port. Only the bracketed IPv6 form can carry one; `None` means the mechanism default.
    pub port: Option<u16>,
    /// Remote path, verbatim. It may be empty (the remote user's home directory) and may contain colons.
    pub path: String,
}

impl ParsedDestination {
    /// The host as it must appear in a command line: IPv6 literals are bracketed
    #[must_use]
    pub fn host_for_display(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }

    /// `[user@]host`, suitable for ssh-family tools
    #[must_use]
    pub fn login(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.host_for_display()),
            None => self.host_for_display(),
        }
    }
}

impl Display for ParsedDestination {
    /// Formats as `[user@]host:path`; the port is not included.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.login(), self.path)
    }
}

/// Locates the first `@` and the first `:` which are not inside square brackets.
fn find_separators(s: &str) -> (Option<usize>, Option<usize>) {
    let mut depth = 0usize;
    let mut at = None;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '@' if depth == 0 && at.is_none() => at = Some(i),
            ':' if depth == 0 => return (at, Some(i)),
            _ => (),
        }
    }
    (at, None)
}

impl FromStr for ParsedDestination {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ensure!(!s.is_empty(), "empty destination");

        let (user, rest) = match find_separators(s) {
            (Some(at), colon) if at > 0 && colon.map_or(true, |c| at < c) => {
                (Some(s[..at].to_string()), &s[at + 1..])
            }
            _ => (None, s),
        };

        let (host, port, path) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (host, after) = bracketed
                .split_once(']')
                .ok_or_else(|| anyhow!("unterminated '[' in destination {s}"))?;
            let Some(port_path) = after.strip_prefix(':') else {
                bail!("no ':' separator after host in destination {s}");
            };
            match port_path.split_once(':') {
                Some((port, path))
                    if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) =>
                {
                    let port = port
                        .parse::<u16>()
                        .with_context(|| format!("invalid port in destination {s}"))?;
                    (host, Some(port), path)
                }
                _ => (host, None, port_path),
            }
        } else {
            let (host, path) = rest
                .split_once(':')
                .ok_or_else(|| anyhow!("no ':' separator in destination {s}"))?;
            (host, None, path)
        };

        ensure!(!host.is_empty(), "empty host in destination {s}");
        Ok(Self {
            user,
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }
}

/// A destination for the raw UDP mechanism: `host:port` or `host:port:path`
///
/// The host may also be a bracketed IPv6 literal, e.g. `[::1]:9000`.
/// The path is everything after the port and may itself contain colons (`h:9000:C:/out.bin`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpDestination {
    /// Host name or address (IPv6 without brackets)
    pub host: String,
    /// UDP port
    pub port: u16,
    /// Output path; only meaningful to a receiver. Everything after the second separator, colons included.
    pub path: Option<String>,
}

impl FromStr for UdpDestination {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let usage = || format!("Invalid UDP destination: {s}. Use host:port or host:port:path");
        let (host, rest) = if let Some(bracketed) = s.strip_prefix('[') {
            let (host, after) = bracketed.split_once(']').ok_or_else(|| anyhow!(usage()))?;
            let rest = after.strip_prefix(':').ok_or_else(|| anyhow!(usage()))?;
            (host, rest)
        } else {
            s.split_once(':').ok_or_else(|| anyhow!(usage()))?
        };
        ensure!(!host.is_empty(), usage());
        let (port, path) = match rest.split_once(':') {
            Some((port, path)) => (port, Some(path)),
            None => (rest, None),
        };
        let port = port.parse::<u16>().with_context(usage)?;
        Ok(Self {
            host: host.to_string(),
            port,
            path: path.filter(|p| !p.is_empty()).map(str::to_string),
        })
    }
}

/// The broad shape of a destination string, which drives mechanism suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum DestinationKind {
    /// A plain local path
    Local,
    /// An `ftp://` URL
    Ftp,
    /// An `https://`, `http://` or `http3://` URL
    Http,
    /// `[user@]host:path`, to be reached over ssh-style transports
    Remote,
}

impl DestinationKind {
    /// Classifies a destination string. This is a pure function; nothing is looked up.
    ///
    /// A string is considered remote when it parses as a [`ParsedDestination`] whose host
    /// does not look like part of a local path (as with rsync, a `/` before the first `:`
    /// makes it local).
    #[must_use]
    pub fn classify(destination: &str) -> Self {
        let lower = destination.trim().to_ascii_lowercase();
        if lower.starts_with("ftp://") {
            return Self::Ftp;
        }
        if ["https://", "http://", "http3://"]
            .iter()
            .any(|scheme| lower.starts_with(scheme))
        {
            return Self::Http;
        }
        match ParsedDestination::from_str(destination) {
            Ok(parsed) if !parsed.host.contains(['/', '\\']) => Self::Remote,
            _ => Self::Local,
        }
    }
}

#[cfg(test)]
mod test {
    type Res = anyhow::Result<()>;

    use super::{DestinationKind, ParsedDestination, UdpDestination};
    use std::str::FromStr;

    fn parse(s: &str) -> anyhow::Result<ParsedDestination> {
        ParsedDestination::from_str(s)
    }

    #[test]
    fn user_host_path() -> Res {
        let d = parse("alice@server:/home/alice/")?;
        assert_eq!(d.user.as_deref(), Some("alice"));
        assert_eq!(d.host, "server");
        assert_eq!(d.port, None);
        assert_eq!(d.path, "/home/alice/");
        Ok(())
    }

    #[test]
    fn host_path() -> Res {
        let d = parse("backup-host:/srv/data")?;
        assert!(d.user.is_none());
        assert_eq!(d.host, "backup-host");
        assert_eq!(d.path, "/srv/data");
        Ok(())
    }

    #[test]
    fn host_only_means_home_directory() -> Res {
        let d = parse("host:")?;
        assert_eq!(d.host, "host");
        assert_eq!(d.path, "");
        Ok(())
    }

    #[test]
    fn colons_in_path_preserved() -> Res {
        let d = parse("host:C:/Users/me:stuff")?;
        assert_eq!(d.host, "host");
        assert_eq!(d.path, "C:/Users/me:stuff");
        Ok(())
    }

    #[test]
    fn at_sign_after_colon_belongs_to_path() -> Res {
        let d = parse("host:/tmp/a@b")?;
        assert!(d.user.is_none());
        assert_eq!(d.path, "/tmp/a@b");
        Ok(())
    }

    #[test]
    fn bracketed_ipv6_with_port() -> Res {
        let d = parse("root@[fe80::1]:2222:/var/tmp")?;
        assert_eq!(d.user.as_deref(), Some("root"));
        assert_eq!(d.host, "fe80::1");
        assert_eq!(d.port, Some(2222));
        assert_eq!(d.path, "/var/tmp");
        Ok(())
    }

    #[test]
    fn bracketed_ipv6_without_port() -> Res {
        let d = parse("[::1]:/tmp/file")?;
        assert_eq!(d.host, "::1");
        assert_eq!(d.port, None);
        assert_eq!(d.path, "/tmp/file");
        Ok(())
    }

    #[test]
    fn round_trips_components() -> Res {
        for (user, host, port, path) in [
            (Some("u"), "example.com", None, "dir/file"),
            (None, "10.0.0.1", None, "/abs:olute"),
            (Some("me"), "2001:db8::7", Some(22u16), "x"),
            (None, "::1", Some(65535), ""),
        ] {
            let host_part = if host.contains(':') {
                format!("[{host}]")
            } else {
                host.to_string()
            };
            let mut s = user.map(|u| format!("{u}@")).unwrap_or_default();
            s.push_str(&host_part);
            if let Some(p) = port {
                s.push_str(&format!(":{p}"));
            }
            s.push(':');
            s.push_str(path);
            let d = parse(&s)?;
            assert_eq!(d.user.as_deref(), user, "{s}");
            assert_eq!(d.host, host, "{s}");
            assert_eq!(d.port, port, "{s}");
            assert_eq!(d.path, path, "{s}");
        }
        Ok(())
    }

    #[test]
    fn failures() {
        for bad in [
            "",
            "   ",
            "just-a-file",
            "user@host",
            "/some/dir/file.txt",
            ":path",
            "user@:path",
            "[::1",
            "[::1]/path",
            "[]:path",
        ] {
            assert!(parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn login_brackets_ipv6() -> Res {
        assert_eq!(parse("u@[::1]:22:x")?.login(), "u@[::1]");
        assert_eq!(parse("h:x")?.login(), "h");
        assert_eq!(parse("u@h:x")?.to_string(), "u@h:x");
        Ok(())
    }

    #[test]
    fn udp_host_port() -> Res {
        let d = UdpDestination::from_str("10.1.2.3:9000")?;
        assert_eq!(d.host, "10.1.2.3");
        assert_eq!(d.port, 9000);
        assert!(d.path.is_none());
        Ok(())
    }

    #[test]
    fn udp_host_port_path() -> Res {
        let d = UdpDestination::from_str("0.0.0.0:9000:incoming/file.bin")?;
        assert_eq!(d.port, 9000);
        assert_eq!(d.path.as_deref(), Some("incoming/file.bin"));
        let d = UdpDestination::from_str("[::]:9000:out")?;
        assert_eq!(d.host, "::");
        assert_eq!(d.path.as_deref(), Some("out"));
        let d = UdpDestination::from_str("h:9000:a:b")?;
        assert_eq!(d.path.as_deref(), Some("a:b"));
        Ok(())
    }

    #[test]
    fn udp_failures() {
        for bad in [
            "host",
            ":9000",
            "host:",
            "host:port",
            "host:-1",
            "host:70000",
            "[::1]",
            "[::1]9000",
        ] {
            assert!(UdpDestination::from_str(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn classify() {
        use DestinationKind::{Ftp, Http, Local, Remote};
        for (dest, kind) in [
            ("./out/", Local),
            ("/tmp/x", Local),
            ("relative/dir:with-colon", Local),
            ("ftp://anon@host/incoming/", Ftp),
            ("FTP://HOST/", Ftp),
            ("https://example.com/upload", Http),
            ("http3://example.com/upload", Http),
            ("backup-host:/srv/data", Remote),
            ("user@server:/home/user/", Remote),
            ("[::1]:/tmp", Remote),
        ] {
            assert_eq!(DestinationKind::classify(dest), kind, "{dest}");
        }
    }
}
