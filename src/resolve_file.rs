//! Reader and writer for the `resolver(5)` file format.
//!
//! ```text
//! # Generated by telepresence (pid=12345)
//! port 53535
//! domain cluster.local
//! nameserver 127.0.0.1
//! search svc.cluster.local cluster.local
//! ```

use crate::error::{ParseProblem, ResolverError, Result};
use std::fmt::Write as _;
use std::net::{IpAddr, SocketAddr};

/// Parsed form of one resolver file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveFile {
    /// UDP port the nameservers listen on.
    pub port: u16,
    /// Domain this file applies to. `Some("")` is written like `None` and
    /// reads back as `None`.
    pub domain: Option<String>,
    /// Nameservers, in query order.
    pub nameservers: Vec<IpAddr>,
    /// Search domains, in lookup order.
    pub search: Vec<String>,
}

impl ResolveFile {
    /// Creates a record pointing `domain` at a single nameserver. An empty
    /// `domain` is stored as `None`.
    #[must_use]
    pub fn for_nameserver(addr: SocketAddr, domain: impl Into<String>) -> Self {
        let domain: String = domain.into();
        Self {
            port: addr.port(),
            domain: (!domain.is_empty()).then_some(domain),
            nameservers: vec![addr.ip()],
            search: Vec::new(),
        }
    }

    /// Sets the search list.
    #[must_use]
    pub fn with_search<I, S>(mut self, search: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search = search.into_iter().map(Into::into).collect();
        self
    }

    /// Parses resolver file `content`. `file` is used in error messages only.
    ///
    /// Blank lines and `#` comments are skipped. The first bad line aborts
    /// the parse.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Parse`] naming `file` and the 1-based line.
    pub fn parse(file: &str, content: &str) -> Result<Self> {
        let err = |line: usize, problem: ParseProblem| ResolverError::Parse {
            file: file.to_string(),
            line,
            problem,
        };

        let mut port = None;
        let mut domain = None;
        let mut nameservers = Vec::new();
        let mut search = Vec::new();
        let mut last_line = 0;

        for (idx, raw) in content.lines().enumerate() {
            let line = idx + 1;
            last_line = line;
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            let mut fields = text.split_whitespace();
            let Some(key) = fields.next() else {
                continue;
            };
            let values: Vec<&str> = fields.collect();
            if values.is_empty() {
                return Err(err(line, ParseProblem::MissingValue(key.to_string())));
            }

            let single = || {
                if values.len() == 1 {
                    Ok(values[0])
                } else {
                    Err(err(line, ParseProblem::TooManyValues(key.to_string())))
                }
            };

            match key {
                "port" => {
                    let value = single()?;
                    port = Some(value.parse::<u16>().map_err(|_| {
                        err(line, ParseProblem::InvalidInteger(key.to_string()))
                    })?);
                }
                "domain" => domain = Some(single()?.to_string()),
                "nameserver" => {
                    let value = single()?;
                    let ip = value.parse::<IpAddr>().map_err(|_| {
                        err(
                            line,
                            ParseProblem::InvalidIp {
                                key: key.to_string(),
                                value: value.to_string(),
                            },
                        )
                    })?;
                    nameservers.push(ip);
                }
                "search" => search = values.iter().map(ToString::to_string).collect(),
                _ => return Err(err(line, ParseProblem::UnknownKey(key.to_string()))),
            }
        }

        let Some(port) = port else {
            return Err(err(last_line.max(1), ParseProblem::MissingPort));
        };
        Ok(Self {
            port,
            domain,
            nameservers,
            search,
        })
    }

    /// Renders the file, starting with a `# Generated by <generator>` line.
    #[must_use]
    pub fn serialize(&self, generator: &str) -> String {
        let mut out = format!("# Generated by {generator}\n");
        let _ = writeln!(out, "port {}", self.port);
        if let Some(domain) = self.domain.as_deref().filter(|d| !d.is_empty()) {
            let _ = writeln!(out, "domain {domain}");
        }
        for ns in &self.nameservers {
            let _ = writeln!(out, "nameserver {ns}");
        }
        if !self.search.is_empty() {
            let _ = writeln!(out, "search {}", self.search.join(" "));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResolveFile {
        ResolveFile {
            port: 53535,
            domain: Some("cluster.local".into()),
            nameservers: vec!["127.0.0.1".parse().unwrap(), "::1".parse().unwrap()],
            search: vec!["svc.cluster.local".into(), "cluster.local".into()],
        }
    }

    #[test]
    fn serialize_layout() {
        let content = sample().serialize("telepresence");
        assert_eq!(
            content,
            "# Generated by telepresence\n\
             port 53535\n\
             domain cluster.local\n\
             nameserver 127.0.0.1\n\
             nameserver ::1\n\
             search svc.cluster.local cluster.local\n"
        );
    }

    #[test]
    fn serialize_omits_empty_domain_and_search() {
        let rf = ResolveFile {
            port: 53,
            domain: None,
            nameservers: vec!["10.0.0.1".parse().unwrap()],
            search: Vec::new(),
        };
        assert_eq!(
            rf.serialize("x"),
            "# Generated by x\nport 53\nnameserver 10.0.0.1\n"
        );
    }

    #[test]
    fn parse_reproduces_serialized_record() {
        let rf = sample();
        let parsed = ResolveFile::parse("f", &rf.serialize("telepresence (pid=1)")).unwrap();
        assert_eq!(parsed, rf);
    }

    #[test]
    fn parse_skips_comments_and_blank_lines() {
        let rf = ResolveFile::parse(
            "f",
            "\n   # comment\nport 53\n\n  nameserver 1.1.1.1  \nsearch a.b\n",
        )
        .unwrap();
        assert_eq!(rf.port, 53);
        assert_eq!(rf.nameservers, vec!["1.1.1.1".parse::<IpAddr>().unwrap()]);
        assert_eq!(rf.search, vec!["a.b"]);
        assert_eq!(rf.domain, None);
    }

    #[test]
    fn later_search_line_replaces_earlier() {
        let rf = ResolveFile::parse("f", "port 1\nsearch a.b c.d\nsearch e.f\n").unwrap();
        assert_eq!(rf.search, vec!["e.f"]);
    }

    #[test]
    fn unknown_key_names_file_and_line() {
        let e = ResolveFile::parse("/etc/resolver/x", "port 53\nfoo bar\n").unwrap_err();
        assert_eq!(
            e.to_string(),
            "/etc/resolver/x line 2: \"foo\" is not a recognized key"
        );
    }

    #[test]
    fn key_without_value_is_rejected() {
        let e = ResolveFile::parse("/etc/resolver/x", "port\n").unwrap_err();
        assert!(matches!(
            e,
            ResolverError::Parse { ref file, line: 1, problem: ParseProblem::MissingValue(ref k) }
                if file == "/etc/resolver/x" && k == "port"
        ));
    }

    #[test]
    fn bad_values_are_rejected() {
        let e = ResolveFile::parse("f", "port abc\n").unwrap_err();
        assert!(e.to_string().contains("is not a valid integer"));

        let e = ResolveFile::parse("f", "port 53\nnameserver not-an-ip\n").unwrap_err();
        assert!(matches!(
            e,
            ResolverError::Parse { line: 2, problem: ParseProblem::InvalidIp { .. }, .. }
        ));

        let e = ResolveFile::parse("f", "port 53 54\n").unwrap_err();
        assert!(matches!(
            e,
            ResolverError::Parse { problem: ParseProblem::TooManyValues(_), .. }
        ));
    }

    #[test]
    fn empty_file_reports_line_one() {
        let e = ResolveFile::parse("f", "").unwrap_err();
        assert_eq!(e.to_string(), "f line 1: \"port\" is required");
    }

    #[test]
    fn empty_domain_is_none() {
        let rf = ResolveFile::for_nameserver("127.0.0.1:53".parse().unwrap(), "");
        assert_eq!(rf.domain, None);
        assert_eq!(ResolveFile::parse("f", &rf.serialize("x")).unwrap(), rf);
    }

    #[test]
    fn missing_port_is_rejected() {
        let e = ResolveFile::parse("f", "# only a comment\ndomain a.b\n").unwrap_err();
        assert!(matches!(
            e,
            ResolverError::Parse { line: 2, problem: ParseProblem::MissingPort, .. }
        ));
    }
}
