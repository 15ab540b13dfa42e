//! Peer references and resolved peer handles.

/// How the configuration names the remote peer: a numeric transport id or a
/// symbolic name (with or without a leading `@`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerRef {
    Id(i64),
    Name(String),
}

impl PeerRef {
    /// Parse a configured peer reference. Anything that is not a bare
    /// integer is treated as a name.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<i64>() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Name(trimmed.trim_start_matches('@').to_string()),
        }
    }
}

impl std::fmt::Display for PeerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// A peer handle resolved by the transport, valid for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub id: i64,
    pub title: Option<String>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_reference() {
        assert_eq!(PeerRef::parse(" -100123 "), PeerRef::Id(-100_123));
    }

    #[test]
    fn symbolic_reference_strips_at() {
        assert_eq!(PeerRef::parse("@agent_bot"), PeerRef::Name("agent_bot".into()));
        assert_eq!(PeerRef::parse("agent_bot"), PeerRef::Name("agent_bot".into()));
    }
}
