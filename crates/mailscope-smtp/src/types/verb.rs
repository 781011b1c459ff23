//! SMTP command verbs.

/// SMTP command verb, matched case-insensitively.
///
/// Verbs outside the RFC 5321 core set are preserved as [`Verb::Other`]
/// rather than rejected, so the filter stays useful against protocol
/// extensions it does not recognize.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Verb {
    /// HELO - basic greeting
    Helo,
    /// EHLO - extended greeting
    Ehlo,
    /// MAIL - start mail transaction
    Mail,
    /// RCPT - add recipient
    Rcpt,
    /// DATA - begin message data
    Data,
    /// RSET - reset transaction
    Rset,
    /// VRFY - verify address
    Vrfy,
    /// EXPN - expand mailing list
    Expn,
    /// HELP - help text
    Help,
    /// NOOP - no operation
    Noop,
    /// QUIT - close connection
    Quit,
    /// STARTTLS - upgrade to TLS
    StartTls,
    /// Any verb outside the recognized set (stored uppercased).
    Other(String),
}

impl Verb {
    /// Matches a verb token case-insensitively.
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        let upper = token.to_ascii_uppercase();
        match upper.as_str() {
            "HELO" => Self::Helo,
            "EHLO" => Self::Ehlo,
            "MAIL" => Self::Mail,
            "RCPT" => Self::Rcpt,
            "DATA" => Self::Data,
            "RSET" => Self::Rset,
            "VRFY" => Self::Vrfy,
            "EXPN" => Self::Expn,
            "HELP" => Self::Help,
            "NOOP" => Self::Noop,
            "QUIT" => Self::Quit,
            "STARTTLS" => Self::StartTls,
            _ => Self::Other(upper),
        }
    }

    /// Verb keyword as it appears in counter names.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Helo => "HELO",
            Self::Ehlo => "EHLO",
            Self::Mail => "MAIL",
            Self::Rcpt => "RCPT",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Vrfy => "VRFY",
            Self::Expn => "EXPN",
            Self::Help => "HELP",
            Self::Noop => "NOOP",
            Self::Quit => "QUIT",
            Self::StartTls => "STARTTLS",
            Self::Other(verb) => verb,
        }
    }

    /// Returns `true` if this verb is outside the recognized set.
    #[must_use]
    pub const fn is_other(&self) -> bool {
        matches!(self, Self::Other(_))
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
