use thiserror::Error;

/// Failure taxonomy shared by every stage of a turn.
///
/// Which variants are fatal depends on the call site: text search propagates
/// upstream and transport failures, nearby search and web search absorb them,
/// and enrichment never lets one escape.
#[derive(Debug, Error)]
pub enum TravelError {
    /// A credential required by the selected tier is not configured.
    #[error("missing required credential {credential}")]
    Configuration { credential: &'static str },

    /// The remote service answered with a non-success status.
    #[error("{service} returned an error ({code}): {detail}")]
    Upstream {
        service: &'static str,
        code: &'static str,
        status: Option<u16>,
        detail: String,
    },

    /// Timeout or connection failure before a response arrived.
    #[error("{service} transport failure ({code}): {detail}")]
    Transport {
        service: &'static str,
        code: &'static str,
        timed_out: bool,
        detail: String,
    },

    #[error("could not parse {context}: {detail}")]
    Parse { context: String, detail: String },

    #[error("distance enrichment failed: {0}")]
    Enrichment(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl TravelError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "MISSING_API_KEY",
            Self::Upstream { code, .. } | Self::Transport { code, .. } => code,
            Self::Parse { .. } => "PARSE_ERROR",
            Self::Enrichment(_) => "ENRICHMENT_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
        }
    }

    pub fn parse(context: impl Into<String>, detail: impl ToString) -> Self {
        Self::Parse {
            context: context.into(),
            detail: detail.to_string(),
        }
    }
}
