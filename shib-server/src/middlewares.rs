use http::Request;
use tower_http::trace::MakeSpan;
use tracing::{Level, Span};

pub(crate) const TRACE_ID_HEADER: &str = "X-Trace-Id";

/// Request span carrying the trace id. Headers are never recorded, the SP
/// passes subject attributes through them.
#[derive(Clone, Copy, Debug)]
pub struct MakeSpanWithTrace {
    level: Level,
}

impl MakeSpanWithTrace {
    pub fn new() -> Self {
        Self {
            level: Level::DEBUG,
        }
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

impl Default for MakeSpanWithTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> MakeSpan<B> for MakeSpanWithTrace {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let trace_id = match request.headers().get(TRACE_ID_HEADER) {
            Some(v) => v.to_str().unwrap_or_default(),
            None => "",
        };
        // `tracing::span!` needs a static level
        macro_rules! make_span {
            ($level:expr) => {
                tracing::span!(
                    $level,
                    "request",
                    trace_id = %trace_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            };
        }

        match self.level {
            Level::ERROR => make_span!(Level::ERROR),
            Level::WARN => make_span!(Level::WARN),
            Level::INFO => make_span!(Level::INFO),
            Level::DEBUG => make_span!(Level::DEBUG),
            Level::TRACE => make_span!(Level::TRACE),
        }
    }
}
