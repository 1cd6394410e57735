/// DTD-level errors. Unlike the tokenizer's `ErrorKind` (embedded in the
/// event stream), these propagate as a `Result` to the caller of the DTD
/// parser / PE processor / external resolver, per the specified
/// propagation policy: DTD-level failures are a result, not an event.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DtdErrorKind {
    #[error("parameter entity reference crosses a declaration boundary")]
    PeBoundaryViolation,
    #[error("parameter entity reference inside a declaration in the internal subset")]
    PeInDeclInternal,
    #[error("conditional section in the internal subset")]
    ConditionalInInternal,
    #[error("entity value contains a bare '&'")]
    EntityValueBareAmp,
    #[error("entity value contains a bare '%'")]
    EntityValueBarePercent,
    #[error("entity replacement text is not well-formed content")]
    EntityValueNotWellFormed,
    #[error("entity replacement text contains a reserved 'xml' processing instruction")]
    EntityValueReservedPi,
    #[error("invalid character in public identifier")]
    PubidInvalidChar,
    #[error("invalid name")]
    NameInvalid,
    #[error("invalid character reference")]
    InvalidCharRef,
    #[error("parameter entity expansion did not terminate (possible cycle)")]
    PeExpansionCycle,
    #[error("unexpected end of declaration")]
    UnexpectedEof,
    #[error("expected {0}")]
    Expected(&'static str),
    #[error("unknown grammar production: {0}")]
    Malformed(&'static str),
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at byte offset {offset}")]
pub struct DtdError {
    pub kind: DtdErrorKind,
    pub offset: usize,
}

impl DtdError {
    pub fn new(kind: DtdErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

pub type DtdResult<T> = Result<T, DtdError>;
