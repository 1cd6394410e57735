use std::borrow::Cow;

use crate::loc::Loc;

/// A single attribute in source order. Duplicate names are preserved (and
/// flagged separately via `ErrorKind::AttrUnique`) rather than rejected.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute<'a> {
    pub name: Cow<'a, str>,
    pub value: Cow<'a, str>,
}

impl<'a> Attribute<'a> {
    pub fn new(name: impl Into<Cow<'a, str>>, value: impl Into<Cow<'a, str>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn into_owned(self) -> Attribute<'static> {
        Attribute {
            name: Cow::Owned(self.name.into_owned()),
            value: Cow::Owned(self.value.into_owned()),
        }
    }
}

/// The structural event vocabulary produced by the tokenizer and, once a
/// `Dtd` event has been handed to the DTD subsystem, refined in place by
/// the entity resolver.
#[derive(Clone, Debug, PartialEq)]
pub enum Event<'a> {
    StartDocument,
    EndDocument,
    StartElement {
        name: Cow<'a, str>,
        attrs: Vec<Attribute<'a>>,
        loc: Loc,
    },
    EndElement {
        name: Cow<'a, str>,
        loc: Loc,
    },
    /// Non-whitespace-only text content.
    Characters {
        text: Cow<'a, str>,
        loc: Loc,
    },
    /// Whitespace-only content between elements. A fast tokenizer variant
    /// may coalesce this into `Characters` or drop it; see
    /// `TokenizerOptions::emit_space`.
    Space {
        text: Cow<'a, str>,
        loc: Loc,
    },
    /// Contents between `<!--` and `-->`, exclusive.
    Comment {
        text: Cow<'a, str>,
        loc: Loc,
    },
    /// Contents between `<![CDATA[` and `]]>`, exclusive.
    CData {
        text: Cow<'a, str>,
        loc: Loc,
    },
    /// The entire DOCTYPE content between `<!DOCTYPE` and the matching
    /// outer `>`, not including either delimiter.
    Dtd {
        content: Cow<'a, str>,
        loc: Loc,
    },
    /// The XML declaration, recognized only at absolute offset 0.
    Prolog {
        pseudo_attrs: Vec<Attribute<'a>>,
        loc: Loc,
    },
    ProcessingInstruction {
        target: Cow<'a, str>,
        content: Option<Cow<'a, str>>,
        loc: Loc,
    },
    /// A non-fatal diagnostic, recoverable where possible. See
    /// [`ErrorKind`] for the stable taxonomy.
    Error {
        kind: ErrorKind,
        detail: Option<String>,
        loc: Loc,
    },
}

impl<'a> Event<'a> {
    pub fn error(kind: ErrorKind, loc: Loc) -> Self {
        Event::Error {
            kind,
            detail: None,
            loc,
        }
    }

    pub fn error_with(kind: ErrorKind, detail: impl Into<String>, loc: Loc) -> Self {
        Event::Error {
            kind,
            detail: Some(detail.into()),
            loc,
        }
    }

    pub fn loc(&self) -> Option<Loc> {
        match self {
            Event::StartDocument | Event::EndDocument => None,
            Event::StartElement { loc, .. }
            | Event::EndElement { loc, .. }
            | Event::Characters { loc, .. }
            | Event::Space { loc, .. }
            | Event::Comment { loc, .. }
            | Event::CData { loc, .. }
            | Event::Dtd { loc, .. }
            | Event::Prolog { loc, .. }
            | Event::ProcessingInstruction { loc, .. }
            | Event::Error { loc, .. } => Some(*loc),
        }
    }

    /// Detach this event from the buffer it borrows from. Used by the
    /// chunk bridge when a construct was reassembled from a synthetic
    /// mini-block buffer that does not outlive the current step.
    pub fn into_owned(self) -> Event<'static> {
        match self {
            Event::StartDocument => Event::StartDocument,
            Event::EndDocument => Event::EndDocument,
            Event::StartElement { name, attrs, loc } => Event::StartElement {
                name: Cow::Owned(name.into_owned()),
                attrs: attrs.into_iter().map(Attribute::into_owned).collect(),
                loc,
            },
            Event::EndElement { name, loc } => Event::EndElement {
                name: Cow::Owned(name.into_owned()),
                loc,
            },
            Event::Characters { text, loc } => Event::Characters {
                text: Cow::Owned(text.into_owned()),
                loc,
            },
            Event::Space { text, loc } => Event::Space {
                text: Cow::Owned(text.into_owned()),
                loc,
            },
            Event::Comment { text, loc } => Event::Comment {
                text: Cow::Owned(text.into_owned()),
                loc,
            },
            Event::CData { text, loc } => Event::CData {
                text: Cow::Owned(text.into_owned()),
                loc,
            },
            Event::Dtd { content, loc } => Event::Dtd {
                content: Cow::Owned(content.into_owned()),
                loc,
            },
            Event::Prolog { pseudo_attrs, loc } => Event::Prolog {
                pseudo_attrs: pseudo_attrs.into_iter().map(Attribute::into_owned).collect(),
                loc,
            },
            Event::ProcessingInstruction {
                target,
                content,
                loc,
            } => Event::ProcessingInstruction {
                target: Cow::Owned(target.into_owned()),
                content: content.map(|c| Cow::Owned(c.into_owned())),
                loc,
            },
            Event::Error { kind, detail, loc } => Event::Error { kind, detail, loc },
        }
    }
}

/// Stable identifiers consumers may match on. New kinds may be added
/// across minor versions.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    // Lexical
    #[error("invalid element")]
    InvalidElement,
    #[error("invalid close tag")]
    InvalidCloseTag,
    #[error("invalid processing instruction target")]
    InvalidPiTarget,
    #[error("expected '>'")]
    ExpectedGt,
    #[error("expected '>' or an attribute")]
    ExpectedGtOrAttr,
    #[error("expected '='")]
    ExpectedEq,
    #[error("expected a quote character")]
    ExpectedQuote,
    #[error("expected '?>' or an attribute")]
    ExpectedPiEndOrAttr,
    #[error("missing whitespace before attribute")]
    MissingWhitespaceBeforeAttr,

    // Constraint (well-formedness)
    #[error("duplicate attribute")]
    AttrUnique,
    #[error("'<' is not allowed in an attribute value")]
    AttrLt,
    #[error("']]>' is not allowed outside of a CDATA section")]
    TextCdataEnd,
    #[error("malformed comment")]
    Comment,
    #[error("reserved PI target matching [Xx][Mm][Ll]")]
    ReservedPiTarget,
    #[error("XML declaration is only allowed at the start of the document")]
    MisplacedXmlDecl,
    #[error("malformed XML declaration")]
    MalformedXmlDecl,

    // Encoding
    #[error("character outside the XML Char production")]
    InvalidChar,
    #[error("invalid UTF-8 byte sequence")]
    InvalidUtf8,
    #[error("UTF-16 byte order mark detected; this layer only accepts UTF-8")]
    Utf16,

    /// Input ended with an unterminated construct (e.g. an unclosed tag or
    /// comment) with no further chunks to resume from. Not part of the
    /// grammar-level taxonomy in the specification; raised only by the
    /// chunk bridge's final `finish()` pass.
    #[error("unexpected end of input")]
    UnexpectedEof,

    // Resolution (raised downstream, by `xrs-dtd`'s entity resolver, as it
    // rewrites `Characters`/attribute text in place; grouped into the same
    // taxonomy as the tokenizer's own errors per the specified event
    // vocabulary, which does not distinguish the producing component).
    #[error("general entity reference nesting exceeded the configured depth limit")]
    ExpansionDepthExceeded,
    #[error("cumulative entity expansion exceeded the configured size limit")]
    ExpansionSizeExceeded,
    #[error("unknown general entity reference")]
    UnknownEntity,
}
