//! Element content spec grammar: `EMPTY`, `ANY`, mixed content
//! (`(#PCDATA|a|b)*`), and element content (`(a,b,(c|d)+)?`).
//!
//! Mirrors the scanner style of `xrs_parser::tokenizer`: a cursor over a
//! byte slice, recursive-descent methods that advance it and return a
//! `DtdResult`, rather than a combinator-parser pipeline.

use std::marker::PhantomData;

use xrs_chars::CharEdition;

use crate::error::{DtdError, DtdErrorKind};
use crate::model::{ContentModel, ContentParticle, Occurrence};

type Res<T> = Result<T, DtdError>;

pub fn parse_content_spec<E: CharEdition>(raw: &str, base_offset: usize) -> Res<ContentModel> {
    let trimmed = raw.trim();
    if trimmed == "EMPTY" {
        return Ok(ContentModel::Empty);
    }
    if trimmed == "ANY" {
        return Ok(ContentModel::Any);
    }
    let mut p = Parser::<E>::new(trimmed, base_offset + leading_ws(raw));
    p.parse_top()
}

fn leading_ws(s: &str) -> usize {
    s.len() - s.trim_start().len()
}

struct Parser<'a, E: CharEdition> {
    s: &'a str,
    bytes: &'a [u8],
    pos: usize,
    base_offset: usize,
    _edition: PhantomData<E>,
}

impl<'a, E: CharEdition> Parser<'a, E> {
    fn new(s: &'a str, base_offset: usize) -> Self {
        Self {
            s,
            bytes: s.as_bytes(),
            pos: 0,
            base_offset,
            _edition: PhantomData,
        }
    }

    fn err(&self, kind: DtdErrorKind, at: usize) -> DtdError {
        DtdError::new(kind, self.base_offset + at)
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn read_name(&mut self) -> Res<&'a str> {
        let start = self.pos;
        let rest = &self.s[start..];
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, c)) if E::is_name_start_char(c) => {}
            _ => return Err(self.err(DtdErrorKind::Expected("element-type name"), start)),
        }
        let mut end = rest.len();
        for (i, c) in chars {
            if !E::is_name_char(c) {
                end = i;
                break;
            }
        }
        self.pos = start + end;
        Ok(&rest[..end])
    }

    fn read_occurrence(&mut self) -> Res<Occurrence> {
        match self.peek() {
            Some(b'?') => {
                self.pos += 1;
                Ok(Occurrence::Optional)
            }
            Some(b'*') => {
                self.pos += 1;
                Ok(Occurrence::ZeroOrMore)
            }
            Some(b'+') => {
                self.pos += 1;
                Ok(Occurrence::OneOrMore)
            }
            _ => Ok(Occurrence::One),
        }
    }

    fn reject_stacked_indicator(&self) -> Res<()> {
        if matches!(self.peek(), Some(b'?' | b'*' | b'+')) {
            return Err(self.err(DtdErrorKind::Malformed("stacked occurrence indicator"), self.pos));
        }
        Ok(())
    }

    fn parse_top(&mut self) -> Res<ContentModel> {
        if self.peek() != Some(b'(') {
            return Err(self.err(DtdErrorKind::Expected("'('"), self.pos));
        }
        let group_start = self.pos;
        self.pos += 1;
        self.skip_ws();
        if self.s[self.pos..].starts_with("#PCDATA") {
            let names = self.parse_mixed_tail()?;
            return Ok(ContentModel::Mixed(names));
        }
        let particle = self.parse_cp_body(group_start)?;
        self.skip_ws();
        if self.pos != self.bytes.len() {
            return Err(self.err(DtdErrorKind::Malformed("trailing content after content spec"), self.pos));
        }
        Ok(ContentModel::Children(particle))
    }

    /// After the opening `(` and leading whitespace was consumed and
    /// `#PCDATA` confirmed present: parse the `| name` tail up to `)` or
    /// `)*`, rejecting nested groups, `#PCDATA` reappearing, or a `|` list
    /// that does not end in `)*` (when non-empty).
    fn parse_mixed_tail(&mut self) -> Res<Vec<String>> {
        self.pos += "#PCDATA".len();
        let mut names = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b')') => {
                    self.pos += 1;
                    if names.is_empty() {
                        // `(#PCDATA)` - an optional trailing `*` is
                        // permitted but not required.
                        if self.peek() == Some(b'*') {
                            self.pos += 1;
                        }
                        return Ok(names);
                    }
                    if self.peek() != Some(b'*') {
                        return Err(self.err(
                            DtdErrorKind::Malformed("mixed content with element names must end in ')*'"),
                            self.pos,
                        ));
                    }
                    self.pos += 1;
                    return Ok(names);
                }
                Some(b'|') => {
                    self.pos += 1;
                    self.skip_ws();
                    if self.s[self.pos..].starts_with("#PCDATA") {
                        return Err(self.err(DtdErrorKind::Malformed("#PCDATA must be first in mixed content"), self.pos));
                    }
                    if self.peek() == Some(b'(') {
                        return Err(self.err(DtdErrorKind::Malformed("nested group in mixed content"), self.pos));
                    }
                    let name = self.read_name()?;
                    names.push(name.to_string());
                }
                _ => return Err(self.err(DtdErrorKind::Expected("'|' or ')'"), self.pos)),
            }
        }
    }

    /// Parses the body of a group that is known not to be mixed content:
    /// a comma- or bar-separated list of content particles, rejecting
    /// groups that mix `,` and `|` at the same nesting level.
    fn parse_cp_body(&mut self, group_start: usize) -> Res<ContentParticle> {
        self.skip_ws();
        if self.peek() == Some(b')') {
            return Err(self.err(DtdErrorKind::Malformed("empty group"), group_start));
        }
        let mut items = vec![self.parse_cp()?];
        let mut sep: Option<u8> = None;
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b')') => {
                    self.pos += 1;
                    let occurrence = self.read_occurrence()?;
                    self.reject_stacked_indicator()?;
                    return Ok(match sep {
                        None | Some(b',') => ContentParticle::Seq(items, occurrence),
                        Some(b'|') => ContentParticle::Choice(items, occurrence),
                        Some(_) => unreachable!(),
                    });
                }
                Some(b @ (b',' | b'|')) => {
                    if let Some(prev) = sep {
                        if prev != b {
                            return Err(self.err(DtdErrorKind::Malformed("mixed ',' and '|' in one group"), self.pos));
                        }
                    }
                    sep = Some(b);
                    self.pos += 1;
                    self.skip_ws();
                    items.push(self.parse_cp()?);
                }
                Some(b'&') => {
                    return Err(self.err(DtdErrorKind::Malformed("'&' connector is not supported in XML content models"), self.pos));
                }
                _ => return Err(self.err(DtdErrorKind::Expected("',', '|', or ')'"), self.pos)),
            }
        }
    }

    fn parse_cp(&mut self) -> Res<ContentParticle> {
        let start = self.pos;
        if self.peek() == Some(b'(') {
            self.pos += 1;
            self.skip_ws();
            if self.s[self.pos..].starts_with("#PCDATA") {
                return Err(self.err(DtdErrorKind::Malformed("#PCDATA only allowed in the outermost group"), start));
            }
            return self.parse_cp_body(start);
        }
        let name = self.read_name()?;
        let occurrence = self.read_occurrence()?;
        self.reject_stacked_indicator()?;
        Ok(ContentParticle::Name(name.to_string(), occurrence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xrs_chars::Edition5;

    fn parse(s: &str) -> Res<ContentModel> {
        parse_content_spec::<Edition5>(s, 0)
    }

    #[test]
    fn empty_and_any() {
        assert_eq!(parse("EMPTY").unwrap(), ContentModel::Empty);
        assert_eq!(parse("ANY").unwrap(), ContentModel::Any);
    }

    #[test]
    fn pure_pcdata() {
        assert_eq!(parse("(#PCDATA)").unwrap(), ContentModel::Mixed(vec![]));
    }

    #[test]
    fn mixed_with_elements() {
        match parse("(#PCDATA | a | b)*").unwrap() {
            ContentModel::Mixed(names) => assert_eq!(names, vec!["a", "b"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn mixed_without_trailing_star_is_rejected() {
        assert!(parse("(#PCDATA | a)").is_err());
    }

    #[test]
    fn sequence_of_names() {
        match parse("(a,b,c)").unwrap() {
            ContentModel::Children(ContentParticle::Seq(items, Occurrence::One)) => {
                assert_eq!(items.len(), 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn choice_of_names() {
        match parse("(a|b|c)").unwrap() {
            ContentModel::Children(ContentParticle::Choice(items, Occurrence::One)) => {
                assert_eq!(items.len(), 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nested_group_with_occurrence() {
        match parse("(a,(b|c)+,d?)").unwrap() {
            ContentModel::Children(ContentParticle::Seq(items, Occurrence::One)) => {
                assert_eq!(items.len(), 3);
                assert!(matches!(&items[1], ContentParticle::Choice(_, Occurrence::OneOrMore)));
                assert!(matches!(&items[2], ContentParticle::Name(n, Occurrence::Optional) if n == "d"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn mixing_comma_and_bar_at_one_level_is_rejected() {
        assert!(parse("(a,b|c)").is_err());
    }

    #[test]
    fn nested_pcdata_is_rejected() {
        assert!(parse("(a,(#PCDATA))").is_err());
    }

    #[test]
    fn stacked_indicators_are_rejected() {
        assert!(parse("(a)?*").is_err());
    }

    #[test]
    fn empty_group_is_rejected() {
        assert!(parse("()").is_err());
    }

    #[test]
    fn unbalanced_parens_are_rejected() {
        assert!(parse("(a,b").is_err());
        assert!(parse("(a,b))").is_err());
    }

    #[test]
    fn ampersand_connector_is_rejected() {
        assert!(parse("(a & b)").is_err());
    }
}
