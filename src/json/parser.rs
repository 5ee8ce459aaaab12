//! Bounded recursive-descent parsing of untrusted JSON text.

use super::{Array, Json, Limits, Object};
use crate::error::{Error, Result};

pub(super) fn parse_value(limits: &Limits, text: &str) -> Result<Json> {
    let mut parser = Parser::new(limits, text)?;
    parser.skip_whitespace();
    let value = match parser.peek() {
        Some(b'{') => Json::Object(parser.object(0)?),
        Some(b'[') => Json::Array(parser.array(0)?),
        _ => return Err(Error::malformed_json("expected '{' or '['")),
    };
    parser.expect_end()?;
    Ok(value)
}

pub(super) fn parse_object(limits: &Limits, text: &str) -> Result<Object> {
    let mut parser = Parser::new(limits, text)?;
    parser.skip_whitespace();
    if parser.peek() != Some(b'{') {
        return Err(Error::malformed_json("expected '{'"));
    }
    let object = parser.object(0)?;
    parser.expect_end()?;
    Ok(object)
}

struct Parser<'a> {
    text: &'a str,
    limits: &'a Limits,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(limits: &'a Limits, text: &'a str) -> Result<Self> {
        if text.is_empty() {
            return Err(Error::malformed_json("empty JSON source"));
        }
        if text.len() > limits.json_string_size {
            return Err(Error::limit("JSON source size"));
        }
        Ok(Self { text, limits, pos: 0 })
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        self.skip_whitespace();
        if self.pos < self.text.len() {
            return Err(Error::malformed_json("trailing bytes after JSON text"));
        }
        Ok(())
    }

    fn enter(&self, depth: u32) -> Result<u32> {
        if depth + 1 > self.limits.recursion_depth {
            return Err(Error::limit("recursion depth"));
        }
        Ok(depth + 1)
    }

    fn value(&mut self, depth: u32) -> Result<Json> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'{') => Ok(Json::Object(self.object(depth)?)),
            Some(b'[') => Ok(Json::Array(self.array(depth)?)),
            Some(b'"') => Ok(Json::String(self.string()?)),
            Some(b't') => self.keyword("true").map(|_| Json::Bool(true)),
            Some(b'f') => self.keyword("false").map(|_| Json::Bool(false)),
            Some(b'n') => self.keyword("null").map(|_| Json::Null),
            Some(b'-') => self.number(),
            Some(c) if c.is_ascii_digit() => self.number(),
            _ => Err(Error::malformed_json("expected a JSON value")),
        }
    }

    fn keyword(&mut self, word: &'static str) -> Result<()> {
        if !self.text[self.pos..].starts_with(word) {
            return Err(Error::malformed_json(format!("expected keyword '{word}'")));
        }
        self.pos += word.len();
        // an alphanumeric tail like `nullx` is not a literal
        if matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric()) {
            return Err(Error::malformed_json(format!("expected keyword '{word}'")));
        }
        Ok(())
    }

    fn number(&mut self) -> Result<Json> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.advance();
        }
        match self.peek() {
            Some(b'0') => self.advance(),
            Some(c) if c.is_ascii_digit() => {
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.advance();
                }
            }
            _ => return Err(Error::malformed_json("expected digit")),
        }
        if self.peek() == Some(b'.') {
            self.advance();
            if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                return Err(Error::malformed_json("expected digit after '.'"));
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.advance();
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.advance();
            }
            if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                return Err(Error::malformed_json("expected digit in exponent"));
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }

        let numeral = &self.text[start..self.pos];
        if numeral.len() > self.limits.numeral_length {
            return Err(Error::limit("numeral length"));
        }
        match numeral.parse::<i64>() {
            Ok(value) => Ok(Json::Integer(value)),
            Err(_) => Ok(Json::Number(numeral.to_string())),
        }
    }

    fn string(&mut self) -> Result<String> {
        debug_assert_eq!(self.peek(), Some(b'"'));
        self.advance();

        let mut out = String::new();
        loop {
            let chunk_start = self.pos;
            while !matches!(self.peek(), None | Some(b'"' | b'\\')) {
                self.advance();
            }
            if out.len() + (self.pos - chunk_start) > self.limits.string_size {
                return Err(Error::limit("string size"));
            }
            out.push_str(&self.text[chunk_start..self.pos]);

            match self.peek() {
                None => return Err(Error::malformed_json("unterminated string")),
                Some(b'"') => {
                    self.advance();
                    return Ok(out);
                }
                Some(_) => {
                    self.advance(); // backslash
                    let escape = self.peek().ok_or_else(|| Error::malformed_json("unterminated string"))?;
                    self.advance();
                    match escape {
                        b'"' => out.push('"'),
                        b'\\' => out.push('\\'),
                        b'/' => out.push('/'),
                        b'b' => out.push('\u{08}'),
                        b'f' => out.push('\u{0c}'),
                        b'n' => out.push('\n'),
                        b'r' => out.push('\r'),
                        b't' => out.push('\t'),
                        b'u' => out.push(self.unicode_escape()?),
                        _ => return Err(Error::malformed_json("invalid escape character")),
                    }
                    if out.len() > self.limits.string_size {
                        return Err(Error::limit("string size"));
                    }
                }
            }
        }
    }

    /// Decode `\uXXXX`, combining a valid surrogate pair into one
    /// supplementary code point. Lone surrogates are rejected.
    fn unicode_escape(&mut self) -> Result<char> {
        let first = self.hex4()?;
        if (0xD800..0xDC00).contains(&first) {
            let bytes = self.text.as_bytes();
            if bytes.get(self.pos) == Some(&b'\\') && bytes.get(self.pos + 1) == Some(&b'u') {
                self.pos += 2;
                let second = self.hex4()?;
                if (0xDC00..0xE000).contains(&second) {
                    let combined = 0x10000 + ((first - 0xD800) << 10) + (second - 0xDC00);
                    return char::from_u32(combined)
                        .ok_or_else(|| Error::malformed_json("invalid \\u escape sequence"));
                }
            }
            return Err(Error::malformed_json("unpaired surrogate in \\u escape"));
        }
        if (0xDC00..0xE000).contains(&first) {
            return Err(Error::malformed_json("unpaired surrogate in \\u escape"));
        }
        char::from_u32(first).ok_or_else(|| Error::malformed_json("invalid \\u escape sequence"))
    }

    fn hex4(&mut self) -> Result<u32> {
        let digits = self
            .text
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| Error::malformed_json("invalid \\u escape sequence"))?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::malformed_json("invalid \\u escape sequence"));
        }
        self.pos += 4;
        Ok(u32::from_str_radix(digits, 16).expect("checked hex digits"))
    }

    fn array(&mut self, depth: u32) -> Result<Array> {
        let depth = self.enter(depth)?;
        debug_assert_eq!(self.peek(), Some(b'['));
        self.advance();

        let mut array = Array::new();
        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.advance();
            return Ok(array);
        }
        loop {
            let value = self.value(depth)?;
            array.append(value)?;
            if array.count() > self.limits.array_elem_count {
                return Err(Error::limit("array element count"));
            }
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => {
                    self.advance();
                    self.skip_whitespace();
                    if self.peek() == Some(b']') {
                        return Err(Error::malformed_json("trailing comma in array"));
                    }
                }
                Some(b']') => {
                    self.advance();
                    return Ok(array);
                }
                _ => return Err(Error::malformed_json("expected ',' or ']'")),
            }
        }
    }

    fn object(&mut self, depth: u32) -> Result<Object> {
        let depth = self.enter(depth)?;
        debug_assert_eq!(self.peek(), Some(b'{'));
        self.advance();

        let mut object = Object::new();
        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.advance();
            return Ok(object);
        }
        loop {
            self.skip_whitespace();
            if self.peek() != Some(b'"') {
                return Err(Error::malformed_json("expected member name"));
            }
            let name = self.string()?;
            self.skip_whitespace();
            if self.peek() != Some(b':') {
                return Err(Error::malformed_json("expected ':'"));
            }
            self.advance();
            let value = self.value(depth)?;
            if object.exists(&name) {
                return Err(Error::malformed_json(format!("duplicate member '{name}'")));
            }
            object.set(name, value)?;
            if object.count() > self.limits.object_mbr_count {
                return Err(Error::limit("object member count"));
            }
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => {
                    self.advance();
                    self.skip_whitespace();
                    if self.peek() == Some(b'}') {
                        return Err(Error::malformed_json("trailing comma in object"));
                    }
                }
                Some(b'}') => {
                    self.advance();
                    return Ok(object);
                }
                _ => return Err(Error::malformed_json("expected ',' or '}'")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Json, Limits, Object};
    use crate::error::ErrorKind;
    use rstest::rstest;

    #[rstest]
    #[case::empty_object("{}")]
    #[case::empty_array("[]")]
    #[case::nested(r#"{"a":[1,2,{"b":null}],"c":true}"#)]
    #[case::whitespace(" \t\n{ \"a\" : [ 1 , 2 ] } \r\n")]
    #[case::negative(r#"{"n":-17}"#)]
    #[case::exponent(r#"{"x":1e3}"#)]
    #[case::decimal(r#"{"x":0.5}"#)]
    fn parses_valid_documents(#[case] input: &str) {
        Json::parse(input).expect("parse failed");
    }

    #[rstest]
    #[case::bare_scalar("42")]
    #[case::bare_string("\"hi\"")]
    #[case::empty("")]
    #[case::whitespace_only("   ")]
    #[case::trailing_garbage("{} x")]
    #[case::trailing_brace("{}}")]
    #[case::unclosed_object(r#"{"a":1"#)]
    #[case::unclosed_array("[1,2")]
    #[case::trailing_comma_array("[1,2,]")]
    #[case::trailing_comma_object(r#"{"a":1,}"#)]
    #[case::missing_colon(r#"{"a" 1}"#)]
    #[case::unquoted_key("{a:1}")]
    #[case::bad_literal("[nul]")]
    #[case::literal_suffix("[nullx]")]
    #[case::true_suffix("[truey]")]
    #[case::leading_zero("[01]")]
    #[case::bare_minus("[-]")]
    #[case::dot_no_digit("[1.]")]
    #[case::exponent_no_digit("[1e]")]
    #[case::bad_escape(r#"["\x"]"#)]
    #[case::short_hex(r#"["\u00g1"]"#)]
    #[case::truncated_hex(r#"["\u12"]"#)]
    #[case::lone_high_surrogate(r#"["\ud800"]"#)]
    #[case::lone_low_surrogate(r#"["\udc00x"]"#)]
    #[case::unterminated_string(r#"{"a":"bc"#)]
    #[case::duplicate_member(r#"{"a":1,"a":2}"#)]
    fn rejects_invalid_documents(#[case] input: &str) {
        let err = Json::parse(input).expect_err("parse succeeded");
        assert!(
            matches!(err.kind(), ErrorKind::MalformedJson(_)),
            "unexpected kind: {:?}",
            err.kind()
        );
    }

    #[test]
    fn trailing_whitespace_is_allowed() {
        Json::parse("{} \n ").expect("parse failed");
    }

    #[test]
    fn integers_are_preserved() {
        let obj = Object::parse(r#"{"n": 12345}"#).unwrap();
        assert_eq!(obj.get("n").unwrap().to_integer().unwrap(), 12345);
        assert!(obj.to_json().contains("12345"));
    }

    #[test]
    fn decimals_keep_their_text() {
        let obj = Object::parse(r#"{"x":3.14}"#).unwrap();
        let value = obj.get("x").unwrap();
        assert_eq!(value.type_name(), "number");
        assert_eq!(value.to_number().unwrap(), "3.14");
        assert_eq!(obj.to_json(), r#"{"x":3.14}"#);
    }

    #[test]
    fn out_of_range_integers_fall_back_to_number() {
        let obj = Object::parse(r#"{"big":9223372036854775808}"#).unwrap();
        assert_eq!(obj.get("big").unwrap().to_number().unwrap(), "9223372036854775808");
        let obj = Object::parse(r#"{"min":-9223372036854775808}"#).unwrap();
        assert_eq!(obj.get("min").unwrap().to_integer().unwrap(), i64::MIN);
    }

    #[test]
    fn unicode_escapes_decode_to_utf8() {
        let obj = Object::parse(r#"{"s":"\u00e9"}"#).unwrap();
        assert_eq!(obj.get("s").unwrap().as_string().unwrap().as_bytes(), [0xc3, 0xa9]);

        // a surrogate pair combines into one supplementary code point
        let obj = Object::parse(r#"{"s":"\ud83d\ude00"}"#).unwrap();
        assert_eq!(obj.get("s").unwrap().as_string().unwrap(), "😀");

        // raw multi-byte text passes through untouched
        let obj = Object::parse(r#"{"s":"é😀"}"#).unwrap();
        assert_eq!(obj.get("s").unwrap().as_string().unwrap(), "é😀");
    }

    #[test]
    fn simple_escapes_decode() {
        let obj = Object::parse(r#"{"s":"a\"b\\c\/d\b\f\n\r\t"}"#).unwrap();
        assert_eq!(obj.get("s").unwrap().as_string().unwrap(), "a\"b\\c/d\u{8}\u{c}\n\r\t");
    }

    #[test]
    fn object_only_entry_point_requires_object() {
        let err = Object::parse("[1,2]").expect_err("parse succeeded");
        assert!(matches!(err.kind(), ErrorKind::MalformedJson(_)));
    }

    #[test]
    fn parse_slice_rejects_malformed_utf8() {
        let err = Object::parse_slice(&Limits::default(), b"{\"a\":\"\xff\"}").expect_err("parse succeeded");
        assert_eq!(err.kind(), &ErrorKind::MalformedJson("malformed UTF-8".into()));
        // a continuation byte with no start byte
        let err = Object::parse_slice(&Limits::default(), b"{\"a\":\"\x80\"}").expect_err("parse succeeded");
        assert_eq!(err.kind(), &ErrorKind::MalformedJson("malformed UTF-8".into()));
        // truncated two-byte sequence
        let err = Object::parse_slice(&Limits::default(), b"{\"a\":\"\xc3\"}").expect_err("parse succeeded");
        assert_eq!(err.kind(), &ErrorKind::MalformedJson("malformed UTF-8".into()));
    }

    #[rstest]
    #[case::source_size(Limits { json_string_size: 8, ..Limits::default() }, r#"{"a":"bc"}"#, "JSON source size")]
    #[case::depth(Limits { recursion_depth: 2, ..Limits::default() }, r#"{"a":{"b":{"c":1}}}"#, "recursion depth")]
    #[case::numeral(Limits { numeral_length: 4, ..Limits::default() }, r#"{"n":123456}"#, "numeral length")]
    #[case::string(Limits { string_size: 4, ..Limits::default() }, r#"{"s":"abcdef"}"#, "string size")]
    #[case::array_count(Limits { array_elem_count: 2, ..Limits::default() }, r#"{"a":[1,2,3]}"#, "array element count")]
    #[case::member_count(Limits { object_mbr_count: 1, ..Limits::default() }, r#"{"a":1,"b":2}"#, "object member count")]
    fn limits_halt_parsing(#[case] limits: Limits, #[case] input: &str, #[case] name: &'static str) {
        let err = Json::parse_with_limits(&limits, input).expect_err("parse succeeded");
        assert_eq!(err.kind(), &ErrorKind::LimitViolation(name), "input: {input}");
    }

    #[test]
    fn depth_limit_counts_every_container() {
        let limits = Limits { recursion_depth: 3, ..Limits::default() };
        Json::parse_with_limits(&limits, r#"{"a":[{"b":1}]}"#).expect("parse failed");
        Json::parse_with_limits(&limits, r#"{"a":[[{"b":1}]]}"#).expect_err("parse succeeded");
    }

    #[test]
    fn escaped_member_names_are_decoded() {
        let obj = Object::parse(r#"{"a\n":1}"#).unwrap();
        assert!(obj.exists("a\n"));
    }

    // Cross-check the hand parser against an independent implementation on
    // documents within limits.
    #[rstest]
    #[case(r#"{"a":1,"b":[true,false,null],"c":{"d":"e\nf","g":1.25e-3}}"#)]
    #[case(r#"[{"deep":[[[["x"]]]]},-42,"é😀"]"#)]
    #[case(r#"{"né":"väl","empty":{},"list":[]}"#)]
    fn matches_reference_parser(#[case] input: &str) {
        let ours = Json::parse(input).expect("parse failed");
        let reference: serde_json::Value = serde_json::from_str(input).expect("reference parse failed");
        let reparsed: serde_json::Value =
            serde_json::from_str(&ours.to_json()).expect("re-serialization was invalid");
        assert_eq!(reparsed, reference);
    }
}
