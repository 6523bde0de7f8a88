//! Minimal XML-RPC codec for talking to a Jdbc2Ei server.
//!
//! Only the subset Jdbc2Ei uses is supported: scalar values, arrays, structs
//! and faults.

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlRpcError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Unexpected XML-RPC content: {0}")]
    Unexpected(String),
}

/// An XML-RPC value.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlRpcValue {
    Int(i64),
    Double(f64),
    Bool(bool),
    Str(String),
    /// Raw `dateTime.iso8601` text, e.g. `20110101T00:00:00`.
    DateTime(String),
    Nil,
    Array(Vec<XmlRpcValue>),
    Struct(Vec<(String, XmlRpcValue)>),
}

impl XmlRpcValue {
    pub fn str(s: impl Into<String>) -> Self {
        XmlRpcValue::Str(s.into())
    }

    fn member(&self, name: &str) -> Option<&XmlRpcValue> {
        match self {
            XmlRpcValue::Struct(members) => members
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    fn write(&self, out: &mut String) {
        out.push_str("<value>");
        match self {
            XmlRpcValue::Int(i) => out.push_str(&format!("<int>{}</int>", i)),
            XmlRpcValue::Double(d) => out.push_str(&format!("<double>{}</double>", d)),
            XmlRpcValue::Bool(b) => {
                out.push_str(&format!("<boolean>{}</boolean>", if *b { 1 } else { 0 }))
            }
            XmlRpcValue::Str(s) => {
                out.push_str("<string>");
                out.push_str(&escape(s.as_str()));
                out.push_str("</string>");
            }
            XmlRpcValue::DateTime(s) => {
                out.push_str(&format!("<dateTime.iso8601>{}</dateTime.iso8601>", escape(s.as_str())))
            }
            XmlRpcValue::Nil => out.push_str("<nil/>"),
            XmlRpcValue::Array(items) => {
                out.push_str("<array><data>");
                for item in items {
                    item.write(out);
                }
                out.push_str("</data></array>");
            }
            XmlRpcValue::Struct(members) => {
                out.push_str("<struct>");
                for (name, value) in members {
                    out.push_str("<member><name>");
                    out.push_str(&escape(name.as_str()));
                    out.push_str("</name>");
                    value.write(out);
                    out.push_str("</member>");
                }
                out.push_str("</struct>");
            }
        }
        out.push_str("</value>");
    }
}

/// Decoded `methodResponse`.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    Value(XmlRpcValue),
    Fault { code: i64, message: String },
}

/// Encode a `methodCall` document.
pub fn encode_call(method: &str, params: &[XmlRpcValue]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?><methodCall><methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        param.write(&mut out);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

/// Decode a `methodResponse` document.
pub fn parse_response(xml: &str) -> Result<MethodResponse, XmlRpcError> {
    let mut parser = Parser::new(xml);

    parser.skip_to_start("methodResponse")?;
    match parser.next_token()? {
        Token::Start(tag) if tag == "params" => {
            parser.expect_start("param")?;
            parser.expect_start("value")?;
            let value = parser.parse_value()?;
            parser.expect_end("param")?;
            parser.expect_end("params")?;
            Ok(MethodResponse::Value(value))
        }
        Token::Start(tag) if tag == "fault" => {
            parser.expect_start("value")?;
            let fault = parser.parse_value()?;
            parser.expect_end("fault")?;

            let code = match fault.member("faultCode") {
                Some(XmlRpcValue::Int(code)) => *code,
                _ => 0,
            };
            let message = match fault.member("faultString") {
                Some(XmlRpcValue::Str(s)) => s.clone(),
                _ => "unknown fault".to_string(),
            };
            Ok(MethodResponse::Fault { code, message })
        }
        other => Err(XmlRpcError::Unexpected(format!(
            "expected params or fault, found {:?}",
            other
        ))),
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Start(String),
    End(String),
    Empty(String),
    Text(String),
    Eof,
}

struct Parser<'a> {
    reader: Reader<&'a [u8]>,
    buf: Vec<u8>,
}

impl<'a> Parser<'a> {
    fn new(xml: &'a str) -> Self {
        Self {
            reader: Reader::from_str(xml),
            buf: Vec::new(),
        }
    }

    /// Next structural token. Whitespace between elements is skipped.
    fn next_token(&mut self) -> Result<Token, XmlRpcError> {
        loop {
            match self.next_raw()? {
                Token::Text(t) if t.trim().is_empty() => continue,
                token => return Ok(token),
            }
        }
    }

    /// Next token with text exactly as sent.
    fn next_raw(&mut self) -> Result<Token, XmlRpcError> {
        loop {
            self.buf.clear();
            let token = match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => Token::Start(tag_name(e.name().as_ref())),
                Event::End(e) => Token::End(tag_name(e.name().as_ref())),
                Event::Empty(e) => Token::Empty(tag_name(e.name().as_ref())),
                Event::Text(t) => Token::Text(t.unescape()?.into_owned()),
                Event::CData(c) => Token::Text(String::from_utf8_lossy(&c.into_inner()).into_owned()),
                Event::Eof => Token::Eof,
                _ => continue,
            };
            return Ok(token);
        }
    }

    fn skip_to_start(&mut self, name: &str) -> Result<(), XmlRpcError> {
        loop {
            match self.next_token()? {
                Token::Start(tag) if tag == name => return Ok(()),
                Token::Eof => {
                    return Err(XmlRpcError::Unexpected(format!("missing <{}>", name)));
                }
                _ => {}
            }
        }
    }

    fn expect_start(&mut self, name: &str) -> Result<(), XmlRpcError> {
        match self.next_token()? {
            Token::Start(tag) if tag == name => Ok(()),
            other => Err(XmlRpcError::Unexpected(format!(
                "expected <{}>, found {:?}",
                name, other
            ))),
        }
    }

    fn expect_end(&mut self, name: &str) -> Result<(), XmlRpcError> {
        match self.next_token()? {
            Token::End(tag) if tag == name => Ok(()),
            other => Err(XmlRpcError::Unexpected(format!(
                "expected </{}>, found {:?}",
                name, other
            ))),
        }
    }

    /// Text up to the closing tag, empty when there is none.
    fn read_text(&mut self, name: &str) -> Result<String, XmlRpcError> {
        let mut text = String::new();
        loop {
            match self.next_raw()? {
                Token::Text(t) => text.push_str(&t),
                Token::End(tag) if tag == name => return Ok(text),
                other => {
                    return Err(XmlRpcError::Unexpected(format!(
                        "unexpected {:?} inside <{}>",
                        other, name
                    )));
                }
            }
        }
    }

    /// Parse a value whose `<value>` start tag has been consumed, including
    /// its closing tag.
    fn parse_value(&mut self) -> Result<XmlRpcValue, XmlRpcError> {
        let value = match self.next_token()? {
            // Untyped values are strings.
            Token::End(tag) if tag == "value" => return Ok(XmlRpcValue::Str(String::new())),
            Token::Text(text) => {
                self.expect_end("value")?;
                return Ok(XmlRpcValue::Str(text));
            }
            Token::Empty(tag) => match tag.as_str() {
                "nil" => XmlRpcValue::Nil,
                "string" => XmlRpcValue::Str(String::new()),
                "array" => XmlRpcValue::Array(Vec::new()),
                "struct" => XmlRpcValue::Struct(Vec::new()),
                other => {
                    return Err(XmlRpcError::Unexpected(format!("empty <{}/>", other)));
                }
            },
            Token::Start(tag) => self.parse_typed(&tag)?,
            other => {
                return Err(XmlRpcError::Unexpected(format!(
                    "unexpected {:?} in <value>",
                    other
                )));
            }
        };
        self.expect_end("value")?;
        Ok(value)
    }

    fn parse_typed(&mut self, tag: &str) -> Result<XmlRpcValue, XmlRpcError> {
        let value = match tag {
            "int" | "i4" | "i8" => {
                let text = self.read_text(tag)?;
                let parsed = text
                    .trim()
                    .parse()
                    .map_err(|_| XmlRpcError::Unexpected(format!("bad integer '{}'", text)))?;
                XmlRpcValue::Int(parsed)
            }
            "double" => {
                let text = self.read_text(tag)?;
                let parsed = text
                    .trim()
                    .parse()
                    .map_err(|_| XmlRpcError::Unexpected(format!("bad double '{}'", text)))?;
                XmlRpcValue::Double(parsed)
            }
            "boolean" => XmlRpcValue::Bool(self.read_text(tag)?.trim() == "1"),
            "string" => XmlRpcValue::Str(self.read_text(tag)?),
            "dateTime.iso8601" => XmlRpcValue::DateTime(self.read_text(tag)?),
            "nil" => {
                self.read_text(tag)?;
                XmlRpcValue::Nil
            }
            "array" => self.parse_array()?,
            "struct" => self.parse_struct()?,
            other => {
                return Err(XmlRpcError::Unexpected(format!(
                    "unsupported type <{}>",
                    other
                )));
            }
        };
        Ok(value)
    }

    fn parse_array(&mut self) -> Result<XmlRpcValue, XmlRpcError> {
        let mut items = Vec::new();
        match self.next_token()? {
            Token::Empty(tag) if tag == "data" => {}
            Token::Start(tag) if tag == "data" => loop {
                match self.next_token()? {
                    Token::Start(tag) if tag == "value" => items.push(self.parse_value()?),
                    Token::End(tag) if tag == "data" => break,
                    other => {
                        return Err(XmlRpcError::Unexpected(format!(
                            "unexpected {:?} in <data>",
                            other
                        )));
                    }
                }
            },
            other => {
                return Err(XmlRpcError::Unexpected(format!(
                    "expected <data>, found {:?}",
                    other
                )));
            }
        }
        self.expect_end("array")?;
        Ok(XmlRpcValue::Array(items))
    }

    fn parse_struct(&mut self) -> Result<XmlRpcValue, XmlRpcError> {
        let mut members = Vec::new();
        loop {
            match self.next_token()? {
                Token::Start(tag) if tag == "member" => {
                    self.expect_start("name")?;
                    let name = self.read_text("name")?;
                    self.expect_start("value")?;
                    let value = self.parse_value()?;
                    self.expect_end("member")?;
                    members.push((name, value));
                }
                Token::End(tag) if tag == "struct" => break,
                other => {
                    return Err(XmlRpcError::Unexpected(format!(
                        "unexpected {:?} in <struct>",
                        other
                    )));
                }
            }
        }
        Ok(XmlRpcValue::Struct(members))
    }
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}
