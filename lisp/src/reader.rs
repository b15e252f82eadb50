use crate::error::LispError;
use crate::value::Value;

/// Read every top-level form of `source`.
pub fn read_all(source: &str) -> Result<Vec<Value>, LispError> {
    let mut reader = Reader {
        chars: source.char_indices().collect(),
        pos: 0,
        len: source.len(),
    };
    let mut forms = Vec::new();
    loop {
        reader.skip_whitespace();
        if reader.peek().is_none() {
            return Ok(forms);
        }
        forms.push(reader.read_form()?);
    }
}

struct Reader {
    chars: Vec<(usize, char)>,
    pos: usize,
    len: usize,
}

impl Reader {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    /// Byte offset of the current position.
    fn offset(&self) -> usize {
        self.chars.get(self.pos).map_or(self.len, |(i, _)| *i)
    }

    fn error(&self, message: &str) -> LispError {
        LispError::Read {
            message: message.to_string(),
            offset: self.offset(),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c == ';' {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.pos += 1;
                }
            } else if c.is_whitespace() || c == ',' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn read_form(&mut self) -> Result<Value, LispError> {
        self.skip_whitespace();
        let Some(c) = self.peek() else {
            return Err(self.error("unexpected end of input"));
        };

        match c {
            '(' => Ok(Value::List(self.read_seq(')')?)),
            '[' => Ok(Value::Vector(self.read_seq(']')?)),
            '{' => {
                let items = self.read_seq('}')?;
                if items.len() % 2 != 0 {
                    return Err(self.error("map literal must contain an even number of forms"));
                }
                let mut entries: Vec<(Value, Value)> = Vec::new();
                for pair in items.chunks(2) {
                    let (key, value) = (pair[0].clone(), pair[1].clone());
                    match entries.iter_mut().find(|(k, _)| *k == key) {
                        Some(entry) => entry.1 = value,
                        None => entries.push((key, value)),
                    }
                }
                Ok(Value::Map(entries))
            }
            ')' | ']' | '}' => Err(self.error(&format!("unmatched delimiter: {}", c))),
            '\'' => {
                self.pos += 1;
                let quoted = self.read_form()?;
                Ok(Value::List(vec![Value::Symbol("quote".to_string()), quoted]))
            }
            '@' => {
                self.pos += 1;
                let target = self.read_form()?;
                Ok(Value::List(vec![Value::Symbol("deref".to_string()), target]))
            }
            '"' => self.read_string(),
            _ => self.read_atom(),
        }
    }

    fn read_seq(&mut self, close: char) -> Result<Vec<Value>, LispError> {
        let start = self.offset();
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => {
                    return Err(LispError::Read {
                        message: format!("EOF while reading, expected '{}'", close),
                        offset: start,
                    });
                }
                Some(c) if c == close => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some(_) => items.push(self.read_form()?),
            }
        }
    }

    fn read_string(&mut self) -> Result<Value, LispError> {
        let start = self.offset();
        self.pos += 1;
        let mut s = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '"' => return Ok(Value::String(s)),
                '\\' => {
                    let escaped = self.peek().ok_or_else(|| self.error("EOF in escape sequence"))?;
                    self.pos += 1;
                    s.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                c => s.push(c),
            }
        }
        Err(LispError::Read {
            message: "EOF while reading string".to_string(),
            offset: start,
        })
    }

    fn read_atom(&mut self) -> Result<Value, LispError> {
        let mut token = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | '"' | ';' | ',') {
                break;
            }
            token.push(c);
            self.pos += 1;
        }

        Ok(match token.as_str() {
            "nil" => Value::Nil,
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            _ => {
                if let Some(keyword) = token.strip_prefix(':') {
                    if keyword.is_empty() {
                        return Err(self.error("invalid keyword: :"));
                    }
                    Value::Keyword(keyword.to_string())
                } else if let Some(n) = parse_number(&token) {
                    Value::Number(n)
                } else {
                    Value::Symbol(token)
                }
            }
        })
    }
}

fn parse_number(token: &str) -> Option<f64> {
    let digits = token.strip_prefix(['-', '+']).unwrap_or(token);
    if !digits.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}
