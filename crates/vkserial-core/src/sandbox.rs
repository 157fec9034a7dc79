//! Capability-free evaluation of hosting page scripts
//!
//! Hosting pages assign the signed API parameters from an inline script,
//! typically `var params = {"videos": "...", "sig": "...", ...};`. The
//! script is untrusted, so it is never executed. Instead a small literal
//! interpreter walks its statements and understands only:
//!
//! - `var|let|const name = <literal>` (comma-separated declarators allowed)
//! - `name = <literal>`
//! - `name.key = <literal>` and `name["key"] = <literal>`
//!
//! where a literal is a string, number, boolean, `null`, array, object, a
//! previously bound name, a parenthesised literal or a `+` concatenation of
//! these. Every other statement is skipped unevaluated. Nothing from the
//! host (globals, I/O, timers, network) is reachable; the only way out is
//! the output slot (`params` by default).
//!
//! If the top-level walk never assigns the slot (e.g. the assignment sits
//! inside a callback), a narrow fallback looks for the first `slot = …`
//! assignment anywhere in the token stream whose right-hand side is a
//! literal, and evaluates just that.

use std::collections::{BTreeMap, HashMap};
use std::iter::Peekable;
use std::str::CharIndices;

use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::types::SignedParams;

/// Default name of the binding the hosting script populates
pub const DEFAULT_SLOT: &str = "params";

/// Largest script accepted for evaluation
pub const MAX_SCRIPT_BYTES: usize = 512 * 1024;

/// Deepest array/object nesting accepted in a literal
pub const MAX_DEPTH: usize = 32;

/// Errors raised while evaluating a hosting script
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("script is larger than {0} bytes")]
    TooLarge(usize),

    #[error("syntax error at byte {pos}: {message}")]
    Syntax { pos: usize, message: String },

    #[error("literal nesting exceeds {0} levels")]
    TooDeep(usize),

    #[error("unsupported expression assigned to `{0}`")]
    Unsupported(String),

    #[error("output slot `{0}` was never assigned")]
    SlotEmpty(String),

    #[error("output slot `{0}` does not hold an object")]
    NotAnObject(String),

    #[error("required field `{0}` is missing")]
    MissingField(String),
}

/// Evaluates `script` and reads the output slot as [`SignedParams`]
///
/// # Errors
/// Any [`ScriptError`]; the failure concerns this script only.
///
/// # Example
/// ```
/// use vkserial_core::sandbox::{evaluate_script, DEFAULT_SLOT};
/// let script = r#"var params = {videos: "-1_2", sig: "s", access_token: "t", callback: "cb"};"#;
/// let signed = evaluate_script(script, DEFAULT_SLOT).unwrap();
/// assert_eq!(signed.videos, "-1_2");
/// assert_eq!(signed.callback.as_deref(), Some("cb"));
/// ```
pub fn evaluate_script(script: &str, slot: &str) -> Result<SignedParams, ScriptError> {
    let value = read_slot(script, slot)?;
    into_signed_params(value, slot)
}

/// Evaluates `script` and returns the raw value left in the output slot
pub fn read_slot(script: &str, slot: &str) -> Result<Value, ScriptError> {
    if script.len() > MAX_SCRIPT_BYTES {
        return Err(ScriptError::TooLarge(MAX_SCRIPT_BYTES));
    }

    let tokens = Lexer::new(script).tokenize()?;
    let mut interpreter = Interpreter::new(&tokens, slot);
    interpreter.run()?;

    if let Some(value) = interpreter.scope.remove(slot) {
        return Ok(value);
    }

    interpreter
        .find_slot_assignment()?
        .ok_or_else(|| ScriptError::SlotEmpty(slot.to_string()))
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

fn into_signed_params(value: Value, slot: &str) -> Result<SignedParams, ScriptError> {
    let Value::Object(object) = value else {
        return Err(ScriptError::NotAnObject(slot.to_string()));
    };

    let mut fields: BTreeMap<String, String> = object
        .into_iter()
        .filter_map(|(key, value)| field_to_string(value).map(|text| (key, text)))
        .collect();

    let sig = take_field(&mut fields, &["sig"]).ok_or_else(|| missing("sig"))?;
    let videos = take_field(&mut fields, &["videos"]).ok_or_else(|| missing("videos"))?;
    let access_token = take_field(&mut fields, &["access_token", "accessToken"])
        .ok_or_else(|| missing("access_token"))?;
    let callback = take_field(&mut fields, &["callback", "callbackName"]);

    Ok(SignedParams {
        sig,
        videos,
        access_token,
        callback,
        extra: fields,
    })
}

fn missing(field: &str) -> ScriptError {
    ScriptError::MissingField(field.to_string())
}

/// Removes the first non-empty field among `names`, clearing the aliases too
fn take_field(fields: &mut BTreeMap<String, String>, names: &[&str]) -> Option<String> {
    let mut found = None;
    for name in names {
        if let Some(value) = fields.remove(*name)
            && found.is_none()
            && !value.is_empty()
        {
            found = Some(value);
        }
    }
    found
}

fn field_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(Value),
    /// Regular expression literal, kept opaque
    Regex(String),
    Punct(char),
}

#[derive(Debug, Clone, PartialEq)]
struct Lexed {
    token: Token,
    /// A line break separates this token from the previous one
    newline_before: bool,
}

struct Lexer<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Lexed>, ScriptError> {
        let mut tokens: Vec<Lexed> = Vec::new();
        let mut newline_before = false;

        while let Some(&(pos, c)) = self.chars.peek() {
            if c == '\n' || c == '\r' || c == '\u{2028}' || c == '\u{2029}' {
                newline_before = true;
                self.chars.next();
                continue;
            }
            if c.is_whitespace() {
                self.chars.next();
                continue;
            }

            if c == '/' {
                match self.src[pos + 1..].chars().next() {
                    Some('/') => {
                        self.skip_line_comment();
                        continue;
                    }
                    Some('*') => {
                        if self.skip_block_comment(pos)? {
                            newline_before = true;
                        }
                        continue;
                    }
                    _ if regex_allowed_after(tokens.last().map(|lexed| &lexed.token)) => {
                        self.chars.next();
                        tokens.push(Lexed {
                            token: Token::Regex(self.lex_regex(pos)?),
                            newline_before,
                        });
                        newline_before = false;
                        continue;
                    }
                    _ => {}
                }
            }

            let token = if c == '"' || c == '\'' || c == '`' {
                self.chars.next();
                Token::Str(self.lex_string(pos, c)?)
            } else if c.is_ascii_digit()
                || (c == '.' && self.src[pos + 1..].starts_with(|n: char| n.is_ascii_digit()))
            {
                self.lex_number(pos)?
            } else if is_ident_start(c) {
                Token::Ident(self.lex_ident())
            } else {
                self.chars.next();
                Token::Punct(c)
            };

            tokens.push(Lexed {
                token,
                newline_before,
            });
            newline_before = false;
        }

        Ok(tokens)
    }

    fn skip_line_comment(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '\n' || c == '\r' {
                break;
            }
            self.chars.next();
        }
    }

    /// Skips `/* ... */`, returning whether it spanned a line break
    fn skip_block_comment(&mut self, start: usize) -> Result<bool, ScriptError> {
        self.chars.next();
        self.chars.next();
        let mut spans_line = false;

        while let Some((_, c)) = self.chars.next() {
            if c == '\n' || c == '\r' {
                spans_line = true;
            }
            if c == '*' && matches!(self.chars.peek(), Some(&(_, '/'))) {
                self.chars.next();
                return Ok(spans_line);
            }
        }

        Err(syntax(start, "unterminated comment"))
    }

    fn lex_string(&mut self, start: usize, quote: char) -> Result<String, ScriptError> {
        let mut out = String::new();

        loop {
            let Some((_, c)) = self.chars.next() else {
                return Err(syntax(start, "unterminated string"));
            };

            match c {
                c if c == quote => return Ok(out),
                '\\' => self.lex_escape(start, &mut out)?,
                '\n' | '\r' if quote != '`' => {
                    return Err(syntax(start, "unterminated string"));
                }
                c => out.push(c),
            }
        }
    }

    /// Reads `/body/flags` after the opening slash
    fn lex_regex(&mut self, start: usize) -> Result<String, ScriptError> {
        let mut body = String::new();
        let mut in_class = false;

        loop {
            let Some((_, c)) = self.chars.next() else {
                return Err(syntax(start, "unterminated regular expression"));
            };

            match c {
                '\n' | '\r' | '\u{2028}' | '\u{2029}' => {
                    return Err(syntax(start, "unterminated regular expression"));
                }
                '\\' => {
                    body.push(c);
                    match self.chars.next() {
                        Some((_, '\n' | '\r')) | None => {
                            return Err(syntax(start, "unterminated regular expression"));
                        }
                        Some((_, escaped)) => body.push(escaped),
                    }
                }
                '[' => {
                    in_class = true;
                    body.push(c);
                }
                ']' => {
                    in_class = false;
                    body.push(c);
                }
                '/' if !in_class => break,
                c => body.push(c),
            }
        }

        // flags
        self.lex_ident();
        Ok(body)
    }

    fn lex_escape(&mut self, start: usize, out: &mut String) -> Result<(), ScriptError> {
        let Some((_, c)) = self.chars.next() else {
            return Err(syntax(start, "unterminated string"));
        };

        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            'x' => {
                let code = self.hex_digits(start, 2)?;
                out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            'u' => {
                let code = self.unicode_escape(start)?;
                out.push(code);
            }
            '\r' => {
                if matches!(self.chars.peek(), Some(&(_, '\n'))) {
                    self.chars.next();
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            other => out.push(other),
        }

        Ok(())
    }

    fn unicode_escape(&mut self, start: usize) -> Result<char, ScriptError> {
        if matches!(self.chars.peek(), Some(&(_, '{'))) {
            self.chars.next();
            let mut code: u32 = 0;
            loop {
                match self.chars.next() {
                    Some((_, '}')) => break,
                    Some((_, d)) if d.is_ascii_hexdigit() => {
                        code = code
                            .checked_mul(16)
                            .and_then(|v| v.checked_add(d.to_digit(16).unwrap_or(0)))
                            .ok_or_else(|| syntax(start, "invalid unicode escape"))?;
                    }
                    _ => return Err(syntax(start, "invalid unicode escape")),
                }
            }
            return Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
        }

        let high = self.hex_digits(start, 4)?;
        if (0xD800..0xDC00).contains(&high) && self.src_follows_low_surrogate() {
            self.chars.next();
            self.chars.next();
            let low = self.hex_digits(start, 4)?;
            if (0xDC00..0xE000).contains(&low) {
                let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                return Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            return Ok(char::REPLACEMENT_CHARACTER);
        }

        Ok(char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    fn src_follows_low_surrogate(&mut self) -> bool {
        match self.chars.peek() {
            Some(&(pos, '\\')) => self.src[pos..].starts_with("\\u"),
            _ => false,
        }
    }

    fn hex_digits(&mut self, start: usize, count: usize) -> Result<u32, ScriptError> {
        let mut code = 0;
        for _ in 0..count {
            match self.chars.next() {
                Some((_, d)) if d.is_ascii_hexdigit() => {
                    code = code * 16 + d.to_digit(16).unwrap_or(0);
                }
                _ => return Err(syntax(start, "invalid hex escape")),
            }
        }
        Ok(code)
    }

    fn lex_number(&mut self, start: usize) -> Result<Token, ScriptError> {
        let mut lexeme = String::new();

        while let Some(&(_, c)) = self.chars.peek() {
            let exponent_sign = (c == '+' || c == '-')
                && lexeme.ends_with(['e', 'E'])
                && !lexeme.starts_with("0x")
                && !lexeme.starts_with("0X");
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || exponent_sign {
                lexeme.push(c);
                self.chars.next();
            } else {
                break;
            }
        }

        parse_number(&lexeme)
            .map(Token::Num)
            .ok_or_else(|| syntax(start, &format!("invalid number `{}`", lexeme)))
    }

    fn lex_ident(&mut self) -> String {
        let mut ident = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if is_ident_start(c) || c.is_ascii_digit() {
                ident.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        ident
    }
}

/// Whether a `/` after `previous` opens a regular expression rather than dividing
fn regex_allowed_after(previous: Option<&Token>) -> bool {
    match previous {
        None => true,
        Some(Token::Punct(c)) => matches!(
            c,
            '(' | ',' | '=' | ':' | '[' | '!' | '&' | '|' | '?' | '{' | '}' | ';' | '+' | '-'
                | '*' | '%' | '<' | '>' | '~' | '^'
        ),
        Some(Token::Ident(word)) => matches!(
            word.as_str(),
            "return" | "typeof" | "case" | "do" | "else" | "in" | "of" | "new" | "delete"
                | "void" | "throw" | "instanceof" | "yield" | "await"
        ),
        Some(_) => false,
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn syntax(pos: usize, message: &str) -> ScriptError {
    ScriptError::Syntax {
        pos,
        message: message.to_string(),
    }
}

fn parse_number(lexeme: &str) -> Option<Value> {
    let cleaned = lexeme.replace('_', "");

    if let Some(hex) = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        return i64::from_str_radix(hex, 16).ok().map(Value::from);
    }

    if let Ok(int) = cleaned.parse::<i64>() {
        return Some(Value::from(int));
    }

    let float = cleaned.parse::<f64>().ok()?;
    number_value(float)
}

/// Stores integral floats as integers so they print like JavaScript numbers
fn number_value(float: f64) -> Option<Value> {
    if float.fract() == 0.0 && float.abs() < 9.0e15 {
        return Some(Value::from(float as i64));
    }
    Number::from_f64(float).map(Value::Number)
}

// ---------------------------------------------------------------------------
// Interpreter
// ---------------------------------------------------------------------------

/// Why an expression could not be evaluated
enum Unevaluable {
    /// Outside the literal subset; the statement is skipped
    Unsupported,
    /// Hard failure that ends evaluation
    Fatal(ScriptError),
}

impl From<ScriptError> for Unevaluable {
    fn from(error: ScriptError) -> Self {
        Unevaluable::Fatal(error)
    }
}

struct Interpreter<'t> {
    tokens: &'t [Lexed],
    pos: usize,
    slot: &'t str,
    scope: HashMap<String, Value>,
}

impl<'t> Interpreter<'t> {
    fn new(tokens: &'t [Lexed], slot: &'t str) -> Self {
        Self {
            tokens,
            pos: 0,
            slot,
            scope: HashMap::new(),
        }
    }

    fn run(&mut self) -> Result<(), ScriptError> {
        while self.pos < self.tokens.len() {
            self.statement()?;
        }
        Ok(())
    }

    fn statement(&mut self) -> Result<(), ScriptError> {
        if self.is_punct(0, ';') {
            self.pos += 1;
            return Ok(());
        }

        match self.ident(0) {
            Some("var" | "let" | "const") => {
                self.pos += 1;
                self.declarations()
            }
            Some(name) if self.is_assign(1) => {
                let name = name.to_string();
                self.pos += 2;
                self.assign(&name, None)
            }
            Some(name) if self.is_punct(1, '.') && self.ident(2).is_some() && self.is_assign(3) => {
                let name = name.to_string();
                let key = self.ident(2).unwrap_or_default().to_string();
                self.pos += 4;
                self.assign(&name, Some(key))
            }
            Some(name)
                if self.is_punct(1, '[')
                    && matches!(self.token(2), Some(Token::Str(_)))
                    && self.is_punct(3, ']')
                    && self.is_assign(4) =>
            {
                let name = name.to_string();
                let key = match self.token(2) {
                    Some(Token::Str(key)) => key.clone(),
                    _ => String::new(),
                };
                self.pos += 5;
                self.assign(&name, Some(key))
            }
            _ => {
                self.skip_statement();
                Ok(())
            }
        }
    }

    fn declarations(&mut self) -> Result<(), ScriptError> {
        loop {
            let Some(name) = self.ident(0).map(str::to_string) else {
                self.skip_statement();
                return Ok(());
            };
            self.pos += 1;

            if self.is_assign(0) {
                self.pos += 1;
                let before = self.pos;
                self.assign(&name, None)?;
                // an unsupported initializer skips the rest of the statement
                if self.pos > before && !self.ends_expression_at(self.pos) {
                    return Ok(());
                }
            } else {
                self.scope.insert(name, Value::Null);
            }

            if self.is_punct(0, ',') {
                self.pos += 1;
                continue;
            }
            if self.is_punct(0, ';') {
                self.pos += 1;
            }
            return Ok(());
        }
    }

    /// Evaluates the right-hand side and stores it
    ///
    /// On success the cursor is left on the token after the expression.
    fn assign(&mut self, name: &str, key: Option<String>) -> Result<(), ScriptError> {
        let targets_slot = name == self.slot;

        let value = match self.expression(0) {
            Ok(value) if self.at_expression_end() => value,
            Ok(_) | Err(Unevaluable::Unsupported) => {
                if targets_slot {
                    return Err(ScriptError::Unsupported(self.slot.to_string()));
                }
                if key.is_none() {
                    self.scope.remove(name);
                }
                self.skip_statement();
                return Ok(());
            }
            Err(Unevaluable::Fatal(error)) => return Err(error),
        };

        match key {
            None => {
                self.scope.insert(name.to_string(), value);
            }
            Some(key) => match self.scope.get_mut(name) {
                Some(Value::Object(object)) => {
                    object.insert(key, value);
                }
                Some(_) => {}
                None if targets_slot => {
                    return Err(ScriptError::Unsupported(self.slot.to_string()));
                }
                None => {}
            },
        }

        Ok(())
    }

    fn expression(&mut self, depth: usize) -> Result<Value, Unevaluable> {
        if depth > MAX_DEPTH {
            return Err(ScriptError::TooDeep(MAX_DEPTH).into());
        }

        let mut value = self.primary(depth)?;

        while self.is_punct(0, '+') && !self.is_punct(1, '+') && !self.is_punct(1, '=') {
            self.pos += 1;
            let rhs = self.primary(depth)?;
            value = concat(value, rhs)?;
        }

        Ok(value)
    }

    fn primary(&mut self, depth: usize) -> Result<Value, Unevaluable> {
        let Some(token) = self.token(0).cloned() else {
            return Err(Unevaluable::Unsupported);
        };
        self.pos += 1;

        match token {
            Token::Str(text) => Ok(Value::String(text)),
            Token::Num(number) => Ok(number),
            Token::Punct('-') => match self.token(0).cloned() {
                Some(Token::Num(number)) => {
                    self.pos += 1;
                    negate(number).ok_or(Unevaluable::Unsupported)
                }
                _ => Err(Unevaluable::Unsupported),
            },
            Token::Punct('(') => {
                let value = self.expression(depth + 1)?;
                self.expect_punct(')')?;
                Ok(value)
            }
            Token::Punct('{') => self.object(depth + 1),
            Token::Punct('[') => self.array(depth + 1),
            Token::Ident(ident) => match ident.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                "null" | "undefined" => Ok(Value::Null),
                name => self
                    .scope
                    .get(name)
                    .cloned()
                    .ok_or(Unevaluable::Unsupported),
            },
            Token::Punct(_) | Token::Regex(_) => Err(Unevaluable::Unsupported),
        }
    }

    fn object(&mut self, depth: usize) -> Result<Value, Unevaluable> {
        if depth > MAX_DEPTH {
            return Err(ScriptError::TooDeep(MAX_DEPTH).into());
        }

        let mut object = Map::new();

        loop {
            if self.is_punct(0, '}') {
                self.pos += 1;
                return Ok(Value::Object(object));
            }

            let key = match self.token(0) {
                Some(Token::Ident(key)) | Some(Token::Str(key)) => key.clone(),
                Some(Token::Num(number)) => number.to_string(),
                _ => return Err(Unevaluable::Unsupported),
            };
            self.pos += 1;

            self.expect_punct(':')?;
            let value = self.expression(depth)?;
            object.insert(key, value);

            if self.is_punct(0, ',') {
                self.pos += 1;
            } else if !self.is_punct(0, '}') {
                return Err(Unevaluable::Unsupported);
            }
        }
    }

    fn array(&mut self, depth: usize) -> Result<Value, Unevaluable> {
        if depth > MAX_DEPTH {
            return Err(ScriptError::TooDeep(MAX_DEPTH).into());
        }

        let mut items = Vec::new();

        loop {
            if self.is_punct(0, ']') {
                self.pos += 1;
                return Ok(Value::Array(items));
            }

            items.push(self.expression(depth)?);

            if self.is_punct(0, ',') {
                self.pos += 1;
            } else if !self.is_punct(0, ']') {
                return Err(Unevaluable::Unsupported);
            }
        }
    }

    fn expect_punct(&mut self, expected: char) -> Result<(), Unevaluable> {
        if self.is_punct(0, expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(Unevaluable::Unsupported)
        }
    }

    /// Skips to the end of the current statement without evaluating it
    fn skip_statement(&mut self) {
        let start = self.pos;
        let mut depth = 0usize;

        while let Some(lexed) = self.tokens.get(self.pos) {
            if self.pos > start && depth == 0 && lexed.newline_before {
                return;
            }
            self.pos += 1;

            match lexed.token {
                Token::Punct('(' | '[' | '{') => depth += 1,
                Token::Punct(')' | ']' | '}') => depth = depth.saturating_sub(1),
                Token::Punct(';') if depth == 0 => return,
                _ => {}
            }
        }
    }

    /// Looks for the first evaluable `slot = <literal>` anywhere in the script
    ///
    /// Candidates outside the literal subset are passed over; the slot is
    /// `Unsupported` only when every candidate was.
    fn find_slot_assignment(&mut self) -> Result<Option<Value>, ScriptError> {
        let mut passed_over = false;

        for index in 0..self.tokens.len() {
            let is_slot = matches!(&self.tokens[index].token, Token::Ident(name) if name == self.slot);
            if !is_slot {
                continue;
            }

            self.pos = index;
            if !self.is_assign(1) {
                continue;
            }
            self.pos = index + 2;

            match self.expression(0) {
                Ok(value) if self.at_expression_end() => return Ok(Some(value)),
                Ok(_) | Err(Unevaluable::Unsupported) => passed_over = true,
                Err(Unevaluable::Fatal(error)) => return Err(error),
            }
        }

        if passed_over {
            return Err(ScriptError::Unsupported(self.slot.to_string()));
        }
        Ok(None)
    }

    fn at_expression_end(&self) -> bool {
        self.ends_expression_at(self.pos)
    }

    fn ends_expression_at(&self, pos: usize) -> bool {
        match self.tokens.get(pos) {
            None => true,
            Some(lexed) => {
                lexed.newline_before
                    || matches!(lexed.token, Token::Punct(';' | ',' | '}' | ')'))
            }
        }
    }

    fn token(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|lexed| &lexed.token)
    }

    fn ident(&self, offset: usize) -> Option<&'t str> {
        let tokens: &'t [Lexed] = self.tokens;
        match tokens.get(self.pos + offset).map(|lexed| &lexed.token) {
            Some(Token::Ident(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    fn is_punct(&self, offset: usize, expected: char) -> bool {
        matches!(self.token(offset), Some(Token::Punct(c)) if *c == expected)
    }

    /// A lone `=` (not `==`, `=>`)
    fn is_assign(&self, offset: usize) -> bool {
        self.is_punct(offset, '=') && !self.is_punct(offset + 1, '=') && !self.is_punct(offset + 1, '>')
    }
}

fn negate(value: Value) -> Option<Value> {
    match value {
        Value::Number(number) => match number.as_i64() {
            Some(int) => int.checked_neg().map(Value::from),
            None => number.as_f64().and_then(|float| number_value(-float)),
        },
        _ => None,
    }
}

/// JavaScript `+` restricted to numbers and string coercion of scalars
fn concat(lhs: Value, rhs: Value) -> Result<Value, Unevaluable> {
    match (&lhs, &rhs) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64())
                && let Some(sum) = a.checked_add(b)
            {
                return Ok(Value::from(sum));
            }
            let sum = a.as_f64().unwrap_or(f64::NAN) + b.as_f64().unwrap_or(f64::NAN);
            number_value(sum).ok_or(Unevaluable::Unsupported)
        }
        (Value::String(_), _) | (_, Value::String(_)) => {
            let left = scalar_text(&lhs).ok_or(Unevaluable::Unsupported)?;
            let right = scalar_text(&rhs).ok_or(Unevaluable::Unsupported)?;
            Ok(Value::String(left + &right))
        }
        _ => Err(Unevaluable::Unsupported),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null => Some("null".to_string()),
        _ => None,
    }
}
