//! Lexer and parser for the validator expression language.
//!
//! A deliberately small Lua-flavoured language: expressions with `and`,
//! `or`, `not`, comparison, arithmetic, concatenation `..`, indexing
//! (`a.b`, `a[k]`), calls into a fixed allow-list, table constructors, and
//! three statement forms (`ctx`-path assignment, `if`/`elseif`/`else`,
//! `return`). Statements separate with `;`.

use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    // punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Dot,
    Concat,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    // keywords
    And,
    Or,
    Not,
    If,
    Then,
    Elseif,
    Else,
    End,
    Return,
    True,
    False,
    Nil,
    Eof,
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b'(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            b'{' => {
                tokens.push(Token::LBrace);
                i += 1;
            }
            b'}' => {
                tokens.push(Token::RBrace);
                i += 1;
            }
            b'[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            b']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            b',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            b';' => {
                tokens.push(Token::Semi);
                i += 1;
            }
            b'+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            b'-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            b'*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            b'/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            b'%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            b'.' => {
                if bytes.get(i + 1) == Some(&b'.') {
                    tokens.push(Token::Concat);
                    i += 2;
                } else {
                    tokens.push(Token::Dot);
                    i += 1;
                }
            }
            b'=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Eq);
                    i += 2;
                } else {
                    tokens.push(Token::Assign);
                    i += 1;
                }
            }
            b'~' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Ne);
                    i += 2;
                } else {
                    return Err("unexpected '~'".into());
                }
            }
            b'<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            b'>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            b'\'' | b'"' => {
                let open = b;
                let mut out: Vec<u8> = Vec::new();
                i += 1;
                loop {
                    match bytes.get(i) {
                        Some(&c) if c == open => {
                            i += 1;
                            break;
                        }
                        Some(b'\\') => {
                            match bytes.get(i + 1) {
                                Some(b'n') => out.push(b'\n'),
                                Some(b't') => out.push(b'\t'),
                                Some(b'\\') => out.push(b'\\'),
                                Some(b'\'') => out.push(b'\''),
                                Some(b'"') => out.push(b'"'),
                                _ => return Err("bad escape in string".into()),
                            }
                            i += 2;
                        }
                        Some(&c) => {
                            out.push(c);
                            i += 1;
                        }
                        None => return Err("unterminated string".into()),
                    }
                }
                let text =
                    String::from_utf8(out).map_err(|_| "invalid UTF-8 in string".to_string())?;
                tokens.push(Token::Str(text));
            }
            b'0'..=b'9' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    // Stop before `..` so concatenation still lexes.
                    if bytes[i] == b'.' && bytes.get(i + 1) == Some(&b'.') {
                        break;
                    }
                    i += 1;
                }
                let text = &src[start..i];
                if text.contains('.') {
                    tokens.push(Token::Float(
                        text.parse().map_err(|_| format!("bad number '{text}'"))?,
                    ));
                } else {
                    tokens.push(Token::Int(
                        text.parse().map_err(|_| format!("bad number '{text}'"))?,
                    ));
                }
            }
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                let word = &src[start..i];
                tokens.push(match word {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "if" => Token::If,
                    "then" => Token::Then,
                    "elseif" => Token::Elseif,
                    "else" => Token::Else,
                    "end" => Token::End,
                    "return" => Token::Return,
                    "true" => Token::True,
                    "false" => Token::False,
                    "nil" => Token::Nil,
                    _ => Token::Ident(word.to_string()),
                });
            }
            other => return Err(format!("unexpected character '{}'", other as char)),
        }
    }
    tokens.push(Token::Eof);
    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// `{a, b, k = v, [k2] = v2}`
    TableCtor(Vec<(Option<Expr>, Expr)>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign(Expr, Expr),
    If {
        arms: Vec<(Expr, Vec<Stmt>)>,
        else_body: Option<Vec<Stmt>>,
    },
    Return(Option<Expr>),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, t: &Token) -> Result<(), String> {
        if self.peek() == t {
            self.bump();
            Ok(())
        } else {
            Err(format!("expected {t:?}, found {:?}", self.peek()))
        }
    }

    fn block(&mut self, terminators: &[Token]) -> Result<Vec<Stmt>, String> {
        let mut stmts = Vec::new();
        loop {
            while *self.peek() == Token::Semi {
                self.bump();
            }
            if terminators.contains(self.peek()) || *self.peek() == Token::Eof {
                return Ok(stmts);
            }
            stmts.push(self.statement()?);
        }
    }

    fn statement(&mut self) -> Result<Stmt, String> {
        match self.peek() {
            Token::Return => {
                self.bump();
                let ends = matches!(
                    self.peek(),
                    Token::Semi | Token::End | Token::Else | Token::Elseif | Token::Eof
                );
                if ends {
                    Ok(Stmt::Return(None))
                } else {
                    Ok(Stmt::Return(Some(self.expr(0)?)))
                }
            }
            Token::If => {
                self.bump();
                let mut arms = Vec::new();
                let cond = self.expr(0)?;
                self.eat(&Token::Then)?;
                let body = self.block(&[Token::Elseif, Token::Else, Token::End])?;
                arms.push((cond, body));
                let mut else_body = None;
                loop {
                    match self.bump() {
                        Token::Elseif => {
                            let cond = self.expr(0)?;
                            self.eat(&Token::Then)?;
                            let body = self.block(&[Token::Elseif, Token::Else, Token::End])?;
                            arms.push((cond, body));
                        }
                        Token::Else => {
                            else_body = Some(self.block(&[Token::End])?);
                            self.eat(&Token::End)?;
                            break;
                        }
                        Token::End => break,
                        other => return Err(format!("expected elseif/else/end, found {other:?}")),
                    }
                }
                Ok(Stmt::If { arms, else_body })
            }
            _ => {
                let expr = self.expr(0)?;
                if *self.peek() == Token::Assign {
                    self.bump();
                    let rhs = self.expr(0)?;
                    if !is_lvalue(&expr) {
                        return Err("left side of '=' is not assignable".into());
                    }
                    Ok(Stmt::Assign(expr, rhs))
                } else {
                    Ok(Stmt::Expr(expr))
                }
            }
        }
    }

    /// Pratt expression parser; `min_bp` is the minimum binding power.
    fn expr(&mut self, min_bp: u8) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        loop {
            let (op, bp) = match self.peek() {
                Token::Or => (BinOp::Or, 1),
                Token::And => (BinOp::And, 2),
                Token::Eq => (BinOp::Eq, 3),
                Token::Ne => (BinOp::Ne, 3),
                Token::Lt => (BinOp::Lt, 3),
                Token::Le => (BinOp::Le, 3),
                Token::Gt => (BinOp::Gt, 3),
                Token::Ge => (BinOp::Ge, 3),
                Token::Concat => (BinOp::Concat, 4),
                Token::Plus => (BinOp::Add, 5),
                Token::Minus => (BinOp::Sub, 5),
                Token::Star => (BinOp::Mul, 6),
                Token::Slash => (BinOp::Div, 6),
                Token::Percent => (BinOp::Mod, 6),
                _ => break,
            };
            if bp < min_bp {
                break;
            }
            self.bump();
            let rhs = self.expr(bp + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Token::Not => {
                self.bump();
                Ok(Expr::Unary(UnOp::Not, Box::new(self.unary()?)))
            }
            Token::Minus => {
                self.bump();
                Ok(Expr::Unary(UnOp::Neg, Box::new(self.unary()?)))
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.bump();
                    match self.bump() {
                        Token::Ident(name) => {
                            expr = Expr::Index(Box::new(expr), Box::new(Expr::Literal(Value::Str(name))));
                        }
                        other => return Err(format!("expected field name after '.', found {other:?}")),
                    }
                }
                Token::LBracket => {
                    self.bump();
                    let key = self.expr(0)?;
                    self.eat(&Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(key));
                }
                Token::LParen => {
                    self.bump();
                    let mut args = Vec::new();
                    if *self.peek() != Token::RParen {
                        loop {
                            args.push(self.expr(0)?);
                            if *self.peek() == Token::Comma {
                                self.bump();
                            } else {
                                break;
                            }
                        }
                    }
                    self.eat(&Token::RParen)?;
                    expr = Expr::Call(Box::new(expr), args);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.bump() {
            Token::Int(i) => Ok(Expr::Literal(Value::Int(i))),
            Token::Float(f) => Ok(Expr::Literal(Value::Float(f))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Nil => Ok(Expr::Literal(Value::Nil)),
            Token::Ident(name) => Ok(Expr::Ident(name)),
            Token::LParen => {
                let inner = self.expr(0)?;
                self.eat(&Token::RParen)?;
                Ok(inner)
            }
            Token::LBrace => {
                let mut items = Vec::new();
                if *self.peek() != Token::RBrace {
                    loop {
                        let item = match self.peek().clone() {
                            Token::LBracket => {
                                self.bump();
                                let key = self.expr(0)?;
                                self.eat(&Token::RBracket)?;
                                self.eat(&Token::Assign)?;
                                (Some(key), self.expr(0)?)
                            }
                            Token::Ident(name)
                                if self.tokens.get(self.pos + 1) == Some(&Token::Assign) =>
                            {
                                self.bump();
                                self.bump();
                                (Some(Expr::Literal(Value::Str(name))), self.expr(0)?)
                            }
                            _ => (None, self.expr(0)?),
                        };
                        items.push(item);
                        if *self.peek() == Token::Comma {
                            self.bump();
                        } else {
                            break;
                        }
                    }
                }
                self.eat(&Token::RBrace)?;
                Ok(Expr::TableCtor(items))
            }
            other => Err(format!("unexpected token {other:?}")),
        }
    }
}

fn is_lvalue(e: &Expr) -> bool {
    match e {
        Expr::Ident(_) => true,
        Expr::Index(base, _) => is_lvalue(base),
        _ => false,
    }
}

/// Compile source text to a program. A trailing bare expression becomes
/// the program's result.
pub fn parse_program(src: &str) -> Result<Program, String> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let stmts = parser.block(&[])?;
    if *parser.peek() != Token::Eof {
        return Err(format!("trailing tokens at {:?}", parser.peek()));
    }
    if stmts.is_empty() {
        return Err("empty expression".into());
    }
    Ok(Program { stmts })
}
