//! Statement lexer and parser for the relational endpoint.
//!
//! Only the statement shapes the relational adapter emits are understood:
//!
//! ```text
//! CREATE TABLE [IF NOT EXISTS] t (col [type ...] [PRIMARY KEY] [AUTOINCREMENT] [UNIQUE], ...)
//! INSERT INTO t (a, b) VALUES (?, ?)
//! SELECT * FROM t [WHERE a = ? AND ...] [ORDER BY f [ASC|DESC]] [LIMIT n]
//! UPDATE t SET a = ?, b = ? [WHERE k = ?]
//! DELETE FROM t [WHERE k = ?]
//! ```
//!
//! Operands are `?` placeholders or literals. Keywords are case-insensitive.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Errors produced while lexing, parsing or binding a statement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SqlError {
    /// A character that starts no token.
    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedCharacter {
        /// The offending character.
        ch: char,
        /// Character offset in the statement.
        position: usize,
    },

    /// A string literal without its closing quote.
    #[error("unterminated string literal")]
    UnterminatedString,

    /// A malformed numeric literal.
    #[error("invalid number: {0}")]
    InvalidNumber(String),

    /// The parser found something other than what the grammar allows.
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        /// What was expected.
        expected: String,
        /// What was found.
        found: String,
    },

    /// A placeholder has no bound parameter.
    #[error("missing value for parameter {0}")]
    MissingParameter(usize),

    /// More parameters were bound than placeholders exist.
    #[error("statement has {expected} placeholders but {given} parameters were given")]
    ParameterCount {
        /// Placeholders in the statement.
        expected: usize,
        /// Parameters supplied.
        given: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Integer(i64),
    Float(f64),
    Str(String),
    Param,
    Comma,
    LeftParen,
    RightParen,
    Eq,
    Star,
    Semicolon,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => write!(f, "{w}"),
            Token::Integer(i) => write!(f, "{i}"),
            Token::Float(x) => write!(f, "{x}"),
            Token::Str(s) => write!(f, "'{s}'"),
            Token::Param => write!(f, "?"),
            Token::Comma => write!(f, ","),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::Eq => write!(f, "="),
            Token::Star => write!(f, "*"),
            Token::Semicolon => write!(f, ";"),
            Token::Eof => write!(f, "end of statement"),
        }
    }
}

struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, SqlError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn next_token(&mut self) -> Result<Token, SqlError> {
        while self.peek().is_some_and(char::is_whitespace) {
            self.position += 1;
        }

        let Some(ch) = self.peek() else {
            return Ok(Token::Eof);
        };

        let single = match ch {
            ',' => Some(Token::Comma),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '=' => Some(Token::Eq),
            '*' => Some(Token::Star),
            '?' => Some(Token::Param),
            ';' => Some(Token::Semicolon),
            _ => None,
        };
        if let Some(token) = single {
            self.position += 1;
            return Ok(token);
        }

        if ch == '\'' {
            return self.read_string();
        }
        if ch.is_ascii_digit() || (ch == '-' && self.next_is_digit()) {
            return self.read_number();
        }
        if ch.is_alphabetic() || ch == '_' {
            let start = self.position;
            while self
                .peek()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
            {
                self.position += 1;
            }
            return Ok(Token::Word(self.input[start..self.position].iter().collect()));
        }

        Err(SqlError::UnexpectedCharacter {
            ch,
            position: self.position,
        })
    }

    fn next_is_digit(&self) -> bool {
        self.input
            .get(self.position + 1)
            .is_some_and(char::is_ascii_digit)
    }

    fn read_string(&mut self) -> Result<Token, SqlError> {
        self.position += 1;
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(SqlError::UnterminatedString),
                Some('\'') => {
                    self.position += 1;
                    // '' is an escaped quote
                    if self.peek() == Some('\'') {
                        text.push('\'');
                        self.position += 1;
                    } else {
                        return Ok(Token::Str(text));
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.position += 1;
                }
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, SqlError> {
        let start = self.position;
        self.position += 1;
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.position += 1;
            } else if c == '.' && !is_float {
                is_float = true;
                self.position += 1;
            } else {
                break;
            }
        }
        let text: String = self.input[start..self.position].iter().collect();
        if is_float {
            text.parse()
                .map(Token::Float)
                .map_err(|_| SqlError::InvalidNumber(text))
        } else {
            text.parse()
                .map(Token::Integer)
                .map_err(|_| SqlError::InvalidNumber(text))
        }
    }
}

/// A value position in a statement: a placeholder or a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// The n-th `?` placeholder, zero-based.
    Param(usize),
    /// An inline literal.
    Literal(Value),
}

impl Operand {
    /// Resolves the operand against the bound parameters.
    pub fn bind<'a>(&'a self, params: &'a [Value]) -> Result<&'a Value, SqlError> {
        match self {
            Operand::Param(i) => params.get(*i).ok_or(SqlError::MissingParameter(*i)),
            Operand::Literal(value) => Ok(value),
        }
    }
}

/// A column declared by `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Declared `PRIMARY KEY`.
    pub primary_key: bool,
    /// Declared `AUTOINCREMENT`.
    pub autoincrement: bool,
    /// Declared `UNIQUE`.
    pub unique: bool,
}

/// `field = operand` in a `WHERE` or `SET` clause.
pub type Assignment = (String, Operand);

/// A parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `CREATE TABLE`.
    CreateTable {
        /// Table name.
        table: String,
        /// Whether `IF NOT EXISTS` was given.
        if_not_exists: bool,
        /// Declared columns.
        columns: Vec<ColumnDef>,
    },
    /// `INSERT INTO`.
    Insert {
        /// Table name.
        table: String,
        /// Column list.
        columns: Vec<String>,
        /// One operand per column.
        values: Vec<Operand>,
    },
    /// `SELECT * FROM`.
    Select {
        /// Table name.
        table: String,
        /// Equality conjunction.
        filter: Vec<Assignment>,
        /// Sort field and whether it is descending.
        order_by: Option<(String, bool)>,
        /// Row limit.
        limit: Option<Operand>,
    },
    /// `UPDATE ... SET`.
    Update {
        /// Table name.
        table: String,
        /// Columns to set.
        assignments: Vec<Assignment>,
        /// Equality conjunction.
        filter: Vec<Assignment>,
    },
    /// `DELETE FROM`.
    Delete {
        /// Table name.
        table: String,
        /// Equality conjunction.
        filter: Vec<Assignment>,
    },
}

impl Statement {
    /// Parses one statement.
    pub fn parse(text: &str) -> Result<Self, SqlError> {
        let tokens = Lexer::new(text).tokenize()?;
        let mut parser = Parser {
            tokens,
            position: 0,
            params: 0,
        };
        let statement = parser.statement()?;
        if parser.current() == &Token::Semicolon {
            parser.advance();
        }
        parser.expect(&Token::Eof)?;
        Ok(statement)
    }

    /// Parses a statement and checks that `params` matches its placeholders.
    pub fn parse_with_params(text: &str, params: &[Value]) -> Result<Self, SqlError> {
        let tokens = Lexer::new(text).tokenize()?;
        let expected = tokens.iter().filter(|t| **t == Token::Param).count();
        if expected != params.len() {
            return Err(SqlError::ParameterCount {
                expected,
                given: params.len(),
            });
        }
        Self::parse(text)
    }

    /// Returns the table the statement targets.
    pub fn table(&self) -> &str {
        match self {
            Statement::CreateTable { table, .. }
            | Statement::Insert { table, .. }
            | Statement::Select { table, .. }
            | Statement::Update { table, .. }
            | Statement::Delete { table, .. } => table,
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    params: usize,
}

impl Parser {
    fn current(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn unexpected<T>(&self, expected: &str) -> Result<T, SqlError> {
        Err(SqlError::UnexpectedToken {
            expected: expected.to_string(),
            found: self.current().to_string(),
        })
    }

    fn expect(&mut self, token: &Token) -> Result<(), SqlError> {
        if self.current() == token {
            self.advance();
            Ok(())
        } else {
            self.unexpected(&token.to_string())
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.current(), Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), SqlError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            self.unexpected(keyword)
        }
    }

    fn identifier(&mut self) -> Result<String, SqlError> {
        if let Token::Word(word) = self.current().clone() {
            self.advance();
            Ok(word)
        } else {
            self.unexpected("identifier")
        }
    }

    fn operand(&mut self) -> Result<Operand, SqlError> {
        let operand = match self.current().clone() {
            Token::Param => {
                let index = self.params;
                self.params += 1;
                Operand::Param(index)
            }
            Token::Integer(i) => Operand::Literal(Value::from(i)),
            Token::Float(x) => Operand::Literal(Value::from(x)),
            Token::Str(s) => Operand::Literal(Value::String(s)),
            Token::Word(w) if w.eq_ignore_ascii_case("NULL") => Operand::Literal(Value::Null),
            Token::Word(w) if w.eq_ignore_ascii_case("TRUE") => Operand::Literal(Value::Bool(true)),
            Token::Word(w) if w.eq_ignore_ascii_case("FALSE") => {
                Operand::Literal(Value::Bool(false))
            }
            _ => return self.unexpected("value or ?"),
        };
        self.advance();
        Ok(operand)
    }

    fn statement(&mut self) -> Result<Statement, SqlError> {
        if self.eat_keyword("CREATE") {
            self.create_table()
        } else if self.eat_keyword("INSERT") {
            self.insert()
        } else if self.eat_keyword("SELECT") {
            self.select()
        } else if self.eat_keyword("UPDATE") {
            self.update()
        } else if self.eat_keyword("DELETE") {
            self.delete()
        } else {
            self.unexpected("CREATE, INSERT, SELECT, UPDATE or DELETE")
        }
    }

    fn create_table(&mut self) -> Result<Statement, SqlError> {
        self.expect_keyword("TABLE")?;
        let if_not_exists = if self.eat_keyword("IF") {
            self.expect_keyword("NOT")?;
            self.expect_keyword("EXISTS")?;
            true
        } else {
            false
        };
        let table = self.identifier()?;
        self.expect(&Token::LeftParen)?;

        let mut columns = Vec::new();
        loop {
            if self.is_keyword("FOREIGN") || self.is_keyword("PRIMARY") || self.is_keyword("UNIQUE")
            {
                // Table constraints are accepted and ignored.
                self.skip_definition()?;
            } else {
                columns.push(self.column_def()?);
            }
            match self.current() {
                Token::Comma => self.advance(),
                Token::RightParen => {
                    self.advance();
                    break;
                }
                _ => return self.unexpected(", or )"),
            }
        }

        Ok(Statement::CreateTable {
            table,
            if_not_exists,
            columns,
        })
    }

    fn column_def(&mut self) -> Result<ColumnDef, SqlError> {
        let name = self.identifier()?;
        let mut column = ColumnDef {
            name,
            primary_key: false,
            autoincrement: false,
            unique: false,
        };
        let mut previous_primary = false;
        let mut depth = 0usize;
        loop {
            match self.current() {
                Token::Comma | Token::RightParen if depth == 0 => return Ok(column),
                Token::Eof => return self.unexpected(", or )"),
                Token::LeftParen => depth += 1,
                Token::RightParen => depth -= 1,
                Token::Word(w) => {
                    let upper = w.to_ascii_uppercase();
                    match upper.as_str() {
                        "KEY" if previous_primary => column.primary_key = true,
                        "AUTOINCREMENT" => column.autoincrement = true,
                        "UNIQUE" => column.unique = true,
                        _ => {}
                    }
                    previous_primary = upper == "PRIMARY";
                    self.advance();
                    continue;
                }
                _ => {}
            }
            previous_primary = false;
            self.advance();
        }
    }

    fn skip_definition(&mut self) -> Result<(), SqlError> {
        let mut depth = 0usize;
        loop {
            match self.current() {
                Token::Comma | Token::RightParen if depth == 0 => return Ok(()),
                Token::Eof => return self.unexpected(", or )"),
                Token::LeftParen => depth += 1,
                Token::RightParen => depth -= 1,
                _ => {}
            }
            self.advance();
        }
    }

    fn insert(&mut self) -> Result<Statement, SqlError> {
        self.expect_keyword("INTO")?;
        let table = self.identifier()?;

        self.expect(&Token::LeftParen)?;
        let mut columns = vec![self.identifier()?];
        while self.current() == &Token::Comma {
            self.advance();
            columns.push(self.identifier()?);
        }
        self.expect(&Token::RightParen)?;

        self.expect_keyword("VALUES")?;
        self.expect(&Token::LeftParen)?;
        let mut values = vec![self.operand()?];
        while self.current() == &Token::Comma {
            self.advance();
            values.push(self.operand()?);
        }
        self.expect(&Token::RightParen)?;

        if columns.len() != values.len() {
            return Err(SqlError::UnexpectedToken {
                expected: format!("{} values", columns.len()),
                found: format!("{} values", values.len()),
            });
        }

        Ok(Statement::Insert {
            table,
            columns,
            values,
        })
    }

    fn select(&mut self) -> Result<Statement, SqlError> {
        self.expect(&Token::Star)?;
        self.expect_keyword("FROM")?;
        let table = self.identifier()?;
        let filter = self.where_clause()?;

        let order_by = if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            let field = self.identifier()?;
            let descending = if self.eat_keyword("DESC") {
                true
            } else {
                self.eat_keyword("ASC");
                false
            };
            Some((field, descending))
        } else {
            None
        };

        let limit = if self.eat_keyword("LIMIT") {
            Some(self.operand()?)
        } else {
            None
        };

        Ok(Statement::Select {
            table,
            filter,
            order_by,
            limit,
        })
    }

    fn update(&mut self) -> Result<Statement, SqlError> {
        let table = self.identifier()?;
        self.expect_keyword("SET")?;
        let mut assignments = vec![self.assignment()?];
        while self.current() == &Token::Comma {
            self.advance();
            assignments.push(self.assignment()?);
        }
        let filter = self.where_clause()?;
        Ok(Statement::Update {
            table,
            assignments,
            filter,
        })
    }

    fn delete(&mut self) -> Result<Statement, SqlError> {
        self.expect_keyword("FROM")?;
        let table = self.identifier()?;
        let filter = self.where_clause()?;
        Ok(Statement::Delete { table, filter })
    }

    fn where_clause(&mut self) -> Result<Vec<Assignment>, SqlError> {
        let mut filter = Vec::new();
        if self.eat_keyword("WHERE") {
            filter.push(self.assignment()?);
            while self.eat_keyword("AND") {
                filter.push(self.assignment()?);
            }
        }
        Ok(filter)
    }

    fn assignment(&mut self) -> Result<Assignment, SqlError> {
        let field = self.identifier()?;
        self.expect(&Token::Eq)?;
        Ok((field, self.operand()?))
    }
}
