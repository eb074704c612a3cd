use std::rc::Rc;

use crate::{
    ast::{
        ArrayItem, BinaryOp, CatchClause, ClassDef, Expr, ExprKind, FunctionDef, IterationMode,
        Literal, ObjectEntry, Param, Stmt, StmtKind, UnaryOp,
    },
    diagnostics::{Diagnostic, SourceFile},
    lexer::{Lexer, Token, TokenKind},
    registry::Registry,
};

pub const MAX_NESTING: usize = 256;

const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 2 * 1024 * 1024;

pub fn parse_program(source: &str, registry: &Registry) -> Result<Vec<Stmt>, Diagnostic> {
    let tokens = Lexer::new(source, registry.keywords()).tokenize()?;
    Parser::new(tokens, registry).parse_program()
}

/// Recursive-descent parser. Newline tokens are skipped by `peek` and
/// `advance`; they only matter where an operator or bracket on a later line
/// must not continue the expression before it, and between statements.
///
/// The public primitives are what registered statement parsers build with.
pub struct Parser<'r> {
    tokens: Vec<Token>,
    current: usize,
    last: usize,
    registry: &'r Registry,
    origin: Option<Rc<SourceFile>>,
    depth: usize,
}

impl<'r> Parser<'r> {
    pub fn new(tokens: Vec<Token>, registry: &'r Registry) -> Self {
        Self {
            tokens,
            current: 0,
            last: 0,
            registry,
            origin: None,
            depth: 0,
        }
    }

    pub fn with_origin(mut self, origin: Rc<SourceFile>) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    pub fn parse_program(&mut self) -> Result<Vec<Stmt>, Diagnostic> {
        let mut statements = Vec::new();
        loop {
            while self.matches_symbol(';') {}
            if self.is_at_end() {
                break;
            }
            statements.push(self.parse_statement()?);
            self.expect_terminator()?;
        }
        Ok(statements)
    }

    pub fn parse_standalone_expression(&mut self) -> Result<Expr, Diagnostic> {
        let expr = self.parse_expression()?;
        if !self.is_at_end() {
            let token = self.peek().clone();
            return Err(self.error(&token, &format!("unexpected {}", token.describe())));
        }
        Ok(expr)
    }

    pub fn parse_block(&mut self) -> Result<Vec<Stmt>, Diagnostic> {
        let open = self.consume_symbol('{', "expected `{` to start block")?;
        let mut statements = Vec::new();
        loop {
            while self.matches_symbol(';') {}
            if self.check_symbol('}') {
                break;
            }
            if self.is_at_end() {
                return Err(Diagnostic::parser(
                    format!(
                        "unexpected end of input inside block opened on line {}",
                        open.line + 1
                    ),
                    self.peek().line,
                ));
            }
            statements.push(self.parse_statement()?);
            self.expect_terminator()?;
        }
        self.consume_symbol('}', "expected `}` to close block")?;
        Ok(statements)
    }

    pub fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        self.nested(Self::parse_statement_kind)
    }

    fn parse_statement_kind(&mut self) -> Result<Stmt, Diagnostic> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Symbol('{') => {
                let body = self.parse_block()?;
                Ok(self.stmt_at(StmtKind::Block(body), token.line))
            }
            TokenKind::Annotation(_) => self.parse_annotated(),
            TokenKind::Keyword(keyword) => match keyword.as_str() {
                "function" if matches!(self.peek_nth(1).kind, TokenKind::Identifier(_)) => {
                    self.advance();
                    let def = self.parse_function_rest(token.line, Vec::new(), true)?;
                    Ok(self.stmt_at(StmtKind::Function(def), token.line))
                }
                "class" => {
                    self.advance();
                    self.parse_class(token.line, Vec::new())
                }
                "if" => self.parse_if(),
                "while" => self.parse_while(),
                "for" => self.parse_for(),
                "break" => {
                    self.advance();
                    Ok(self.stmt_at(StmtKind::Break, token.line))
                }
                "continue" => {
                    self.advance();
                    Ok(self.stmt_at(StmtKind::Continue, token.line))
                }
                "return" => self.parse_return(),
                "throw" => {
                    self.advance();
                    let value = self.parse_expression()?;
                    Ok(self.stmt_at(StmtKind::Throw(value), token.line))
                }
                "try" => self.parse_try(),
                other => match self.registry.statement(other) {
                    Some(handler) => {
                        self.advance();
                        handler(self, &token)
                    }
                    None => self.parse_expression_statement(),
                },
            },
            TokenKind::Identifier(_) => self.parse_identifier_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    pub fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        self.nested(Self::parse_ternary)
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, Diagnostic>,
    ) -> Result<T, Diagnostic> {
        if self.depth >= MAX_NESTING {
            return Err(Diagnostic::parser(
                format!("code is nested too deeply (more than {MAX_NESTING} levels)"),
                self.peek().line,
            ));
        }
        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || parse(self));
        self.depth -= 1;
        result
    }

    pub fn stmt_at(&self, kind: StmtKind, line: usize) -> Stmt {
        Stmt {
            kind,
            line,
            origin: self.origin.clone(),
        }
    }

    pub fn expr_at(&self, kind: ExprKind, line: usize) -> Expr {
        Expr {
            kind,
            line,
            origin: self.origin.clone(),
        }
    }

    fn expect_terminator(&mut self) -> Result<(), Diagnostic> {
        if self.matches_symbol(';') {
            return Ok(());
        }
        let next = self.peek().clone();
        let previous_line = self.previous().line;
        if next.line > previous_line
            || matches!(next.kind, TokenKind::Eof | TokenKind::Symbol('}'))
            || matches!(self.previous().kind, TokenKind::Symbol('}'))
        {
            return Ok(());
        }
        Err(self
            .error(
                &next,
                &format!(
                    "expected `;` or a newline before {}",
                    next.describe()
                ),
            )
            .with_suggestion("put each statement on its own line or separate them with `;`"))
    }

    fn parse_annotated(&mut self) -> Result<Stmt, Diagnostic> {
        let mut annotations = Vec::new();
        while let TokenKind::Annotation(name) = &self.peek().kind {
            annotations.push(name.clone());
            self.advance();
        }
        let token = self.peek().clone();
        if self.matches_keyword("function") {
            let def = self.parse_function_rest(token.line, annotations, true)?;
            return Ok(self.stmt_at(StmtKind::Function(def), token.line));
        }
        if self.matches_keyword("class") {
            return self.parse_class(token.line, annotations);
        }
        Err(self.error(
            &token,
            "annotations must be followed by a function or class declaration",
        ))
    }

    fn parse_function_rest(
        &mut self,
        line: usize,
        annotations: Vec<String>,
        require_name: bool,
    ) -> Result<Rc<FunctionDef>, Diagnostic> {
        let name = match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ if require_name => {
                let token = self.peek().clone();
                return Err(self.error(&token, "expected function name"));
            }
            _ => None,
        };
        let (params, rest) = self.parse_params()?;
        let body = self.parse_block()?;
        Ok(Rc::new(FunctionDef {
            name,
            params,
            rest,
            body,
            annotations,
            line,
        }))
    }

    fn parse_params(&mut self) -> Result<(Vec<Param>, Option<String>), Diagnostic> {
        self.consume_symbol('(', "expected `(` before parameters")?;
        let mut params = Vec::new();
        let mut rest = None;
        while !self.check_symbol(')') {
            if self.matches_operator("...") {
                let name = self.consume_identifier("expected rest parameter name after `...`")?;
                rest = Some(name);
                if !self.check_symbol(')') {
                    let token = self.peek().clone();
                    return Err(self.error(&token, "rest parameter must be the last parameter"));
                }
                break;
            }
            let name = self.consume_identifier("expected parameter name")?;
            let default = if self.matches_operator("=") {
                Some(self.parse_expression()?)
            } else {
                None
            };
            params.push(Param { name, default });
            if !self.matches_symbol(',') {
                break;
            }
        }
        self.consume_symbol(')', "expected `)` after parameters")?;
        Ok((params, rest))
    }

    fn parse_class(&mut self, line: usize, annotations: Vec<String>) -> Result<Stmt, Diagnostic> {
        let name = self.consume_identifier("expected class name")?;
        let parent = if self.matches_keyword("extends") {
            Some(self.consume_identifier("expected parent class name after `extends`")?)
        } else {
            None
        };
        self.consume_symbol('{', "expected `{` to start class body")?;
        let mut methods = Vec::new();
        loop {
            while self.matches_symbol(';') {}
            if self.check_symbol('}') || self.is_at_end() {
                break;
            }
            let mut method_annotations = Vec::new();
            while let TokenKind::Annotation(annotation) = &self.peek().kind {
                method_annotations.push(annotation.clone());
                self.advance();
            }
            self.matches_keyword("function");
            let token = self.advance();
            let method_name = match &token.kind {
                TokenKind::Identifier(name) | TokenKind::Keyword(name) => name.clone(),
                _ => {
                    return Err(self.error(
                        &token,
                        &format!("expected method name, found {}", token.describe()),
                    ))
                }
            };
            let (params, rest) = self.parse_params()?;
            let body = self.parse_block()?;
            methods.push(Rc::new(FunctionDef {
                name: Some(method_name),
                params,
                rest,
                body,
                annotations: method_annotations,
                line: token.line,
            }));
        }
        self.consume_symbol('}', "expected `}` to close class body")?;
        Ok(self.stmt_at(
            StmtKind::Class(Rc::new(ClassDef {
                name,
                parent,
                methods,
                annotations,
            })),
            line,
        ))
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let keyword = self.advance();
        self.consume_symbol('(', "expected `(` after `if`")?;
        let condition = self.parse_expression()?;
        self.consume_symbol(')', "expected `)` after if condition")?;
        let then_branch = Box::new(self.parse_statement()?);
        if self.check_symbol(';')
            && matches!(&self.peek_nth(1).kind, TokenKind::Keyword(kw) if kw == "else")
        {
            self.advance();
        }
        let else_branch = if self.matches_keyword("else") {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(self.stmt_at(
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            keyword.line,
        ))
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        let keyword = self.advance();
        self.consume_symbol('(', "expected `(` after `while`")?;
        let condition = self.parse_expression()?;
        self.consume_symbol(')', "expected `)` after while condition")?;
        let body = Box::new(self.parse_statement()?);
        Ok(self.stmt_at(StmtKind::While { condition, body }, keyword.line))
    }

    fn parse_for(&mut self) -> Result<Stmt, Diagnostic> {
        let keyword = self.advance();
        self.consume_symbol('(', "expected `(` after `for`")?;

        let mode = match (&self.peek().kind, &self.peek_nth(1).kind) {
            (TokenKind::Identifier(_), TokenKind::Identifier(word)) if word == "of" => {
                Some(IterationMode::Of)
            }
            (TokenKind::Identifier(_), TokenKind::Identifier(word)) if word == "in" => {
                Some(IterationMode::In)
            }
            _ => None,
        };
        if let Some(mode) = mode {
            let binding = self.consume_identifier("expected loop variable")?;
            self.advance();
            let iterable = self.parse_expression()?;
            self.consume_symbol(')', "expected `)` after loop iterable")?;
            let body = Box::new(self.parse_statement()?);
            return Ok(self.stmt_at(
                StmtKind::ForEach {
                    binding,
                    mode,
                    iterable,
                    body,
                },
                keyword.line,
            ));
        }

        let init = if self.check_symbol(';') {
            None
        } else {
            Some(Box::new(self.parse_statement()?))
        };
        self.consume_symbol(';', "expected `;` after for-loop initializer")?;
        let condition = if self.check_symbol(';') {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_symbol(';', "expected `;` after for-loop condition")?;
        let update = if self.check_symbol(')') {
            None
        } else {
            Some(Box::new(self.parse_statement()?))
        };
        self.consume_symbol(')', "expected `)` after for-loop clauses")?;
        let body = Box::new(self.parse_statement()?);
        Ok(self.stmt_at(
            StmtKind::ForClassic {
                init,
                condition,
                update,
                body,
            },
            keyword.line,
        ))
    }

    fn parse_return(&mut self) -> Result<Stmt, Diagnostic> {
        let keyword = self.advance();
        let next = self.peek();
        let bare = next.line > keyword.line
            || matches!(
                next.kind,
                TokenKind::Eof | TokenKind::Symbol(';') | TokenKind::Symbol('}')
            );
        let value = if bare {
            None
        } else {
            Some(self.parse_expression()?)
        };
        Ok(self.stmt_at(StmtKind::Return(value), keyword.line))
    }

    fn parse_try(&mut self) -> Result<Stmt, Diagnostic> {
        let keyword = self.advance();
        let body = self.parse_block()?;
        let catch = if self.matches_keyword("catch") {
            let binding = if self.matches_symbol('(') {
                let name = self.consume_identifier("expected catch binding name")?;
                self.consume_symbol(')', "expected `)` after catch binding")?;
                Some(name)
            } else {
                None
            };
            let body = self.parse_block()?;
            Some(CatchClause { binding, body })
        } else {
            None
        };
        let finally = if self.matches_keyword("finally") {
            Some(self.parse_block()?)
        } else {
            None
        };
        if catch.is_none() && finally.is_none() {
            let token = self.peek().clone();
            return Err(self.error(&token, "expected `catch` or `finally` after try block"));
        }
        Ok(self.stmt_at(
            StmtKind::Try {
                body,
                catch,
                finally,
            },
            keyword.line,
        ))
    }

    fn parse_identifier_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let name_token = self.peek().clone();
        let follower = self.peek_nth(1).clone();
        let same_line = follower.line == name_token.line;
        if let (TokenKind::Identifier(name), TokenKind::Operator(op)) =
            (&name_token.kind, &follower.kind)
        {
            if same_line && *op == "=" {
                self.advance();
                self.advance();
                let value = self.parse_expression()?;
                return Ok(self.stmt_at(
                    StmtKind::Assign {
                        name: name.clone(),
                        value,
                    },
                    name_token.line,
                ));
            }
            if let (true, Some(op)) = (same_line, BinaryOp::from_compound(op)) {
                self.advance();
                self.advance();
                let value = self.parse_expression()?;
                return Ok(self.stmt_at(
                    StmtKind::CompoundAssign {
                        name: name.clone(),
                        op,
                        value,
                    },
                    name_token.line,
                ));
            }
        }
        self.parse_expression_statement()
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let expr = self.parse_expression()?;
        let line = expr.line;
        let next = self.peek().clone();
        let assignment = match &next.kind {
            TokenKind::Operator("=") => Some(None),
            TokenKind::Operator(op) => BinaryOp::from_compound(op).map(Some),
            _ => None,
        };
        let Some(op) = assignment.filter(|_| next.line == self.previous().line) else {
            return Ok(self.stmt_at(StmtKind::Expression(expr), line));
        };
        self.advance();
        let value = self.parse_expression()?;
        match expr.kind {
            ExprKind::Identifier(name) => Ok(self.stmt_at(
                match op {
                    None => StmtKind::Assign { name, value },
                    Some(op) => StmtKind::CompoundAssign { name, op, value },
                },
                line,
            )),
            ExprKind::Member { .. } | ExprKind::Index { .. } => Ok(self.stmt_at(
                StmtKind::MemberAssign {
                    target: expr,
                    op,
                    value,
                },
                line,
            )),
            _ => Err(self.error(&next, "invalid assignment target")),
        }
    }

    fn parse_ternary(&mut self) -> Result<Expr, Diagnostic> {
        let condition = self.parse_or()?;
        if !self.matches_binary("?") {
            return Ok(condition);
        }
        let then_branch = self.parse_expression()?;
        self.consume_symbol(':', "expected `:` in conditional expression")?;
        let else_branch = self.parse_expression()?;
        let line = condition.line;
        Ok(self.expr_at(
            ExprKind::Ternary {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            line,
        ))
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_binary_level(&[("||", BinaryOp::Or)], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_binary_level(&[("&&", BinaryOp::And)], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_binary_level(
            &[
                ("===", BinaryOp::StrictEqual),
                ("!==", BinaryOp::StrictNotEqual),
                ("==", BinaryOp::Equal),
                ("!=", BinaryOp::NotEqual),
            ],
            Self::parse_relational,
        )
    }

    fn parse_relational(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_binary_level(
            &[
                ("<=", BinaryOp::LessEqual),
                (">=", BinaryOp::GreaterEqual),
                ("<", BinaryOp::Less),
                (">", BinaryOp::Greater),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_binary_level(
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_binary_level(
            &[
                ("*", BinaryOp::Mul),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Mod),
            ],
            Self::parse_unary,
        )
    }

    fn parse_binary_level(
        &mut self,
        operators: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, Diagnostic>,
    ) -> Result<Expr, Diagnostic> {
        let mut expr = next(self)?;
        'outer: loop {
            for (symbol, op) in operators {
                if self.matches_binary(symbol) {
                    let right = next(self)?;
                    let line = expr.line;
                    expr = self.expr_at(
                        ExprKind::Binary {
                            op: *op,
                            left: Box::new(expr),
                            right: Box::new(right),
                        },
                        line,
                    );
                    continue 'outer;
                }
            }
            return Ok(expr);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let token = self.peek().clone();
        let op = match token.kind {
            TokenKind::Operator("!") => Some(UnaryOp::Not),
            TokenKind::Operator("-") => Some(UnaryOp::Negate),
            TokenKind::Operator("+") => Some(UnaryOp::Plus),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let expr = self.nested(Self::parse_unary)?;
            return Ok(self.expr_at(
                ExprKind::Unary {
                    op,
                    expr: Box::new(expr),
                },
                token.line,
            ));
        }
        if let TokenKind::Operator(symbol @ ("++" | "--")) = token.kind {
            self.advance();
            let target = self.nested(Self::parse_unary)?;
            self.ensure_assignable(&target, &token)?;
            return Ok(self.expr_at(
                ExprKind::Increment {
                    target: Box::new(target),
                    delta: if symbol == "++" { 1 } else { -1 },
                    prefix: true,
                },
                token.line,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches_symbol('.') {
                let token = self.advance();
                let property = match &token.kind {
                    TokenKind::Identifier(name) | TokenKind::Keyword(name) => name.clone(),
                    _ => {
                        return Err(self.error(
                            &token,
                            &format!("expected property name after `.`, found {}", token.describe()),
                        ))
                    }
                };
                let line = expr.line;
                if self.check_same_line_symbol('(') {
                    let args = self.parse_arguments()?;
                    expr = self.expr_at(
                        ExprKind::MethodCall {
                            object: Box::new(expr),
                            method: property,
                            args,
                        },
                        line,
                    );
                } else {
                    expr = self.expr_at(
                        ExprKind::Member {
                            object: Box::new(expr),
                            property,
                        },
                        line,
                    );
                }
            } else if self.check_same_line_symbol('(') {
                let args = self.parse_arguments()?;
                let line = expr.line;
                expr = self.expr_at(
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    line,
                );
            } else if self.check_same_line_symbol('[') {
                self.advance();
                let index = self.parse_expression()?;
                self.consume_symbol(']', "expected `]` after index")?;
                let line = expr.line;
                expr = self.expr_at(
                    ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    line,
                );
            } else if let Some(delta) = self.postfix_increment() {
                let token = self.advance();
                self.ensure_assignable(&expr, &token)?;
                let line = expr.line;
                return Ok(self.expr_at(
                    ExprKind::Increment {
                        target: Box::new(expr),
                        delta,
                        prefix: false,
                    },
                    line,
                ));
            } else {
                return Ok(expr);
            }
        }
    }

    fn postfix_increment(&self) -> Option<i8> {
        let next = self.peek();
        if next.line != self.previous().line {
            return None;
        }
        match next.kind {
            TokenKind::Operator("++") => Some(1),
            TokenKind::Operator("--") => Some(-1),
            _ => None,
        }
    }

    fn ensure_assignable(&self, target: &Expr, token: &Token) -> Result<(), Diagnostic> {
        match target.kind {
            ExprKind::Identifier(_) | ExprKind::Member { .. } | ExprKind::Index { .. } => Ok(()),
            _ => Err(self.error(
                token,
                "increment target must be a variable, property or index",
            )),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, Diagnostic> {
        self.consume_symbol('(', "expected `(`")?;
        let mut args = Vec::new();
        while !self.check_symbol(')') {
            args.push(self.parse_expression()?);
            if !self.matches_symbol(',') {
                break;
            }
        }
        self.consume_symbol(')', "expected `)` after arguments")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let token = self.peek().clone();
        let line = token.line;
        match &token.kind {
            TokenKind::Number(number) => {
                self.advance();
                let literal = match &number.big {
                    Some(big) => Literal::BigInt(big.clone()),
                    None => Literal::Number(number.value),
                };
                Ok(self.expr_at(ExprKind::Literal(literal), line))
            }
            TokenKind::String(text) => {
                self.advance();
                Ok(self.expr_at(ExprKind::Literal(Literal::String(text.clone())), line))
            }
            TokenKind::Template(template) => {
                self.advance();
                Ok(self.expr_at(
                    ExprKind::Template {
                        strings: template.strings.clone(),
                        exprs: template.exprs.clone(),
                    },
                    line,
                ))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.check_same_line_operator("=>") {
                    let params = vec![Param {
                        name: name.clone(),
                        default: None,
                    }];
                    return self.parse_arrow_body(params, None, line);
                }
                Ok(self.expr_at(ExprKind::Identifier(name.clone()), line))
            }
            TokenKind::Keyword(keyword) if keyword == "function" => {
                self.advance();
                let def = self.parse_function_rest(line, Vec::new(), false)?;
                Ok(self.expr_at(ExprKind::Function(def), line))
            }
            TokenKind::Keyword(keyword) => {
                let statement_only = (Registry::is_builtin_keyword(keyword) && keyword != "this")
                    || self.registry.statement(keyword).is_some();
                if statement_only {
                    return Err(self.error(
                        &token,
                        &format!("unexpected keyword `{keyword}` in expression"),
                    ));
                }
                self.advance();
                Ok(self.expr_at(ExprKind::Keyword(keyword.clone()), line))
            }
            TokenKind::Symbol('(') => {
                if let Some(arrow) = self.try_parse_arrow()? {
                    return Ok(arrow);
                }
                self.advance();
                let expr = self.parse_expression()?;
                self.consume_symbol(')', "expected `)` after expression")?;
                Ok(expr)
            }
            TokenKind::Symbol('[') => self.parse_array(),
            TokenKind::Symbol('{') => self.parse_object(),
            TokenKind::Eof => Err(self.error(&token, "unexpected end of input")),
            _ => Err(self.error(&token, &format!("unexpected {}", token.describe()))),
        }
    }

    fn try_parse_arrow(&mut self) -> Result<Option<Expr>, Diagnostic> {
        let checkpoint = (self.current, self.last);
        let line = self.peek().line;
        match self.parse_params() {
            Ok((params, rest)) if self.check_same_line_operator("=>") => {
                self.parse_arrow_body(params, rest, line).map(Some)
            }
            _ => {
                (self.current, self.last) = checkpoint;
                Ok(None)
            }
        }
    }

    fn parse_arrow_body(
        &mut self,
        params: Vec<Param>,
        rest: Option<String>,
        line: usize,
    ) -> Result<Expr, Diagnostic> {
        self.consume_operator("=>", "expected `=>`")?;
        let body = if self.check_symbol('{') {
            self.parse_block()?
        } else {
            let value = self.parse_expression()?;
            let value_line = value.line;
            vec![self.stmt_at(StmtKind::Return(Some(value)), value_line)]
        };
        let def = FunctionDef {
            name: None,
            params,
            rest,
            body,
            annotations: Vec::new(),
            line,
        };
        Ok(self.expr_at(ExprKind::Function(Rc::new(def)), line))
    }

    fn parse_array(&mut self) -> Result<Expr, Diagnostic> {
        let open = self.advance();
        let mut items = Vec::new();
        while !self.check_symbol(']') {
            if self.matches_operator("...") {
                items.push(ArrayItem::Spread(self.parse_expression()?));
            } else {
                items.push(ArrayItem::Item(self.parse_expression()?));
            }
            if !self.matches_symbol(',') {
                break;
            }
        }
        self.consume_symbol(']', "expected `]` after array elements")?;
        Ok(self.expr_at(ExprKind::Array(items), open.line))
    }

    fn parse_object(&mut self) -> Result<Expr, Diagnostic> {
        let open = self.advance();
        let mut entries = Vec::new();
        while !self.check_symbol('}') {
            if self.matches_operator("...") {
                entries.push(ObjectEntry::Spread(self.parse_expression()?));
            } else {
                let token = self.advance();
                let (key, shorthand) = match &token.kind {
                    TokenKind::Identifier(name) => (name.clone(), true),
                    TokenKind::Keyword(name) | TokenKind::String(name) => (name.clone(), false),
                    TokenKind::Number(number) => (crate::value::format_number(number.value), false),
                    _ => {
                        return Err(self.error(
                            &token,
                            &format!("expected property name, found {}", token.describe()),
                        ))
                    }
                };
                if self.matches_symbol(':') {
                    entries.push(ObjectEntry::KeyValue(key, self.parse_expression()?));
                } else if shorthand {
                    entries.push(ObjectEntry::Shorthand(key));
                } else {
                    let next = self.peek().clone();
                    return Err(self.error(&next, "expected `:` after property name"));
                }
            }
            if !self.matches_symbol(',') {
                break;
            }
        }
        self.consume_symbol('}', "expected `}` after object entries")?;
        Ok(self.expr_at(ExprKind::Object(entries), open.line))
    }

    pub fn peek(&self) -> &Token {
        self.peek_nth(0)
    }

    pub fn peek_nth(&self, n: usize) -> &Token {
        let mut seen = 0;
        let mut index = self.current;
        while let Some(token) = self.tokens.get(index) {
            match token.kind {
                TokenKind::Newline => {}
                TokenKind::Eof => return token,
                _ if seen == n => return token,
                _ => seen += 1,
            }
            index += 1;
        }
        self.eof_token()
    }

    pub fn advance(&mut self) -> Token {
        while matches!(
            self.tokens.get(self.current).map(|t| &t.kind),
            Some(TokenKind::Newline)
        ) {
            self.current += 1;
        }
        if self.current < self.tokens.len() {
            let token = self.tokens[self.current].clone();
            if token.kind != TokenKind::Eof {
                self.last = self.current;
                self.current += 1;
            }
            token
        } else {
            self.eof_token().clone()
        }
    }

    pub fn previous(&self) -> &Token {
        self.tokens.get(self.last).unwrap_or_else(|| self.eof_token())
    }

    pub fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    pub fn check_symbol(&self, symbol: char) -> bool {
        self.peek().kind == TokenKind::Symbol(symbol)
    }

    pub fn check_operator(&self, op: &str) -> bool {
        matches!(self.peek().kind, TokenKind::Operator(found) if found == op)
    }

    pub fn check_keyword(&self, keyword: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Keyword(found) if found == keyword)
    }

    fn check_same_line_symbol(&self, symbol: char) -> bool {
        self.check_symbol(symbol) && self.peek().line == self.previous().line
    }

    fn check_same_line_operator(&self, op: &str) -> bool {
        self.check_operator(op) && self.peek().line == self.previous().line
    }

    pub fn matches_symbol(&mut self, symbol: char) -> bool {
        if self.check_symbol(symbol) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn matches_operator(&mut self, op: &str) -> bool {
        if self.check_operator(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn matches_keyword(&mut self, keyword: &str) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_binary(&mut self, op: &str) -> bool {
        if self.check_same_line_operator(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn consume_symbol(&mut self, symbol: char, message: &str) -> Result<Token, Diagnostic> {
        if self.check_symbol(symbol) {
            Ok(self.advance())
        } else {
            let token = self.peek().clone();
            Err(self
                .error(&token, &format!("{message}, found {}", token.describe()))
                .with_expected(format!("`{symbol}`"))
                .with_got(token.describe()))
        }
    }

    pub fn consume_operator(&mut self, op: &str, message: &str) -> Result<Token, Diagnostic> {
        if self.check_operator(op) {
            Ok(self.advance())
        } else {
            let token = self.peek().clone();
            Err(self
                .error(&token, &format!("{message}, found {}", token.describe()))
                .with_expected(format!("`{op}`"))
                .with_got(token.describe()))
        }
    }

    pub fn consume_identifier(&mut self, message: &str) -> Result<String, Diagnostic> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(&token, &format!("{message}, found {}", token.describe()))),
        }
    }

    pub fn error(&self, token: &Token, message: &str) -> Diagnostic {
        let diag = Diagnostic::parser(message, token.line);
        match &self.origin {
            Some(origin) => diag.with_source(Rc::clone(origin)),
            None => diag,
        }
    }

    fn eof_token(&self) -> &Token {
        static EOF: Token = Token {
            kind: TokenKind::Eof,
            line: 0,
        };
        self.tokens
            .iter()
            .rev()
            .find(|token| token.kind == TokenKind::Eof)
            .unwrap_or(&EOF)
    }
}
