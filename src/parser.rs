//! Parser
//!
//! Recursive descent for statements and declarations, a Pratt binding-power
//! loop for expressions. The parser is a pure function of the token stream:
//! it produces one AST and a list of syntax diagnostics, recovering at
//! statement boundaries so later errors are still reported.

use crate::ast::*;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::lexer::{self, TokenStream};
use crate::source::SourceFile;
use crate::token::{Token, TokenKind};

/// Parse result used for intra-parser control flow; failures are recorded
/// into the accumulated error list at recovery points.
pub type ParseResult<T> = Result<T, Diagnostic>;

/// Binding power of prefix operators: tighter than any infix.
const PREFIX_BP: u8 = 15;

/// Parse one file's token stream into its AST.
pub fn parse(source: &SourceFile, stream: &TokenStream) -> (Node, Vec<Diagnostic>) {
    let (root, errors, _) = parse_with_base(source, stream, 0);
    (root, errors)
}

/// Parse with node ids starting at `base`. Node ids key persistent scopes
/// under the shared global scope, so a multi-file driver must keep them
/// unique across the whole queued set; the next unused id is returned.
pub fn parse_with_base(
    source: &SourceFile,
    stream: &TokenStream,
    base: NodeId,
) -> (Node, Vec<Diagnostic>, NodeId) {
    let mut parser = Parser::new(source, &stream.tokens);
    parser.next_id = base;
    let root = parser.parse_program();
    let next = parser.next_id;
    (root, parser.errors, next)
}

struct Parser<'src> {
    source: &'src SourceFile,
    tokens: &'src [Token],
    pos: usize,
    errors: Vec<Diagnostic>,
    next_id: NodeId,
}

impl<'src> Parser<'src> {
    fn new(source: &'src SourceFile, tokens: &'src [Token]) -> Self {
        let mut parser = Self {
            source,
            tokens,
            pos: 0,
            errors: Vec::new(),
            next_id: 0,
        };
        parser.skip_trivia();
        parser
    }

    // ============ Token navigation ============

    fn skip_trivia(&mut self) {
        while self
            .tokens
            .get(self.pos)
            .map(|t| t.kind.is_trivia())
            .unwrap_or(false)
        {
            self.pos += 1;
        }
    }

    fn current(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .unwrap_or(&self.tokens[self.tokens.len() - 1])
    }

    /// The kind of the nth non-trivia token ahead (0 = current).
    fn peek_kind(&self, n: usize) -> TokenKind {
        let mut seen = 0;
        for token in &self.tokens[self.pos..] {
            if token.kind.is_trivia() {
                continue;
            }
            if seen == n {
                return token.kind;
            }
            seen += 1;
        }
        TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
            self.skip_trivia();
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    fn unexpected(&self, expected: &str) -> Diagnostic {
        let token = self.current();
        let kind = if token.kind == TokenKind::Eof {
            DiagnosticKind::UnexpectedEof
        } else {
            DiagnosticKind::UnexpectedToken {
                expected: expected.to_string(),
                found: token.kind.to_string(),
            }
        };
        Diagnostic::at_token(kind, token)
    }

    fn text(&self, token: &Token) -> &'src str {
        token.text(self.source.text())
    }

    fn is_at_end(&self) -> bool {
        self.check(TokenKind::Eof)
    }

    // ============ Node construction ============

    fn node(&mut self, kind: NodeKind, at: &Token) -> Node {
        let id = self.next_id;
        self.next_id += 1;
        Node::new(id, kind, at.line, at.column)
    }

    // ============ Program ============

    fn parse_program(&mut self) -> Node {
        let start = self.current().clone();
        let mut statements = Vec::new();

        while !self.is_at_end() {
            let attributes = self.parse_attributes();
            match self.parse_top_decl() {
                Ok(mut decl) => {
                    self.attach_attributes(&mut decl, attributes);
                    statements.push(decl);
                }
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                }
            }
        }

        self.node(NodeKind::Block(statements), &start)
    }

    /// Skip to the next statement terminator or declaration keyword. Always
    /// makes progress so a stray token cannot wedge the parser.
    fn synchronize(&mut self) {
        if self.is_at_end() {
            return;
        }
        self.advance();
        while !self.is_at_end() {
            if self.consume(TokenKind::Semicolon) {
                return;
            }
            match self.current().kind {
                TokenKind::Fn
                | TokenKind::Struct
                | TokenKind::Impl
                | TokenKind::Extern
                | TokenKind::Use
                | TokenKind::Namespace
                | TokenKind::Var
                | TokenKind::Let
                | TokenKind::Infix
                | TokenKind::Prefix
                | TokenKind::Suffix => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn parse_top_decl(&mut self) -> ParseResult<Node> {
        match self.current().kind {
            TokenKind::Fn => self.parse_fn(),
            TokenKind::Struct => self.parse_struct(),
            TokenKind::Impl => self.parse_impl(),
            TokenKind::Extern => self.parse_extern(),
            TokenKind::Use => self.parse_use(),
            TokenKind::Namespace => self.parse_namespace(),
            TokenKind::Var | TokenKind::Let => self.parse_dec_stmt(),
            TokenKind::Infix | TokenKind::Prefix | TokenKind::Suffix => self.parse_affix(),
            _ => Err(self.unexpected("declaration")),
        }
    }

    // ============ Attributes ============

    fn parse_attributes(&mut self) -> Vec<Attribute> {
        let mut attributes = Vec::new();
        while self.check(TokenKind::At) {
            let at = self.advance();
            let name = match self.expect(TokenKind::Symbol) {
                Ok(tok) => self.text(&tok).to_string(),
                Err(err) => {
                    self.errors.push(err);
                    break;
                }
            };
            let mut args = Vec::new();
            if self.consume(TokenKind::LParen) {
                while !self.check(TokenKind::RParen) && !self.is_at_end() {
                    match self.parse_expr() {
                        Ok(arg) => args.push(arg),
                        Err(err) => {
                            self.errors.push(err);
                            break;
                        }
                    }
                    if !self.consume(TokenKind::Comma) {
                        break;
                    }
                }
                if let Err(err) = self.expect(TokenKind::RParen) {
                    self.errors.push(err);
                }
            }
            attributes.push(Attribute {
                name,
                args,
                line: at.line,
                column: at.column,
            });
        }
        attributes
    }

    fn attach_attributes(&mut self, node: &mut Node, attributes: Vec<Attribute>) {
        if attributes.is_empty() {
            return;
        }
        let attachable = matches!(
            node.tag(),
            NodeTag::Fn
                | NodeTag::Struct
                | NodeTag::Impl
                | NodeTag::Affix
                | NodeTag::Dec
                | NodeTag::Extern
        );
        if !attachable {
            let attr = &attributes[0];
            let offset = self.source.offset_of(attr.line, attr.column);
            // underline the `@` marker and the attribute name
            self.errors.push(
                Diagnostic::new(
                    DiagnosticKind::InvalidAttribute {
                        name: attr.name.clone(),
                    },
                    attr.line,
                    attr.column,
                    offset,
                )
                .spanning(2),
            );
            return;
        }
        node.attributes = attributes;
    }

    // ============ Declarations ============

    fn parse_fn(&mut self) -> ParseResult<Node> {
        let kw = self.expect(TokenKind::Fn)?;
        let def = self.parse_fn_signature()?;
        let body = self.parse_block()?;
        let def = FnDef {
            body: Some(Box::new(body)),
            ..def
        };
        Ok(self.node(NodeKind::Fn(def), &kw))
    }

    /// `name '(' params? ')' ('->' Type)?` — shared by fn, affix, extern.
    fn parse_fn_signature(&mut self) -> ParseResult<FnDef> {
        let name_tok = self.expect(TokenKind::Symbol)?;
        let name = self.text(&name_tok).to_string();
        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen)?;
        let return_type = if self.consume(TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };
        Ok(FnDef {
            name,
            mangled: None,
            self_type: None,
            params,
            return_type,
            body: None,
        })
    }

    fn parse_params(&mut self) -> ParseResult<Vec<Node>> {
        let mut params = Vec::new();
        if self.check(TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let name_tok = self.expect(TokenKind::Symbol)?;
            let name = self.text(&name_tok).to_string();
            self.expect(TokenKind::Colon)?;
            let ty = self.parse_type()?;
            let dec = Dec {
                name,
                ty: Some(ty),
                value: None,
                immutable: false,
            };
            params.push(self.node(NodeKind::Dec(dec), &name_tok));
            if !self.consume(TokenKind::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_affix(&mut self) -> ParseResult<Node> {
        let kw = self.advance();
        let kind = match kw.kind {
            TokenKind::Prefix => AffixKind::Prefix,
            TokenKind::Infix => AffixKind::Infix,
            TokenKind::Suffix => AffixKind::Suffix,
            _ => return Err(self.unexpected("prefix, infix, or suffix")),
        };
        self.expect(TokenKind::Op)?;

        let op_tok = self.current().clone();
        if !op_tok.kind.is_operator() {
            return Err(self.unexpected("operator"));
        }
        self.advance();
        let name = self.text(&op_tok).to_string();

        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen)?;
        let return_type = if self.consume(TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let body = self.parse_block()?;

        let def = AffixDef {
            kind,
            func: FnDef {
                name,
                mangled: None,
                self_type: None,
                params,
                return_type,
                body: Some(Box::new(body)),
            },
        };
        Ok(self.node(NodeKind::Affix(def), &kw))
    }

    fn parse_struct(&mut self) -> ParseResult<Node> {
        let kw = self.expect(TokenKind::Struct)?;
        let name_tok = self.expect(TokenKind::Symbol)?;
        let name = self.text(&name_tok).to_string();

        let brace = self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            match self.parse_dec_stmt() {
                Ok(field) => fields.push(field),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize_in_block();
                }
            }
        }
        self.expect(TokenKind::RBrace)?;

        let fields = self.node(NodeKind::Block(fields), &brace);
        Ok(self.node(
            NodeKind::Struct {
                name,
                fields: Box::new(fields),
            },
            &kw,
        ))
    }

    fn parse_impl(&mut self) -> ParseResult<Node> {
        let kw = self.expect(TokenKind::Impl)?;
        let name_tok = self.expect(TokenKind::Symbol)?;
        let target = self.text(&name_tok).to_string();

        let brace = self.expect(TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            let result = match self.current().kind {
                TokenKind::Fn => self.parse_fn(),
                TokenKind::Infix | TokenKind::Prefix | TokenKind::Suffix => self.parse_affix(),
                TokenKind::Var | TokenKind::Let => self.parse_dec_stmt(),
                _ => Err(self.unexpected("fn, operator, or declaration")),
            };
            match result {
                Ok(member) => members.push(member),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize_in_block();
                }
            }
        }
        self.expect(TokenKind::RBrace)?;

        let block = self.node(NodeKind::Block(members), &brace);
        Ok(self.node(
            NodeKind::Impl {
                target,
                block: Box::new(block),
            },
            &kw,
        ))
    }

    fn parse_extern(&mut self) -> ParseResult<Node> {
        let kw = self.expect(TokenKind::Extern)?;
        self.expect(TokenKind::LBrace)?;
        let mut decls = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            let result = self.parse_extern_decl();
            match result {
                Ok(decl) => decls.push(decl),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize_in_block();
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(self.node(NodeKind::Extern(decls), &kw))
    }

    fn parse_extern_decl(&mut self) -> ParseResult<Node> {
        let kw = self.expect(TokenKind::Fn)?;
        let def = self.parse_fn_signature()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(self.node(NodeKind::Fn(def), &kw))
    }

    fn parse_use(&mut self) -> ParseResult<Node> {
        let kw = self.expect(TokenKind::Use)?;
        let name_tok = self.expect(TokenKind::Symbol)?;
        let name = self.text(&name_tok).to_string();
        self.expect(TokenKind::Semicolon)?;
        Ok(self.node(NodeKind::Use(name), &kw))
    }

    fn parse_namespace(&mut self) -> ParseResult<Node> {
        let kw = self.expect(TokenKind::Namespace)?;
        let name_tok = self.expect(TokenKind::Symbol)?;
        let name = self.text(&name_tok).to_string();
        self.expect(TokenKind::Semicolon)?;
        Ok(self.node(NodeKind::Namespace(name), &kw))
    }

    // ============ Statements ============

    fn parse_block(&mut self) -> ParseResult<Node> {
        let brace = self.expect(TokenKind::LBrace)?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            let attributes = self.parse_attributes();
            match self.parse_stmt() {
                Ok(mut stmt) => {
                    self.attach_attributes(&mut stmt, attributes);
                    statements.push(stmt);
                }
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize_in_block();
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(self.node(NodeKind::Block(statements), &brace))
    }

    /// Recovery inside a block: skip past the next `;` or stop before `}`.
    /// Always makes progress unless the block is already closing.
    fn synchronize_in_block(&mut self) {
        if self.check(TokenKind::RBrace) || self.is_at_end() {
            return;
        }
        self.advance();
        while !self.is_at_end() {
            if self.consume(TokenKind::Semicolon) {
                return;
            }
            match self.current().kind {
                TokenKind::RBrace
                | TokenKind::Var
                | TokenKind::Let
                | TokenKind::If
                | TokenKind::Loop
                | TokenKind::Return
                | TokenKind::Continue
                | TokenKind::Break => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn parse_stmt(&mut self) -> ParseResult<Node> {
        match self.current().kind {
            TokenKind::Var | TokenKind::Let => self.parse_dec_stmt(),
            TokenKind::If => self.parse_if(),
            TokenKind::Loop => self.parse_loop(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Continue => {
                let kw = self.advance();
                self.expect(TokenKind::Semicolon)?;
                Ok(self.node(NodeKind::Continue, &kw))
            }
            TokenKind::Break => {
                let kw = self.advance();
                self.expect(TokenKind::Semicolon)?;
                Ok(self.node(NodeKind::Break, &kw))
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::Semicolon)?;
                Ok(expr)
            }
        }
    }

    fn parse_dec_stmt(&mut self) -> ParseResult<Node> {
        let kw = self.advance();
        let immutable = kw.kind == TokenKind::Let;
        let name_tok = self.expect(TokenKind::Symbol)?;
        let name = self.text(&name_tok).to_string();

        let ty = if self.consume(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let value = if self.consume(TokenKind::Eq) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;

        let dec = Dec {
            name,
            ty,
            value,
            immutable,
        };
        Ok(self.node(NodeKind::Dec(dec), &kw))
    }

    fn parse_if(&mut self) -> ParseResult<Node> {
        let kw = self.expect(TokenKind::If)?;
        let condition = self.parse_expr()?;
        let true_block = self.parse_block()?;

        let false_block = if self.consume(TokenKind::Else) {
            if self.check(TokenKind::If) {
                // `else if` chains nest inside a synthetic block
                let nested_tok = self.current().clone();
                let nested = self.parse_if()?;
                Some(Box::new(
                    self.node(NodeKind::Block(vec![nested]), &nested_tok),
                ))
            } else {
                Some(Box::new(self.parse_block()?))
            }
        } else {
            None
        };

        Ok(self.node(
            NodeKind::If {
                condition: Box::new(condition),
                true_block: Box::new(true_block),
                false_block,
            },
            &kw,
        ))
    }

    fn parse_loop(&mut self) -> ParseResult<Node> {
        let kw = self.expect(TokenKind::Loop)?;

        // `loop x in expr { }` is a foreach; `loop expr { }` runs while the
        // expression holds.
        let is_foreach =
            self.check(TokenKind::Symbol) && self.peek_kind(1) == TokenKind::In;

        let binder = if is_foreach {
            let name_tok = self.advance();
            let name = self.text(&name_tok).to_string();
            self.expect(TokenKind::In)?;
            let dec = Dec {
                name,
                ty: None,
                value: None,
                immutable: false,
            };
            Some(Box::new(self.node(NodeKind::Dec(dec), &name_tok)))
        } else {
            None
        };

        let expr = self.parse_expr()?;
        let body = self.parse_block()?;

        Ok(self.node(
            NodeKind::Loop {
                is_foreach,
                binder,
                expr: Box::new(expr),
                body: Box::new(body),
            },
            &kw,
        ))
    }

    fn parse_return(&mut self) -> ParseResult<Node> {
        let kw = self.expect(TokenKind::Return)?;
        let expr = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        self.expect(TokenKind::Semicolon)?;
        Ok(self.node(NodeKind::Return(expr), &kw))
    }

    // ============ Types ============

    fn parse_type(&mut self) -> ParseResult<TypeRef> {
        let name_tok = self.expect(TokenKind::Symbol)?;
        let mut ty = TypeRef::scalar(self.text(&name_tok));
        while self.check(TokenKind::LBracket) && self.peek_kind(1) == TokenKind::RBracket {
            self.advance();
            self.advance();
            ty = TypeRef::array(ty);
        }
        Ok(ty)
    }

    // ============ Expressions ============

    pub(crate) fn parse_expr(&mut self) -> ParseResult<Node> {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> ParseResult<Node> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let kind = self.current().kind;
            let Some((lbp, rbp)) = infix_binding_power(kind) else {
                break;
            };
            if lbp < min_bp {
                break;
            }

            let op_tok = self.advance();
            let rhs = self.parse_expr_bp(rbp)?;

            lhs = match compound_op(kind) {
                // `a += b` desugars to `a = a + b`
                Some(op) => {
                    let inner = self.node(
                        NodeKind::Binary {
                            op: op.to_string(),
                            lhs: Box::new(lhs.clone()),
                            rhs: Box::new(rhs),
                        },
                        &op_tok,
                    );
                    self.node(
                        NodeKind::Binary {
                            op: "=".to_string(),
                            lhs: Box::new(lhs),
                            rhs: Box::new(inner),
                        },
                        &op_tok,
                    )
                }
                None => {
                    let op = self.text(&op_tok).to_string();
                    self.node(
                        NodeKind::Binary {
                            op,
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                        &op_tok,
                    )
                }
            };
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> ParseResult<Node> {
        let tok = self.current().clone();
        if tok.kind.is_operator() {
            self.advance();
            let op = self.text(&tok).to_string();
            let operand = self.parse_expr_bp(PREFIX_BP)?;
            return Ok(self.node(
                NodeKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                &tok,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> ParseResult<Node> {
        let mut expr = self.parse_primary()?;
        loop {
            let kind = self.current().kind;
            if kind == TokenKind::LBracket {
                let bracket = self.advance();
                let index = self.parse_expr()?;
                self.expect(TokenKind::RBracket)?;
                expr = self.node(
                    NodeKind::Index {
                        array: Box::new(expr),
                        index: Box::new(index),
                    },
                    &bracket,
                );
                continue;
            }
            // An operator whose follower cannot start an expression binds as
            // a suffix application: `x!` before `;`, `)` or `,`.
            if kind.is_operator() && !can_begin_expr(self.peek_kind(1)) {
                let op_tok = self.advance();
                let op = self.text(&op_tok).to_string();
                expr = self.node(
                    NodeKind::Unary {
                        op,
                        operand: Box::new(expr),
                    },
                    &op_tok,
                );
                continue;
            }
            break;
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Node> {
        let tok = self.current().clone();
        match tok.kind {
            TokenKind::IntLiteral => {
                self.advance();
                let number = lexer::int_literal(self.text(&tok));
                Ok(self.node(NodeKind::Number(number), &tok))
            }
            TokenKind::FloatLiteral => {
                self.advance();
                let number = lexer::float_literal(self.text(&tok));
                Ok(self.node(NodeKind::Number(number), &tok))
            }
            TokenKind::StringLiteral => {
                self.advance();
                let value = lexer::string_literal(self.text(&tok));
                Ok(self.node(NodeKind::Str(value), &tok))
            }
            TokenKind::True => {
                self.advance();
                Ok(self.node(NodeKind::Boolean(true), &tok))
            }
            TokenKind::False => {
                self.advance();
                Ok(self.node(NodeKind::Boolean(false), &tok))
            }
            TokenKind::Symbol => {
                self.advance();
                let name = self.text(&tok).to_string();
                if self.consume(TokenKind::LParen) {
                    let mut args = Vec::new();
                    while !self.check(TokenKind::RParen) && !self.is_at_end() {
                        args.push(self.parse_expr()?);
                        if !self.consume(TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                    Ok(self.node(
                        NodeKind::FnCall {
                            name,
                            args,
                            mangled: false,
                        },
                        &tok,
                    ))
                } else {
                    Ok(self.node(NodeKind::Symbol(name), &tok))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(TokenKind::RBracket) && !self.is_at_end() {
                    elements.push(self.parse_expr()?);
                    if !self.consume(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(self.node(
                    NodeKind::Array {
                        elements,
                        element_type: None,
                    },
                    &tok,
                ))
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}

/// Infix binding powers. Assignment is right-associative and lowest;
/// everything else climbs left-to-right. User-defined infix operators share
/// the slot of the operator token they reuse.
fn infix_binding_power(kind: TokenKind) -> Option<(u8, u8)> {
    use TokenKind::*;
    let bp = match kind {
        Eq | PlusEq | MinusEq | StarEq | SlashEq | PercentEq => (2, 1),
        OrOr => (3, 4),
        AndAnd => (5, 6),
        EqEq | NotEq => (7, 8),
        Lt | Gt | LtEq | GtEq => (9, 10),
        Plus | Minus => (11, 12),
        Star | Slash | Percent => (13, 14),
        _ => return None,
    };
    Some(bp)
}

/// The underlying operator of a compound assignment token.
fn compound_op(kind: TokenKind) -> Option<&'static str> {
    match kind {
        TokenKind::PlusEq => Some("+"),
        TokenKind::MinusEq => Some("-"),
        TokenKind::StarEq => Some("*"),
        TokenKind::SlashEq => Some("/"),
        TokenKind::PercentEq => Some("%"),
        _ => None,
    }
}

/// Tokens that can start an expression; used to tell suffix applications
/// apart from infix operators.
fn can_begin_expr(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::IntLiteral
            | TokenKind::FloatLiteral
            | TokenKind::StringLiteral
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Symbol
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::Minus
            | TokenKind::Not
    )
}
