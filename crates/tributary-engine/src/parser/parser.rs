//! Declaration parser for C++ headers.
//!
//! A tolerant recursive-descent pass over the token stream. It understands
//! the declarations the generator needs (namespaces, records with their
//! fields, attributes and bases, enums, aliases) and skips everything else
//! to the next declaration boundary. Unknown constructs produce warnings;
//! only unterminated bodies and tripped guards are errors.

use std::path::{Path, PathBuf};

use crate::parser::ast::{
    AliasDeclaration, AttributeDeclaration, BaseClassRef, EnumDeclaration, FieldDeclaration,
    Namespace, TypeDeclaration, TypeKeyword, TypeKind, TypeRef, Visibility,
};
use crate::parser::diagnostic::Diagnostic;
use crate::parser::guards::{DepthCounter, LimitExceeded, LoopGuard};
use crate::parser::lexer::{IncludeDirective, Lexer};
use crate::parser::token::{Span, Token};

/// Words dropped from type spellings
const SPELLING_NOISE: &[&str] = &[
    "const", "volatile", "mutable", "struct", "class", "union", "enum", "typename", "inline",
    "constexpr", "register", "thread_local",
];

/// Words that start a declaration after a macro invocation without `;`
const DECLARATION_STARTS: &[&str] = &[
    "struct", "class", "union", "enum", "namespace", "template", "typedef", "using", "public",
    "protected", "private", "friend", "extern",
];

/// Member declarations starting with these are never fields
const NON_FIELD_STARTS: &[&str] = &[
    "friend",
    "static",
    "static_assert",
    "virtual",
    "explicit",
    "operator",
    "constexpr",
    "consteval",
    "inline",
];

/// Everything extracted from one header
#[derive(Debug, Default)]
pub struct ParsedFile {
    /// Declarations of the file, rooted at the global namespace
    pub root: Namespace,
    pub includes: Vec<IncludeDirective>,
    pub diagnostics: Vec<Diagnostic>,
}

enum RecordOutcome {
    Definition(TypeDeclaration),
    Forward,
    /// The class-key introduced something else; position is restored
    NotDefinition,
}

/// One declarator of a member or typedef declaration
#[derive(Debug, Clone)]
struct Declarator {
    name: String,
    span: Span,
    pointer: bool,
    reference: bool,
    array: bool,
    bitfield: bool,
}

impl Declarator {
    fn kind(&self) -> TypeKind {
        if self.bitfield {
            TypeKind::Bitfield
        } else if self.pointer {
            TypeKind::Pointer
        } else if self.reference {
            TypeKind::Reference
        } else if self.array {
            TypeKind::Array
        } else {
            TypeKind::Unresolved
        }
    }
}

pub struct Parser<'a> {
    source: &'a str,
    path: PathBuf,
    tokens: Vec<(Token, Span)>,
    pos: usize,
    depth: DepthCounter,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    /// Lex and parse one header
    pub fn parse_source(source: &'a str, path: &Path) -> ParsedFile {
        let lexed = Lexer::new(source).tokenize();

        let mut diagnostics = Vec::new();
        for error in &lexed.errors {
            let diagnostic = if error.is_fatal() {
                Diagnostic::error(error.to_string(), path, error.span())
            } else {
                Diagnostic::warning(error.to_string(), path, error.span())
            };
            diagnostics.push(diagnostic);
        }

        let parser = Parser {
            source,
            path: path.to_path_buf(),
            tokens: lexed.tokens,
            pos: 0,
            depth: DepthCounter::default(),
            diagnostics,
        };
        let (root, diagnostics) = parser.parse();

        ParsedFile {
            root,
            includes: lexed.includes,
            diagnostics,
        }
    }

    fn parse(mut self) -> (Namespace, Vec<Diagnostic>) {
        let mut root = Namespace::default();

        let result = (|| -> Result<(), LimitExceeded> {
            let mut guard = LoopGuard::new("file");
            loop {
                guard.check(self.pos)?;
                self.parse_declarations(&[], &mut root)?;
                if self.at_eof() {
                    return Ok(());
                }
                // Only a stray '}' stops parse_declarations early
                let span = self.span();
                self.warning("Unmatched '}'", span);
                self.bump();
            }
        })();

        if let Err(limit) = result {
            let span = self.span();
            self.error(limit.message, span);
        }
        (root, self.diagnostics)
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .or_else(|| self.tokens.last())
            .map(|(t, _)| t)
            .unwrap_or(&Token::Eof)
    }

    fn span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, s)| *s)
            .unwrap_or_default()
    }

    fn bump(&mut self) {
        if self.pos < self.tokens.len().saturating_sub(1) {
            self.pos += 1;
        }
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn at_word(&self, word: &str) -> bool {
        self.peek().is_word(word)
    }

    fn at_eof(&self) -> bool {
        self.at(&Token::Eof)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn at_attribute_open(&self) -> bool {
        self.at(&Token::LeftBracket) && self.peek_at(1) == &Token::LeftBracket
    }

    fn warning(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics
            .push(Diagnostic::warning(message, self.path.clone(), span));
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics
            .push(Diagnostic::error(message, self.path.clone(), span));
    }

    /// Consume a balanced group starting at the current opening token.
    /// Returns the span of the closing token.
    fn skip_balanced(&mut self) -> Span {
        let (open, close) = match self.peek() {
            Token::LeftParen => (Token::LeftParen, Token::RightParen),
            Token::LeftBracket => (Token::LeftBracket, Token::RightBracket),
            Token::LeftBrace => (Token::LeftBrace, Token::RightBrace),
            _ => return self.span(),
        };

        let mut depth = 0usize;
        loop {
            if self.at_eof() {
                return self.span();
            }
            let token = self.peek();
            if *token == open {
                depth += 1;
            } else if *token == close {
                depth -= 1;
                if depth == 0 {
                    let span = self.span();
                    self.bump();
                    return span;
                }
            }
            self.bump();
        }
    }

    /// Consume `<...>`, ignoring angle brackets inside parentheses
    fn skip_angles(&mut self) {
        if !self.at(&Token::Less) {
            return;
        }
        let mut angles = 0usize;
        loop {
            match self.peek() {
                Token::Eof | Token::Semicolon | Token::LeftBrace => return,
                Token::LeftParen => {
                    self.skip_balanced();
                    continue;
                }
                Token::Less => angles += 1,
                Token::Greater => {
                    angles -= 1;
                    if angles == 0 {
                        self.bump();
                        return;
                    }
                }
                _ => {}
            }
            self.bump();
        }
    }

    /// Skip to the end of the current declaration.
    ///
    /// Stops after a `;` or a brace body at depth 0, before a `}` that closes
    /// the enclosing scope, or after a parenthesized macro invocation that is
    /// directly followed by a new declaration.
    fn skip_declaration(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Token::Eof => return,
                Token::RightBrace if depth == 0 => return,
                Token::Semicolon if depth == 0 => {
                    self.bump();
                    return;
                }
                Token::LeftBrace => {
                    self.skip_balanced();
                    if depth == 0 {
                        // constructor initializer lists: a{1}, b{2} { ... }
                        if matches!(self.peek(), Token::Comma | Token::LeftBrace) {
                            continue;
                        }
                        self.eat(&Token::Semicolon);
                        return;
                    }
                }
                Token::LeftParen | Token::LeftBracket => {
                    depth += 1;
                    self.bump();
                }
                Token::RightParen | Token::RightBracket => {
                    depth = depth.saturating_sub(1);
                    self.bump();
                    if depth == 0 && self.starts_new_declaration() {
                        return;
                    }
                }
                _ => self.bump(),
            }
        }
    }

    fn starts_new_declaration(&self) -> bool {
        match self.peek() {
            Token::RightBrace => true,
            Token::Ident(word) => DECLARATION_STARTS.contains(&word.as_str()),
            _ => false,
        }
    }

    /// `a::b::c` at the current position
    fn parse_qualified_name(&mut self) -> Vec<String> {
        let mut parts = Vec::new();
        if self.at(&Token::ColonColon) {
            self.bump();
        }
        while let Some(word) = self.peek().ident().map(str::to_string) {
            self.bump();
            if word != "inline" {
                parts.push(word);
            }
            if self.at(&Token::ColonColon) && self.peek_at(1).ident().is_some() {
                self.bump();
            } else {
                break;
            }
        }
        parts
    }

    // ========================================================================
    // Namespace scope
    // ========================================================================

    fn parse_declarations(
        &mut self,
        scope: &[String],
        ns: &mut Namespace,
    ) -> Result<(), LimitExceeded> {
        let mut guard = LoopGuard::new("declarations");
        loop {
            guard.check(self.pos)?;
            let word = match self.peek() {
                Token::Eof | Token::RightBrace => return Ok(()),
                Token::Semicolon => {
                    self.bump();
                    continue;
                }
                Token::Ident(word) => word.clone(),
                Token::LeftBracket | Token::ColonColon | Token::Tilde => {
                    self.skip_declaration();
                    continue;
                }
                other => {
                    let message = format!("Skipped unexpected '{}'", other);
                    let span = self.span();
                    self.warning(message, span);
                    self.skip_declaration();
                    continue;
                }
            };

            match word.as_str() {
                "namespace" => self.parse_namespace(scope, ns)?,
                "inline" if self.peek_at(1).is_word("namespace") => self.bump(),
                "extern" if matches!(self.peek_at(1), Token::StringLiteral(_)) => {
                    self.parse_linkage_block(scope, ns)?
                }
                "template" => {
                    self.bump();
                    self.skip_angles();
                    if TypeKeyword::from_keyword(self.peek().ident().unwrap_or("")).is_some() {
                        self.parse_namespace_record(scope, ns, true)?;
                    } else {
                        self.skip_declaration();
                    }
                }
                "struct" | "class" | "union" => self.parse_namespace_record(scope, ns, false)?,
                "enum" => {
                    if let Some(decl) = self.parse_enum(scope, &[])? {
                        ns.enums.push(decl);
                    }
                    if !self.eat(&Token::Semicolon) {
                        self.skip_declaration();
                    }
                }
                "typedef" => {
                    let (types, aliases) = self.parse_typedef(scope, &[])?;
                    ns.types.extend(types);
                    ns.aliases.extend(aliases);
                }
                "using" => {
                    if self.peek_at(1).is_word("namespace") {
                        self.bump();
                        self.bump();
                        let target = self.parse_qualified_name().join("::");
                        if !target.is_empty() && !ns.using_namespaces.contains(&target) {
                            ns.using_namespaces.push(target);
                        }
                        self.skip_declaration();
                    } else if let Some(alias) = self.parse_using_alias(scope) {
                        ns.aliases.push(alias);
                    }
                }
                _ => self.skip_declaration(),
            }
        }
    }

    fn parse_namespace(&mut self, scope: &[String], ns: &mut Namespace) -> Result<(), LimitExceeded> {
        let start = self.span();
        self.bump();
        self.parse_attribute_specifiers();
        let names = self.parse_qualified_name();
        self.parse_attribute_specifiers();

        if !self.at(&Token::LeftBrace) {
            // namespace alias or malformed
            self.skip_declaration();
            return Ok(());
        }
        self.bump();

        let mut child_scope = scope.to_vec();
        child_scope.extend(names.iter().cloned());
        let child = ns.descend_mut(&names);

        self.depth.enter("namespace")?;
        let result = self.parse_declarations(&child_scope, child);
        self.depth.leave();
        result?;

        if !self.eat(&Token::RightBrace) {
            let name = if names.is_empty() {
                "<anonymous>".to_string()
            } else {
                names.join("::")
            };
            self.error(format!("Unterminated namespace '{}'", name), start);
        }
        Ok(())
    }

    fn parse_linkage_block(
        &mut self,
        scope: &[String],
        ns: &mut Namespace,
    ) -> Result<(), LimitExceeded> {
        let start = self.span();
        self.bump();
        self.bump();
        if !self.at(&Token::LeftBrace) {
            self.skip_declaration();
            return Ok(());
        }
        self.bump();

        self.depth.enter("linkage block")?;
        let result = self.parse_declarations(scope, ns);
        self.depth.leave();
        result?;

        if !self.eat(&Token::RightBrace) {
            self.error("Unterminated linkage block", start);
        }
        Ok(())
    }

    fn parse_namespace_record(
        &mut self,
        scope: &[String],
        ns: &mut Namespace,
        is_template: bool,
    ) -> Result<(), LimitExceeded> {
        match self.parse_record(scope, &[], is_template)? {
            RecordOutcome::Definition(decl) => {
                if !decl.name.is_empty() {
                    ns.types.push(decl);
                }
                // trailing variable declarators
                if !self.eat(&Token::Semicolon) {
                    self.skip_declaration();
                }
            }
            RecordOutcome::Forward => {}
            RecordOutcome::NotDefinition => self.skip_declaration(),
        }
        Ok(())
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    /// `[[...]]` lists plus `alignas`, `__declspec` and `__attribute__`
    /// specifiers. Only the bracketed attributes are returned.
    fn parse_attribute_specifiers(&mut self) -> Vec<AttributeDeclaration> {
        let mut attributes = Vec::new();
        loop {
            if self.at_attribute_open() {
                self.parse_attribute_list(&mut attributes);
            } else if matches!(self.peek().ident(), Some("alignas" | "__declspec" | "__attribute__"))
                && self.peek_at(1) == &Token::LeftParen
            {
                self.bump();
                self.skip_balanced();
            } else {
                return attributes;
            }
        }
    }

    fn parse_attribute_list(&mut self, out: &mut Vec<AttributeDeclaration>) {
        let list_start = self.span();
        self.bump();
        self.bump();

        let mut using_scope = None;
        if self.at_word("using") {
            self.bump();
            let scope = self.parse_qualified_name().join("::");
            self.eat(&Token::Colon);
            using_scope = Some(scope);
        }

        loop {
            match self.peek() {
                Token::RightBracket if self.peek_at(1) == &Token::RightBracket => {
                    self.bump();
                    self.bump();
                    return;
                }
                Token::Comma => {
                    self.bump();
                    continue;
                }
                Token::Ident(_) => {}
                Token::Eof => {
                    self.error("Unterminated attribute list", list_start);
                    return;
                }
                _ => {
                    let span = self.span();
                    self.warning("Malformed attribute list", span);
                    self.skip_to_attribute_close();
                    return;
                }
            }

            let span = self.span();
            let mut parts = self.parse_qualified_name();
            let Some(name) = parts.pop() else {
                self.skip_to_attribute_close();
                return;
            };
            let scope = if parts.is_empty() {
                using_scope.clone()
            } else {
                Some(parts.join("::"))
            };

            let arguments = if self.at(&Token::LeftParen) {
                let open = self.span();
                let close = self.skip_balanced();
                let text = self
                    .source
                    .get(open.end..close.start)
                    .unwrap_or("")
                    .trim()
                    .to_string();
                Some(text)
            } else {
                None
            };
            self.eat(&Token::Ellipsis);

            out.push(AttributeDeclaration {
                scope,
                name,
                arguments,
                span,
            });
        }
    }

    fn skip_to_attribute_close(&mut self) {
        while !self.at_eof() {
            if self.at(&Token::RightBracket) && self.peek_at(1) == &Token::RightBracket {
                self.bump();
                self.bump();
                return;
            }
            self.bump();
        }
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// Parse from a class-key. Anonymous definitions are returned with an
    /// empty name.
    fn parse_record(
        &mut self,
        namespace: &[String],
        enclosing: &[String],
        is_template: bool,
    ) -> Result<RecordOutcome, LimitExceeded> {
        let start = self.pos;
        let start_span = self.span();
        let keyword = match TypeKeyword::from_keyword(self.peek().ident().unwrap_or("")) {
            Some(keyword) => keyword,
            None => return Ok(RecordOutcome::NotDefinition),
        };
        self.bump();

        let mut attributes = self.parse_attribute_specifiers();
        // API export macros between the class-key and the name
        while self.at_decorator_macro() {
            self.bump();
            if self.at(&Token::LeftParen) {
                self.skip_balanced();
            }
            attributes.extend(self.parse_attribute_specifiers());
        }

        let name_span = self.span();
        let name = self.parse_qualified_name().pop().unwrap_or_default();

        let mut is_template = is_template;
        if self.at(&Token::Less) && !name.is_empty() {
            self.skip_angles();
            is_template = true;
        }
        if self.at_word("final") {
            self.bump();
        }

        match self.peek() {
            Token::Semicolon if !name.is_empty() => {
                self.bump();
                return Ok(RecordOutcome::Forward);
            }
            Token::Colon | Token::LeftBrace => {}
            _ => {
                self.pos = start;
                return Ok(RecordOutcome::NotDefinition);
            }
        }

        let mut decl = TypeDeclaration::new(&name, keyword, self.path.clone());
        decl.namespace = namespace.to_vec();
        decl.enclosing = enclosing.to_vec();
        decl.attributes = attributes;
        decl.is_template = is_template;
        decl.span = if name.is_empty() { start_span } else { name_span };

        if self.at(&Token::Colon) {
            self.bump();
            if !self.parse_bases(&mut decl) {
                self.pos = start;
                return Ok(RecordOutcome::NotDefinition);
            }
        }

        // at '{'
        self.bump();
        self.depth.enter("type body")?;
        let result = self.parse_members(&mut decl);
        self.depth.leave();
        result?;

        if !self.eat(&Token::RightBrace) {
            let label = if name.is_empty() { "<anonymous>" } else { name.as_str() };
            self.error(format!("Unterminated body of '{}'", label), start_span);
        }
        Ok(RecordOutcome::Definition(decl))
    }

    fn at_decorator_macro(&self) -> bool {
        let Some(word) = self.peek().ident() else {
            return false;
        };
        let looks_like_macro = word.len() > 1
            && word
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        let followed_by_name = match self.peek_at(1) {
            Token::Ident(_) => true,
            Token::LeftBracket => self.peek_at(2) == &Token::LeftBracket,
            Token::LeftParen => true,
            _ => false,
        };
        looks_like_macro && followed_by_name
    }

    /// Base clause up to the opening brace. Returns false when no body
    /// follows.
    fn parse_bases(&mut self, decl: &mut TypeDeclaration) -> bool {
        loop {
            let mut access = decl.keyword.default_visibility();
            let mut is_virtual = false;
            loop {
                match self.peek().ident() {
                    Some("virtual") => is_virtual = true,
                    Some(word) => match Visibility::from_keyword(word) {
                        Some(v) => access = v,
                        None => break,
                    },
                    None => break,
                }
                self.bump();
            }

            let mut spelling_tokens = Vec::new();
            let mut angles = 0usize;
            loop {
                match self.peek() {
                    Token::Eof | Token::Semicolon => return false,
                    Token::LeftBrace if angles == 0 => break,
                    Token::Comma if angles == 0 => break,
                    Token::Less => angles += 1,
                    Token::Greater => angles = angles.saturating_sub(1),
                    Token::LeftParen => {
                        // template arguments with parentheses
                        let open = self.pos;
                        self.skip_balanced();
                        spelling_tokens.extend(self.tokens[open..self.pos].iter().map(|(t, _)| t.clone()));
                        continue;
                    }
                    _ => {}
                }
                spelling_tokens.push(self.peek().clone());
                self.bump();
            }

            let spelling = spell(&spelling_tokens);
            if !spelling.is_empty() {
                let mut base = BaseClassRef::new(&spelling, access);
                base.is_virtual = is_virtual;
                decl.bases.push(base);
            }

            if self.eat(&Token::Comma) {
                continue;
            }
            return self.at(&Token::LeftBrace);
        }
    }

    fn parse_members(&mut self, record: &mut TypeDeclaration) -> Result<(), LimitExceeded> {
        let mut access = record.keyword.default_visibility();
        let mut guard = LoopGuard::new("member list");

        loop {
            guard.check(self.pos)?;
            let word = match self.peek() {
                Token::Eof | Token::RightBrace => return Ok(()),
                Token::Semicolon => {
                    self.bump();
                    continue;
                }
                Token::Tilde => {
                    self.skip_declaration();
                    continue;
                }
                Token::LeftBracket if self.at_attribute_open() => {
                    self.parse_member(record, access)?;
                    continue;
                }
                // globally qualified type, `::math::Vec2 v;`
                Token::ColonColon => {
                    self.parse_member(record, access)?;
                    continue;
                }
                Token::Ident(word) => word.clone(),
                other => {
                    let message = format!("Skipped unexpected '{}' in '{}'", other, record.name);
                    let span = self.span();
                    self.warning(message, span);
                    self.skip_declaration();
                    continue;
                }
            };

            if let Some(visibility) = Visibility::from_keyword(&word) {
                if self.peek_at(1) == &Token::Colon {
                    access = visibility;
                    self.bump();
                    self.bump();
                    continue;
                }
            }

            match word.as_str() {
                "struct" | "class" | "union" => self.parse_nested_record(record, access, false)?,
                "template" => {
                    self.bump();
                    self.skip_angles();
                    if TypeKeyword::from_keyword(self.peek().ident().unwrap_or("")).is_some() {
                        self.parse_nested_record(record, access, true)?;
                    } else {
                        self.skip_declaration();
                    }
                }
                "enum" => self.parse_member_enum(record, access)?,
                "typedef" => {
                    let (types, aliases) =
                        self.parse_typedef(&record.namespace, &record_child_enclosing(record))?;
                    for mut ty in types {
                        ty.visibility = access;
                        record.nested.push(ty);
                    }
                    record.aliases.extend(aliases);
                }
                "using" => {
                    if let Some(alias) = self.parse_using_alias(&record.scope()) {
                        record.aliases.push(alias);
                    }
                }
                w if NON_FIELD_STARTS.contains(&w) => self.skip_declaration(),
                w if w == record.name && self.peek_at(1) == &Token::LeftParen => {
                    self.skip_declaration()
                }
                _ => self.parse_member(record, access)?,
            }
        }
    }

    fn parse_nested_record(
        &mut self,
        record: &mut TypeDeclaration,
        access: Visibility,
        is_template: bool,
    ) -> Result<(), LimitExceeded> {
        let start = self.pos;
        let enclosing = record_child_enclosing(record);

        match self.parse_record(&record.namespace, &enclosing, is_template)? {
            RecordOutcome::Definition(mut nested) => {
                nested.visibility = access;
                if nested.name.is_empty() {
                    if self.eat(&Token::Semicolon) {
                        // anonymous struct/union members belong to the enclosing type
                        for mut field in nested.fields {
                            if !access.is_public() {
                                field.visibility = access;
                            }
                            record.fields.push(field);
                        }
                    } else {
                        self.skip_declaration();
                    }
                } else {
                    let type_name = nested.name.clone();
                    record.nested.push(nested);
                    if !self.eat(&Token::Semicolon) {
                        self.parse_trailing_fields(record, access, &type_name);
                    }
                }
            }
            RecordOutcome::Forward => {}
            RecordOutcome::NotDefinition => {
                self.pos = start;
                self.parse_member(record, access)?;
            }
        }
        Ok(())
    }

    fn parse_member_enum(
        &mut self,
        record: &mut TypeDeclaration,
        access: Visibility,
    ) -> Result<(), LimitExceeded> {
        let start = self.pos;
        match self.parse_enum(&record.namespace, &record_child_enclosing(record))? {
            Some(decl) => {
                let name = decl.name.clone();
                record.enums.push(decl);
                if !self.eat(&Token::Semicolon) {
                    if name.is_empty() {
                        self.skip_declaration();
                    } else {
                        self.parse_trailing_fields(record, access, &name);
                    }
                }
            }
            None => {
                self.pos = start;
                self.parse_member(record, access)?;
            }
        }
        Ok(())
    }

    /// Declarators following a nested definition: `struct P {...} a, b;`
    fn parse_trailing_fields(&mut self, record: &mut TypeDeclaration, access: Visibility, type_name: &str) {
        let Some(statement) = self.take_statement() else {
            return;
        };
        for chunk in split_declarators(&statement) {
            if let Some((_, declarator)) = extract_declarator(&chunk.tokens, chunk.bitfield) {
                let ty = TypeRef::with_kind(type_name, declarator.kind());
                let mut field = FieldDeclaration::new(&declarator.name, ty, access);
                field.span = declarator.span;
                record.fields.push(field);
            }
        }
    }

    // ========================================================================
    // Fields
    // ========================================================================

    fn parse_member(&mut self, record: &mut TypeDeclaration, access: Visibility) -> Result<(), LimitExceeded> {
        let start_span = self.span();
        let attributes = self.parse_attribute_specifiers();

        if matches!(self.peek().ident(), Some(w) if NON_FIELD_STARTS.contains(&w))
            || self.at(&Token::Tilde)
            || self.is_function_declaration()
        {
            self.skip_declaration();
            return Ok(());
        }

        let Some(statement) = self.take_statement() else {
            self.warning(
                format!("Incomplete member declaration in '{}'", record.name),
                start_span,
            );
            return Ok(());
        };

        let chunks = split_declarators(&statement);
        let mut base_type: Option<String> = None;

        for (index, chunk) in chunks.iter().enumerate() {
            let Some((type_tokens, declarator)) = extract_declarator(&chunk.tokens, chunk.bitfield)
            else {
                self.warning(
                    format!("Unrecognized member declaration in '{}'", record.name),
                    chunk.tokens.first().map(|(_, s)| *s).unwrap_or(start_span),
                );
                continue;
            };

            if index == 0 {
                let spelling = spell(&type_tokens);
                if spelling.is_empty() {
                    self.warning(
                        format!("Member '{}' has no type", declarator.name),
                        declarator.span,
                    );
                    return Ok(());
                }
                base_type = Some(spelling);
            }

            let Some(spelling) = base_type.clone() else {
                continue;
            };
            let mut field = FieldDeclaration::new(
                &declarator.name,
                TypeRef::with_kind(spelling, declarator.kind()),
                access,
            );
            field.attributes = attributes.clone();
            field.span = declarator.span;
            record.fields.push(field);
        }
        Ok(())
    }

    /// Whether the declaration at the current position declares a function:
    /// a `(` at depth 0 before any initializer, body or bitfield width.
    fn is_function_declaration(&self) -> bool {
        let mut angles = 0usize;
        let mut previous: Option<&Token> = None;
        for (token, _) in &self.tokens[self.pos..] {
            match token {
                Token::LeftParen if angles == 0 => return true,
                Token::Ident(word) if word == "operator" => return true,
                Token::Equal | Token::LeftBrace | Token::Semicolon | Token::RightBrace | Token::Eof
                    if angles == 0 =>
                {
                    return false
                }
                Token::Colon if angles == 0 => return false,
                Token::Less if matches!(previous, Some(Token::Ident(_))) => angles += 1,
                Token::Greater if angles > 0 => angles -= 1,
                Token::Semicolon | Token::RightBrace | Token::Eof => return false,
                _ => {}
            }
            previous = Some(token);
        }
        false
    }

    /// Tokens up to the `;` ending the statement, consuming the `;`.
    /// Returns `None`, consuming nothing past it, when a `}` closing the
    /// scope or the end of file comes first.
    fn take_statement(&mut self) -> Option<Vec<(Token, Span)>> {
        let start = self.pos;
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Token::Eof => return None,
                Token::RightBrace if depth == 0 => return None,
                Token::Semicolon if depth == 0 => {
                    let tokens = self.tokens[start..self.pos].to_vec();
                    self.bump();
                    return Some(tokens);
                }
                Token::LeftParen | Token::LeftBracket | Token::LeftBrace => depth += 1,
                Token::RightParen | Token::RightBracket | Token::RightBrace => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            self.bump();
        }
    }

    // ========================================================================
    // Enums and aliases
    // ========================================================================

    /// Parse from `enum`. Returns `None`, with the position restored, when
    /// this is an elaborated type use rather than a declaration.
    fn parse_enum(
        &mut self,
        namespace: &[String],
        enclosing: &[String],
    ) -> Result<Option<EnumDeclaration>, LimitExceeded> {
        let start = self.pos;
        let span = self.span();
        self.bump();

        let is_scoped = matches!(self.peek().ident(), Some("class" | "struct"));
        if is_scoped {
            self.bump();
        }
        self.parse_attribute_specifiers();
        let name = self.parse_qualified_name().pop().unwrap_or_default();

        if self.at(&Token::Colon) {
            // underlying type
            while !matches!(
                self.peek(),
                Token::LeftBrace | Token::Semicolon | Token::Eof | Token::RightBrace
            ) {
                self.bump();
            }
        }

        match self.peek() {
            Token::LeftBrace => {
                self.skip_balanced();
            }
            Token::Semicolon if !name.is_empty() => {}
            _ => {
                self.pos = start;
                return Ok(None);
            }
        }

        Ok(Some(EnumDeclaration {
            name,
            namespace: namespace.to_vec(),
            enclosing: enclosing.to_vec(),
            is_scoped,
            span,
        }))
    }

    /// `using Name = Type;`. Anything else starting with `using` is skipped.
    fn parse_using_alias(&mut self, scope: &[String]) -> Option<AliasDeclaration> {
        let is_alias = self.peek_at(1).ident().is_some() && self.peek_at(2) == &Token::Equal;
        if !is_alias {
            self.skip_declaration();
            return None;
        }

        self.bump();
        let span = self.span();
        let name = self.peek().ident().unwrap_or_default().to_string();
        self.bump();
        self.bump();

        let statement = self.take_statement()?;
        if statement.iter().any(|(t, _)| *t == Token::LeftParen) {
            // function types
            return None;
        }
        let (type_tokens, indirection) = strip_indirection(&statement);
        let spelling = spell(&type_tokens);
        if spelling.is_empty() {
            return None;
        }

        Some(AliasDeclaration {
            name,
            scope: scope.to_vec(),
            target: TypeRef::with_kind(spelling, indirection),
            span,
        })
    }

    /// Parse a `typedef`, returning record definitions it contains and the
    /// aliases it declares.
    fn parse_typedef(
        &mut self,
        namespace: &[String],
        enclosing: &[String],
    ) -> Result<(Vec<TypeDeclaration>, Vec<AliasDeclaration>), LimitExceeded> {
        self.bump();

        let mut scope = namespace.to_vec();
        scope.extend(enclosing.iter().cloned());

        let mut types = Vec::new();
        let mut aliases = Vec::new();

        if TypeKeyword::from_keyword(self.peek().ident().unwrap_or("")).is_some() {
            let start = self.pos;
            if let RecordOutcome::Definition(mut decl) = self.parse_record(namespace, enclosing, false)? {
                let Some(statement) = self.take_statement() else {
                    return Ok((types, aliases));
                };
                let declarators: Vec<_> = split_declarators(&statement)
                    .iter()
                    .filter_map(|c| extract_declarator(&c.tokens, false).map(|(_, d)| d))
                    .collect();

                if decl.name.is_empty() {
                    match declarators.iter().find(|d| matches!(d.kind(), TypeKind::Unresolved)) {
                        Some(first) => decl.name = first.name.clone(),
                        None => return Ok((types, aliases)),
                    }
                }
                for declarator in declarators {
                    if declarator.name != decl.name {
                        aliases.push(AliasDeclaration {
                            name: declarator.name.clone(),
                            scope: scope.clone(),
                            target: TypeRef::with_kind(decl.name.clone(), declarator.kind()),
                            span: declarator.span,
                        });
                    }
                }
                types.push(decl);
                return Ok((types, aliases));
            }
            self.pos = start;
        }

        let Some(statement) = self.take_statement() else {
            return Ok((types, aliases));
        };
        if statement.iter().any(|(t, _)| *t == Token::LeftParen) {
            // function and function pointer typedefs
            return Ok((types, aliases));
        }

        let mut base_type = None;
        for (index, chunk) in split_declarators(&statement).iter().enumerate() {
            let Some((type_tokens, declarator)) = extract_declarator(&chunk.tokens, false) else {
                continue;
            };
            if index == 0 {
                base_type = Some(spell(&type_tokens));
            }
            match &base_type {
                Some(spelling) if !spelling.is_empty() => aliases.push(AliasDeclaration {
                    name: declarator.name.clone(),
                    scope: scope.clone(),
                    target: TypeRef::with_kind(spelling.clone(), declarator.kind()),
                    span: declarator.span,
                }),
                _ => break,
            }
        }
        Ok((types, aliases))
    }
}

fn record_child_enclosing(record: &TypeDeclaration) -> Vec<String> {
    let mut enclosing = record.enclosing.clone();
    enclosing.push(record.name.clone());
    enclosing
}

/// Rebuild a type spelling from tokens, dropping cv-qualifiers and
/// elaborated-type keywords
fn spell(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut previous: Option<&Token> = None;
    for token in tokens {
        if let Token::Ident(word) = token {
            if SPELLING_NOISE.contains(&word.as_str()) {
                continue;
            }
        }
        if let Some(prev) = previous {
            if prev.needs_space_before(token) {
                out.push(' ');
            }
        }
        out.push_str(&token.to_string());
        previous = Some(token);
    }
    out
}

/// Drop trailing `*`/`&` and cv words from alias targets
fn strip_indirection(tokens: &[(Token, Span)]) -> (Vec<Token>, TypeKind) {
    let mut end = tokens.len();
    let mut kind = TypeKind::Unresolved;
    while end > 0 {
        match &tokens[end - 1].0 {
            Token::Star => kind = TypeKind::Pointer,
            Token::Amp | Token::AmpAmp if kind == TypeKind::Unresolved => kind = TypeKind::Reference,
            Token::Amp | Token::AmpAmp => {}
            Token::Ident(w) if w == "const" || w == "volatile" => {}
            Token::RightBracket => {
                kind = TypeKind::Array;
                // drop the whole [..] group
                let mut depth = 0usize;
                while end > 0 {
                    match tokens[end - 1].0 {
                        Token::RightBracket => depth += 1,
                        Token::LeftBracket => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    end -= 1;
                }
            }
            _ => break,
        }
        end = end.saturating_sub(1);
    }
    (tokens[..end].iter().map(|(t, _)| t.clone()).collect(), kind)
}

/// One comma-separated part of a declaration, initializer removed
struct DeclaratorChunk {
    tokens: Vec<(Token, Span)>,
    bitfield: bool,
}

/// Split a statement into declarators at depth-0 commas. Initializers and
/// bitfield widths are cut off.
fn split_declarators(statement: &[(Token, Span)]) -> Vec<DeclaratorChunk> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    let mut bitfield = false;
    let mut in_tail = false;
    let mut depth = 0usize;
    let mut angles = 0usize;
    let mut previous: Option<&Token> = None;

    for (token, span) in statement {
        match token {
            Token::LeftParen | Token::LeftBracket | Token::LeftBrace => depth += 1,
            Token::RightParen | Token::RightBracket | Token::RightBrace => {
                depth = depth.saturating_sub(1)
            }
            Token::Less if !in_tail && matches!(previous, Some(Token::Ident(_))) => angles += 1,
            Token::Greater if !in_tail && angles > 0 => angles -= 1,
            Token::Comma if depth == 0 && angles == 0 => {
                chunks.push(DeclaratorChunk {
                    tokens: std::mem::take(&mut current),
                    bitfield,
                });
                bitfield = false;
                in_tail = false;
                previous = Some(token);
                continue;
            }
            Token::Equal if depth == 0 && angles == 0 => in_tail = true,
            Token::Colon if depth == 0 && angles == 0 && !in_tail => {
                bitfield = true;
                in_tail = true;
            }
            _ => {}
        }

        // brace initializers start the tail too: `int a{1};`
        if *token == Token::LeftBrace && depth == 1 && angles == 0 {
            in_tail = true;
        }
        if !in_tail {
            current.push((token.clone(), *span));
        }
        previous = Some(token);
    }
    if !current.is_empty() {
        chunks.push(DeclaratorChunk {
            tokens: current,
            bitfield,
        });
    }
    chunks
}

/// Split one declarator chunk into its type tokens and the declarator
fn extract_declarator(tokens: &[(Token, Span)], bitfield: bool) -> Option<(Vec<Token>, Declarator)> {
    let mut end = tokens.len();
    let mut array = false;

    while end > 0 && tokens[end - 1].0 == Token::RightBracket {
        let mut depth = 0usize;
        let mut index = end;
        loop {
            index = index.checked_sub(1)?;
            match tokens[index].0 {
                Token::RightBracket => depth += 1,
                Token::LeftBracket => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
        }
        end = index;
        array = true;
    }

    let (name_token, span) = tokens.get(end.checked_sub(1)?)?;
    let name = name_token.ident()?.to_string();

    let mut type_end = end - 1;
    let mut pointer = false;
    let mut reference = false;
    while type_end > 0 {
        match &tokens[type_end - 1].0 {
            Token::Star => pointer = true,
            Token::Amp | Token::AmpAmp => reference = true,
            Token::Ident(w) if w == "const" || w == "volatile" => {}
            _ => break,
        }
        type_end -= 1;
    }

    let type_tokens = tokens[..type_end].iter().map(|(t, _)| t.clone()).collect();
    Some((
        type_tokens,
        Declarator {
            name,
            span: *span,
            pointer,
            reference,
            array,
            bitfield,
        },
    ))
}
