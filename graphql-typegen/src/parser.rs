//! Recursive descent parser for executable documents.
//!
//! Grammar: <https://spec.graphql.org/October2021/#sec-Document-Syntax>

use displaydoc::Display;
use indexmap::IndexMap;
use thiserror::Error;

use crate::ast::Definition;
use crate::ast::Directive;
use crate::ast::Document;
use crate::ast::Field;
use crate::ast::FragmentDefinition;
use crate::ast::FragmentSpread;
use crate::ast::InlineFragment;
use crate::ast::OperationDefinition;
use crate::ast::OperationKind;
use crate::ast::Positioned;
use crate::ast::Selection;
use crate::ast::SelectionSet;
use crate::ast::SourcePosition;
use crate::ast::TypeAnnotation;
use crate::ast::Value;
use crate::ast::VariableDefinition;
use crate::lexer::LexError;
use crate::lexer::Lexer;
use crate::lexer::Token;

#[derive(Error, Debug, Display, Clone, PartialEq)]
pub enum ParseError {
    /// {0}
    Lexical(#[from] LexError),
    /// expected {expected}, found {found}
    UnexpectedToken { expected: String, found: String },
    /// unexpected end of document, expected {0}
    UnexpectedEnd(String),
    /// duplicate argument '{0}'
    DuplicateArgument(String),
    /// 'on' cannot be used as a fragment name
    InvalidFragmentName,
}

/// Parse one executable document.
pub fn parse_document(source: &str) -> Result<Document, Positioned<ParseError>> {
    Parser::new(source)?.parse_document()
}

struct Parser {
    tokens: Vec<Positioned<Token>>,
    index: usize,
    /// Position just past the last token, for end-of-document errors.
    end: SourcePosition,
}

impl Parser {
    fn new(source: &str) -> Result<Self, Positioned<ParseError>> {
        let mut tokens = Vec::new();
        for token in Lexer::new(source) {
            tokens.push(token.map_err(|error| error.map(ParseError::Lexical))?);
        }
        let end = tokens
            .last()
            .map(|token| token.position)
            .unwrap_or_else(SourcePosition::start);
        Ok(Parser {
            tokens,
            index: 0,
            end,
        })
    }

    fn peek(&self) -> Option<&Positioned<Token>> {
        self.tokens.get(self.index)
    }

    fn next_token(&mut self, expected: &str) -> Result<Positioned<Token>, Positioned<ParseError>> {
        match self.tokens.get(self.index) {
            Some(token) => {
                self.index += 1;
                Ok(token.clone())
            }
            None => Err(Positioned::new(
                self.end,
                ParseError::UnexpectedEnd(expected.to_string()),
            )),
        }
    }

    fn unexpected<T>(
        &self,
        expected: &str,
        found: &Positioned<Token>,
    ) -> Result<T, Positioned<ParseError>> {
        Err(Positioned::new(
            found.position,
            ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: found.item.to_string(),
            },
        ))
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<SourcePosition, Positioned<ParseError>> {
        let found = self.next_token(expected)?;
        if found.item == token {
            Ok(found.position)
        } else {
            self.unexpected(expected, &found)
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek().is_some_and(|t| &t.item == token) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn parse_name(&mut self, expected: &str) -> Result<Positioned<String>, Positioned<ParseError>> {
        let token = self.next_token(expected)?;
        match token.item {
            Token::Name(name) => Ok(Positioned::new(token.position, name)),
            _ => self.unexpected(expected, &token),
        }
    }

    /// Consume a name only when it matches a keyword of the grammar.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self
            .peek()
            .is_some_and(|t| matches!(&t.item, Token::Name(name) if name == keyword))
        {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn parse_document(&mut self) -> Result<Document, Positioned<ParseError>> {
        let mut definitions = Vec::new();
        while let Some(token) = self.peek() {
            let position = token.position;
            match &token.item {
                Token::BraceL => {
                    // shorthand query
                    let selection_set = self.parse_selection_set()?;
                    definitions.push(Definition::Operation(OperationDefinition {
                        position,
                        kind: OperationKind::Query,
                        name: None,
                        variables: Vec::new(),
                        directives: Vec::new(),
                        selection_set,
                    }));
                }
                Token::Name(name) => match name.as_str() {
                    "query" | "mutation" | "subscription" => {
                        definitions.push(Definition::Operation(self.parse_operation()?));
                    }
                    "fragment" => {
                        definitions.push(Definition::Fragment(self.parse_fragment()?));
                    }
                    _ => {
                        let token = token.clone();
                        return self.unexpected("a definition", &token);
                    }
                },
                _ => {
                    let token = token.clone();
                    return self.unexpected("a definition", &token);
                }
            }
        }
        if definitions.is_empty() {
            return Err(Positioned::new(
                self.end,
                ParseError::UnexpectedEnd("a definition".to_string()),
            ));
        }
        Ok(Document { definitions })
    }

    fn parse_operation(&mut self) -> Result<OperationDefinition, Positioned<ParseError>> {
        let keyword = self.parse_name("an operation keyword")?;
        let kind = match keyword.item.as_str() {
            "query" => OperationKind::Query,
            "mutation" => OperationKind::Mutation,
            "subscription" => OperationKind::Subscription,
            _ => {
                let token = Positioned::new(keyword.position, Token::Name(keyword.item));
                return self.unexpected("an operation keyword", &token);
            }
        };
        let name = match self.peek() {
            Some(token) if matches!(&token.item, Token::Name(_)) => {
                Some(self.parse_name("an operation name")?.item)
            }
            _ => None,
        };
        let variables = if self.peek().is_some_and(|t| t.item == Token::ParenL) {
            self.parse_variable_definitions()?
        } else {
            Vec::new()
        };
        let directives = self.parse_directives()?;
        let selection_set = self.parse_selection_set()?;
        Ok(OperationDefinition {
            position: keyword.position,
            kind,
            name,
            variables,
            directives,
            selection_set,
        })
    }

    fn parse_variable_definitions(
        &mut self,
    ) -> Result<Vec<VariableDefinition>, Positioned<ParseError>> {
        self.expect(Token::ParenL, "'('")?;
        let mut variables = Vec::new();
        loop {
            if self.eat(&Token::ParenR) {
                if variables.is_empty() {
                    return Err(Positioned::new(
                        self.end,
                        ParseError::UnexpectedEnd("a variable definition".to_string()),
                    ));
                }
                return Ok(variables);
            }
            let position = self.expect(Token::Dollar, "'$'")?;
            let name = self.parse_name("a variable name")?.item;
            self.expect(Token::Colon, "':'")?;
            let var_type = self.parse_type_annotation()?;
            let default_value = if self.eat(&Token::Equals) {
                Some(self.parse_value()?)
            } else {
                None
            };
            // directives on variable definitions are legal, nothing uses them
            self.parse_directives()?;
            variables.push(VariableDefinition {
                position,
                name,
                var_type,
                default_value,
            });
        }
    }

    fn parse_type_annotation(&mut self) -> Result<TypeAnnotation, Positioned<ParseError>> {
        let token = self.next_token("a type")?;
        let inner = match token.item {
            Token::Name(name) => TypeAnnotation::Named(name),
            Token::BracketL => {
                let inner = self.parse_type_annotation()?;
                self.expect(Token::BracketR, "']'")?;
                TypeAnnotation::List(Box::new(inner))
            }
            _ => return self.unexpected("a type", &token),
        };
        if self.eat(&Token::Bang) {
            Ok(TypeAnnotation::NonNull(Box::new(inner)))
        } else {
            Ok(inner)
        }
    }

    fn parse_fragment(&mut self) -> Result<FragmentDefinition, Positioned<ParseError>> {
        let keyword = self.parse_name("'fragment'")?;
        let name = self.parse_name("a fragment name")?;
        if name.item == "on" {
            return Err(Positioned::new(name.position, ParseError::InvalidFragmentName));
        }
        if !self.eat_keyword("on") {
            let found = self.next_token("'on'")?;
            return self.unexpected("'on'", &found);
        }
        let type_condition = self.parse_name("a type condition")?;
        let directives = self.parse_directives()?;
        let selection_set = self.parse_selection_set()?;
        Ok(FragmentDefinition {
            position: keyword.position,
            name: name.item,
            type_condition,
            directives,
            selection_set,
        })
    }

    fn parse_selection_set(&mut self) -> Result<SelectionSet, Positioned<ParseError>> {
        let position = self.expect(Token::BraceL, "'{'")?;
        let mut items = Vec::new();
        loop {
            if self.eat(&Token::BraceR) {
                if items.is_empty() {
                    return Err(Positioned::new(
                        position,
                        ParseError::UnexpectedEnd("a selection".to_string()),
                    ));
                }
                return Ok(SelectionSet { position, items });
            }
            items.push(self.parse_selection()?);
        }
    }

    fn parse_selection(&mut self) -> Result<Selection, Positioned<ParseError>> {
        if self.peek().is_some_and(|t| t.item == Token::Spread) {
            let spread = self.next_token("'...'")?;
            return self.parse_fragment_selection(spread.position);
        }
        let name = self.parse_name("a field name")?;
        let (alias, name) = if self.eat(&Token::Colon) {
            let field_name = self.parse_name("a field name")?;
            (Some(name.item), field_name)
        } else {
            (None, name)
        };
        let arguments = if self.peek().is_some_and(|t| t.item == Token::ParenL) {
            self.parse_arguments()?
        } else {
            IndexMap::new()
        };
        let directives = self.parse_directives()?;
        let selection_set = if self.peek().is_some_and(|t| t.item == Token::BraceL) {
            Some(self.parse_selection_set()?)
        } else {
            None
        };
        Ok(Selection::Field(Field {
            position: name.position,
            alias,
            name: name.item,
            arguments,
            directives,
            selection_set,
        }))
    }

    // after the `...`: either a fragment spread or an inline fragment
    fn parse_fragment_selection(
        &mut self,
        position: SourcePosition,
    ) -> Result<Selection, Positioned<ParseError>> {
        match self.peek() {
            Some(token) if matches!(&token.item, Token::Name(name) if name != "on") => {
                let name = self.parse_name("a fragment name")?.item;
                let directives = self.parse_directives()?;
                Ok(Selection::FragmentSpread(FragmentSpread {
                    position,
                    name,
                    directives,
                }))
            }
            _ => {
                let type_condition = if self.eat_keyword("on") {
                    Some(self.parse_name("a type condition")?)
                } else {
                    None
                };
                let directives = self.parse_directives()?;
                let selection_set = self.parse_selection_set()?;
                Ok(Selection::InlineFragment(InlineFragment {
                    position,
                    type_condition,
                    directives,
                    selection_set,
                }))
            }
        }
    }

    fn parse_arguments(&mut self) -> Result<IndexMap<String, Value>, Positioned<ParseError>> {
        self.expect(Token::ParenL, "'('")?;
        let mut arguments = IndexMap::new();
        loop {
            if self.eat(&Token::ParenR) {
                if arguments.is_empty() {
                    return Err(Positioned::new(
                        self.end,
                        ParseError::UnexpectedEnd("an argument".to_string()),
                    ));
                }
                return Ok(arguments);
            }
            let name = self.parse_name("an argument name")?;
            self.expect(Token::Colon, "':'")?;
            let value = self.parse_value()?;
            if arguments.insert(name.item.clone(), value).is_some() {
                return Err(Positioned::new(
                    name.position,
                    ParseError::DuplicateArgument(name.item),
                ));
            }
        }
    }

    fn parse_directives(&mut self) -> Result<Vec<Directive>, Positioned<ParseError>> {
        let mut directives = Vec::new();
        while self.peek().is_some_and(|t| t.item == Token::At) {
            let position = self.expect(Token::At, "'@'")?;
            let name = self.parse_name("a directive name")?.item;
            let arguments = if self.peek().is_some_and(|t| t.item == Token::ParenL) {
                self.parse_arguments()?
            } else {
                IndexMap::new()
            };
            directives.push(Directive {
                position,
                name,
                arguments,
            });
        }
        Ok(directives)
    }

    fn parse_value(&mut self) -> Result<Value, Positioned<ParseError>> {
        let token = self.next_token("a value")?;
        match token.item {
            Token::Int(i) => Ok(Value::Int(i)),
            Token::Float(f) => Ok(Value::Float(f)),
            Token::String(s) => Ok(Value::String(s)),
            Token::Dollar => {
                let name = self.parse_name("a variable name")?;
                Ok(Value::Variable(name.item))
            }
            Token::Name(name) => match name.as_str() {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                "null" => Ok(Value::Null),
                _ => Ok(Value::Enum(name)),
            },
            Token::BracketL => {
                let mut items = Vec::new();
                while !self.eat(&Token::BracketR) {
                    items.push(self.parse_value()?);
                }
                Ok(Value::List(items))
            }
            Token::BraceL => {
                let mut fields = IndexMap::new();
                loop {
                    if self.eat(&Token::BraceR) {
                        return Ok(Value::Object(fields));
                    }
                    let name = self.parse_name("an object field name")?;
                    self.expect(Token::Colon, "':'")?;
                    let value = self.parse_value()?;
                    if fields.insert(name.item.clone(), value).is_some() {
                        return Err(Positioned::new(
                            name.position,
                            ParseError::DuplicateArgument(name.item),
                        ));
                    }
                }
            }
            _ => self.unexpected("a value", &token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operation(source: &str) -> OperationDefinition {
        let document = parse_document(source).unwrap();
        match document.definitions.into_iter().next().unwrap() {
            Definition::Operation(op) => op,
            Definition::Fragment(_) => panic!("expected an operation"),
        }
    }

    #[test]
    fn shorthand_query() {
        let op = operation("{ hero { name } }");
        assert_eq!(op.kind, OperationKind::Query);
        assert_eq!(op.name, None);
        assert_eq!(op.selection_set.items.len(), 1);
    }

    #[test]
    fn named_operation_with_variables() {
        let op = operation("query Hero($ep: Episode! = JEDI, $withId: Boolean) { hero { name } }");
        assert_eq!(op.name.as_deref(), Some("Hero"));
        assert_eq!(op.variables.len(), 2);
        assert_eq!(op.variables[0].name, "ep");
        assert_eq!(
            op.variables[0].var_type,
            TypeAnnotation::NonNull(Box::new(TypeAnnotation::Named("Episode".to_string())))
        );
        assert_eq!(
            op.variables[0].default_value,
            Some(Value::Enum("JEDI".to_string()))
        );
        assert_eq!(op.variables[1].default_value, None);
    }

    #[test]
    fn aliases_arguments_and_directives() {
        let op = operation(
            r#"{ pet: hero(id: "1000", height: 1.72) { name @include(if: $yes) } }"#,
        );
        let Selection::Field(field) = &op.selection_set.items[0] else {
            panic!("expected a field");
        };
        assert_eq!(field.alias.as_deref(), Some("pet"));
        assert_eq!(field.name, "hero");
        assert_eq!(
            field.arguments.get("id"),
            Some(&Value::String("1000".to_string()))
        );
        assert_eq!(field.arguments.get("height"), Some(&Value::Float(1.72)));
        let selection_set = field.selection_set.as_ref().unwrap();
        let Selection::Field(name) = &selection_set.items[0] else {
            panic!("expected a field");
        };
        assert_eq!(name.directives[0].name, "include");
        assert_eq!(
            name.directives[0].arguments.get("if"),
            Some(&Value::Variable("yes".to_string()))
        );
    }

    #[test]
    fn fragments_and_spreads() {
        let document = parse_document(
            "query { node { ...NodeParts ... on Dog { barkVolume } } }\n\
             fragment NodeParts on Node { id }",
        )
        .unwrap();
        assert_eq!(document.definitions.len(), 2);
        let Definition::Fragment(fragment) = &document.definitions[1] else {
            panic!("expected a fragment");
        };
        assert_eq!(fragment.name, "NodeParts");
        assert_eq!(fragment.type_condition.item, "Node");
    }

    #[test]
    fn inline_fragment_without_type_condition() {
        let op = operation("{ hero { ... @include(if: $yes) { name } } }");
        let Selection::Field(hero) = &op.selection_set.items[0] else {
            panic!("expected a field");
        };
        let Selection::InlineFragment(inline) =
            &hero.selection_set.as_ref().unwrap().items[0]
        else {
            panic!("expected an inline fragment");
        };
        assert!(inline.type_condition.is_none());
        assert_eq!(inline.directives[0].name, "include");
    }

    #[test]
    fn list_and_object_values() {
        let op = operation(r#"{ search(filter: {tags: ["a", "b"], limit: 10, extra: null}) { id } }"#);
        let Selection::Field(field) = &op.selection_set.items[0] else {
            panic!("expected a field");
        };
        let Some(Value::Object(filter)) = field.arguments.get("filter") else {
            panic!("expected an object value");
        };
        assert_eq!(
            filter.get("tags"),
            Some(&Value::List(vec![
                Value::String("a".to_string()),
                Value::String("b".to_string())
            ]))
        );
        assert_eq!(filter.get("limit"), Some(&Value::Int(10)));
        assert_eq!(filter.get("extra"), Some(&Value::Null));
    }

    #[test]
    fn on_is_not_a_fragment_name() {
        let error = parse_document("fragment on on Dog { name }").unwrap_err();
        assert_eq!(error.item, ParseError::InvalidFragmentName);
    }

    #[test]
    fn error_carries_position() {
        // the empty selection set is reported at its opening brace
        let error = parse_document("query {\n  hero {\n}").unwrap_err();
        assert_eq!(error.position, SourcePosition::new(2, 8));
    }

    #[test]
    fn empty_selection_set_is_rejected() {
        assert!(parse_document("{ }").is_err());
        assert!(parse_document("").is_err());
    }

    #[test]
    fn duplicate_argument() {
        let error = parse_document("{ hero(id: 1, id: 2) { name } }").unwrap_err();
        assert_eq!(
            error.item,
            ParseError::DuplicateArgument("id".to_string())
        );
    }
}
