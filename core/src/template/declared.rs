use super::count::create_count_query_for;
use super::lexer::{expression_body, tokenize, TokenKind};
use super::rewriter::Rewriter;
use super::scan::{self, TokenStream};
use super::sort::apply_sorting;
use crate::binding::ParameterBinding;
use crate::error::CompileError;
use crate::paging::Sort;
use lazy_static::lazy_static;
use std::collections::BTreeSet;

lazy_static! {
    static ref EMPTY: DeclaredQuery = DeclaredQuery {
        text: String::new(),
        native: false,
        bindings: Vec::new(),
        alias: None,
        entity: None,
        projection: String::new(),
        has_constructor_expression: false,
        join_aliases: BTreeSet::new(),
        projection_aliases: BTreeSet::new(),
        jdbc_style: false,
        has_named_parameter: false,
    };
}

/// A query supplied as template text, in canonical form.
///
/// Parsed once; the bindings and derived facts never change afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredQuery {
    text: String,
    native: bool,
    bindings: Vec<ParameterBinding>,
    alias: Option<String>,
    entity: Option<String>,
    projection: String,
    has_constructor_expression: bool,
    join_aliases: BTreeSet<String>,
    projection_aliases: BTreeSet<String>,
    jdbc_style: bool,
    has_named_parameter: bool,
}

impl DeclaredQuery {
    pub fn parse(template: &str) -> Result<Self, CompileError> {
        Self::compile(template, false, None)
    }

    pub fn native(template: &str) -> Result<Self, CompileError> {
        Self::compile(template, true, None)
    }

    /// Parses `template`, first substituting `#{#entityName}` with `entity_name`.
    pub fn compile(
        template: &str,
        native: bool,
        entity_name: Option<&str>,
    ) -> Result<Self, CompileError> {
        let expanded = expand_template_expressions(template, entity_name)?;
        let tokens = tokenize(&expanded)?;
        let rewritten = Rewriter::new(&expanded, &tokens)?.rewrite()?;

        let text = rewritten.text;
        let tokens = tokenize(&text)?;
        let stream = TokenStream::new(&text, &tokens);
        let (entity, alias) = scan::entity_and_alias(&stream);

        let query = Self {
            alias: alias.map(str::to_string),
            entity: entity.map(str::to_string),
            projection: scan::projection(&stream),
            has_constructor_expression: scan::has_constructor_expression(&stream),
            join_aliases: scan::join_aliases(&stream),
            projection_aliases: scan::projection_aliases(&stream),
            native,
            bindings: rewritten.bindings,
            jdbc_style: rewritten.jdbc_style,
            has_named_parameter: rewritten.has_named_parameter,
            text,
        };

        tracing::debug!(
            "Declared query '{}' with {} binding(s), alias {:?}",
            query.text,
            query.bindings.len(),
            query.alias
        );
        Ok(query)
    }

    /// Stand-in for "no template".
    pub fn empty() -> &'static DeclaredQuery {
        &EMPTY
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_native(&self) -> bool {
        self.native
    }

    pub fn bindings(&self) -> &[ParameterBinding] {
        &self.bindings
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    pub fn projection(&self) -> &str {
        &self.projection
    }

    pub fn has_constructor_expression(&self) -> bool {
        self.has_constructor_expression
    }

    /// The projection selects the root entity itself.
    pub fn is_default_projection(&self) -> bool {
        let projection = self.projection.trim();
        projection.is_empty()
            || projection == "*"
            || self
                .alias
                .as_deref()
                .is_some_and(|alias| projection.eq_ignore_ascii_case(alias))
    }

    pub fn join_aliases(&self) -> &BTreeSet<String> {
        &self.join_aliases
    }

    pub fn projection_aliases(&self) -> &BTreeSet<String> {
        &self.projection_aliases
    }

    pub fn uses_jdbc_style_parameters(&self) -> bool {
        self.jdbc_style
    }

    pub fn has_named_parameter(&self) -> bool {
        self.has_named_parameter
    }

    /// Whether an embedded expression reads the call's paging directive.
    pub fn uses_paging_expression(&self) -> bool {
        self.bindings.iter().any(|binding| {
            binding
                .origin()
                .expression_text()
                .is_some_and(|expression| expression.contains("pageable"))
        })
    }

    /// Derives the count query.
    ///
    /// An explicit `count_query_override` is parsed as its own template.
    /// Otherwise the count text is derived from this query and keeps its
    /// bindings; placeholders dropped with an `order by` no longer resolve,
    /// which is why count queries bind leniently.
    pub fn derive_count_query(
        &self,
        count_query_override: Option<&str>,
        count_projection: Option<&str>,
    ) -> Result<DeclaredQuery, CompileError> {
        if let Some(template) = count_query_override {
            return Self::compile(template, self.native, self.entity.as_deref());
        }

        let text = create_count_query_for(&self.text, count_projection)?;
        Ok(Self {
            projection: String::new(),
            has_constructor_expression: false,
            projection_aliases: BTreeSet::new(),
            text,
            ..self.clone()
        })
    }

    /// A copy of this query with `sort` appended to its text.
    pub fn with_sort(&self, sort: &Sort, allow_unsafe: bool) -> Result<DeclaredQuery, CompileError> {
        if !sort.is_sorted() {
            return Ok(self.clone());
        }
        Ok(Self {
            text: apply_sorting(&self.text, sort, allow_unsafe)?,
            ..self.clone()
        })
    }
}

/// Substitutes `#{...}` template expressions. Only `#entityName` is known;
/// when an expression yields no text the template is returned unchanged.
fn expand_template_expressions(
    template: &str,
    entity_name: Option<&str>,
) -> Result<String, CompileError> {
    let tokens = tokenize(template)?;
    if tokens.iter().all(|t| t.kind != TokenKind::TemplateExpression) {
        return Ok(template.to_string());
    }

    let mut expanded = String::with_capacity(template.len());
    let mut cursor = 0;
    for token in tokens.iter().filter(|t| t.kind == TokenKind::TemplateExpression) {
        let body = expression_body(token, template);
        let value = match body {
            "#entityName" => entity_name,
            _ => None,
        };

        let Some(value) = value else {
            tracing::debug!(
                "Template expression '{}' yielded no text; keeping template unchanged",
                body
            );
            return Ok(template.to_string());
        };

        expanded.push_str(&template[cursor..token.start]);
        expanded.push_str(value);
        cursor = token.end;
    }
    expanded.push_str(&template[cursor..]);
    Ok(expanded)
}
