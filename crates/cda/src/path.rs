//! Namespace-qualified location paths.
//!
//! A small subset of XPath: absolute paths made of child steps, each optionally carrying a
//! single attribute-equality predicate, e.g.
//!
//! ```text
//! /cda:ClinicalDocument/cda:component/cda:section/cda:templateId[@root='2.16.840.1.113883.10.20.22.2.4']
//! ```
//!
//! Prefixes are resolved through a [`NamespaceContext`] supplied with each query. The context
//! is immutable and owned by the caller; documents carry no prefix registrations of their own.

use crate::document::{Document, Element};
use crate::{CdaError, CdaResult, CDA_NAMESPACE, CDA_PREFIX};
use std::collections::BTreeMap;

/// Prefix to namespace-URI bindings used to evaluate a [`Path`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespaceContext {
    bindings: BTreeMap<String, String>,
}

impl NamespaceContext {
    /// An empty context. Only unprefixed steps can be evaluated against it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context binding `cda` to the HL7 v3 namespace.
    pub fn cda() -> Self {
        Self::new().with_binding(CDA_PREFIX, CDA_NAMESPACE)
    }

    /// Returns a copy of this context with `prefix` bound to `uri`.
    pub fn with_binding(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.bindings.insert(prefix.into(), uri.into());
        self
    }

    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }
}

/// A parsed absolute location path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    expression: String,
    steps: Vec<Step>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Step {
    prefix: Option<String>,
    local_name: String,
    predicate: Option<AttributePredicate>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct AttributePredicate {
    name: String,
    value: String,
}

/// A step with its prefix resolved against a context.
struct BoundStep<'a> {
    namespace: Option<&'a str>,
    step: &'a Step,
}

impl BoundStep<'_> {
    fn matches(&self, element: &Element) -> bool {
        if element.local_name() != self.step.local_name || element.namespace() != self.namespace
        {
            return false;
        }
        match &self.step.predicate {
            Some(p) => element.attribute(&p.name) == Some(p.value.as_str()),
            None => true,
        }
    }
}

impl Path {
    /// Parse a path expression.
    ///
    /// # Errors
    ///
    /// Returns [`CdaError::InvalidPath`] if the expression is not absolute, has an empty step,
    /// or contains a predicate other than `[@name='value']`.
    pub fn parse(expression: &str) -> CdaResult<Self> {
        let invalid = |reason: &str| CdaError::InvalidPath {
            path: expression.to_string(),
            reason: reason.to_string(),
        };

        let body = expression
            .strip_prefix('/')
            .ok_or_else(|| invalid("path must be absolute"))?;

        let steps = split_steps(body)
            .ok_or_else(|| invalid("unterminated predicate or quote"))?
            .into_iter()
            .map(|raw| parse_step(raw).map_err(|reason| invalid(&reason)))
            .collect::<CdaResult<Vec<_>>>()?;

        Ok(Self {
            expression: expression.to_string(),
            steps,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.expression
    }

    /// All elements matched by the path, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`CdaError::UnboundPrefix`] if a step uses a prefix the context does not bind.
    pub fn select<'d>(
        &self,
        document: &'d Document,
        namespaces: &NamespaceContext,
    ) -> CdaResult<Vec<&'d Element>> {
        let bound = self
            .steps
            .iter()
            .map(|step| {
                let namespace = match &step.prefix {
                    Some(prefix) => Some(
                        namespaces
                            .resolve(prefix)
                            .ok_or_else(|| CdaError::UnboundPrefix(prefix.clone()))?,
                    ),
                    None => None,
                };
                Ok::<_, CdaError>(BoundStep { namespace, step })
            })
            .collect::<CdaResult<Vec<_>>>()?;

        let Some((first, rest)) = bound.split_first() else {
            return Ok(Vec::new());
        };

        let root = document.root();
        let mut frontier: Vec<&'d Element> = if first.matches(root) {
            vec![root]
        } else {
            Vec::new()
        };

        // Frontier nodes sit at the same depth with disjoint subtrees, so expanding them in
        // order keeps the result in document order.
        for step in rest {
            frontier = frontier
                .into_iter()
                .flat_map(|element| element.children().filter(move |child| step.matches(child)))
                .collect();
            if frontier.is_empty() {
                break;
            }
        }

        Ok(frontier)
    }

    /// Whether the path matches at least one element.
    pub fn exists(&self, document: &Document, namespaces: &NamespaceContext) -> CdaResult<bool> {
        Ok(!self.select(document, namespaces)?.is_empty())
    }
}

impl std::str::FromStr for Path {
    type Err = CdaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

/// Split on `/` outside of predicates and quoted strings.
fn split_steps(body: &str) -> Option<Vec<&str>> {
    let mut steps = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0usize;

    for (i, c) in body.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') if depth > 0 => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.checked_sub(1)?,
            (None, '/') if depth == 0 => {
                steps.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth != 0 || quote.is_some() {
        return None;
    }
    steps.push(&body[start..]);
    Some(steps)
}

fn parse_step(raw: &str) -> Result<Step, String> {
    let (name, predicate) = match raw.find('[') {
        Some(open) => (&raw[..open], Some(parse_predicate(&raw[open..])?)),
        None => (raw, None),
    };

    if name.is_empty() {
        return Err("empty step".into());
    }

    let (prefix, local_name) = match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    };

    let valid = |s: &str| {
        !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
    };
    if !valid(local_name) || prefix.is_some_and(|p| !valid(p)) {
        return Err(format!("invalid step name '{name}'"));
    }

    Ok(Step {
        prefix: prefix.map(str::to_string),
        local_name: local_name.to_string(),
        predicate,
    })
}

fn parse_predicate(raw: &str) -> Result<AttributePredicate, String> {
    let unsupported = || format!("unsupported predicate '{raw}' (expected [@name='value'])");

    let inner = raw
        .strip_prefix("[@")
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(unsupported)?;
    let (name, quoted) = inner.split_once('=').ok_or_else(unsupported)?;
    let name = name.trim();
    let quoted = quoted.trim();

    let value = quoted
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| quoted.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
        .ok_or_else(unsupported)?;

    if name.is_empty() {
        return Err(unsupported());
    }

    Ok(AttributePredicate {
        name: name.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<ClinicalDocument xmlns="urn:hl7-org:v3">
  <component>
    <section><templateId root="1.2.3"/><title>first</title></section>
    <section><templateId root="4.5.6"/><title>second</title></section>
  </component>
  <component>
    <section><templateId root="4.5.6"/><title>third</title></section>
  </component>
</ClinicalDocument>"#;

    fn doc() -> Document {
        Document::parse(SAMPLE).expect("parse sample")
    }

    #[test]
    fn selects_in_document_order() {
        let path = Path::parse("/cda:ClinicalDocument/cda:component/cda:section/cda:title")
            .expect("parse path");
        let titles: Vec<String> = path
            .select(&doc(), &NamespaceContext::cda())
            .expect("select")
            .into_iter()
            .map(Element::text)
            .collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }

    #[test]
    fn applies_attribute_predicate() {
        let path = Path::parse(
            "/cda:ClinicalDocument/cda:component/cda:section/cda:templateId[@root='4.5.6']",
        )
        .expect("parse path");
        let doc = doc();
        let matched = path.select(&doc, &NamespaceContext::cda()).expect("select");
        assert_eq!(matched.len(), 2);

        let missing = Path::parse(
            "/cda:ClinicalDocument/cda:component/cda:section/cda:templateId[@root=\"9.9\"]",
        )
        .expect("parse path");
        assert!(!missing
            .exists(&doc, &NamespaceContext::cda())
            .expect("exists"));
    }

    #[test]
    fn unprefixed_steps_do_not_match_namespaced_elements() {
        let path = Path::parse("/ClinicalDocument/component").expect("parse path");
        assert!(path
            .select(&doc(), &NamespaceContext::new())
            .expect("select")
            .is_empty());
    }

    #[test]
    fn prefix_binding_is_by_uri_not_spelling() {
        let ctx = NamespaceContext::new().with_binding("hl7", CDA_NAMESPACE);
        let path = Path::parse("/hl7:ClinicalDocument/hl7:component").expect("parse path");
        assert_eq!(path.select(&doc(), &ctx).expect("select").len(), 2);
    }

    #[test]
    fn unbound_prefix_is_an_error() {
        let path = Path::parse("/x:ClinicalDocument").expect("parse path");
        let err = path
            .select(&doc(), &NamespaceContext::cda())
            .expect_err("should reject unbound prefix");
        assert!(matches!(err, CdaError::UnboundPrefix(p) if p == "x"));
    }

    #[test]
    fn predicate_values_may_contain_slashes() {
        let path = Path::parse("/a/b[@href='x/y']").expect("parse path");
        assert_eq!(path.as_str(), "/a/b[@href='x/y']");
        let doc = Document::parse(r#"<a><b href="x/y"/><b href="x"/></a>"#).expect("parse");
        assert_eq!(
            path.select(&doc, &NamespaceContext::new())
                .expect("select")
                .len(),
            1
        );
    }

    #[test]
    fn rejects_malformed_expressions() {
        for expr in [
            "relative/path",
            "/a//b",
            "/a/b[@root='x'",
            "/a/b[position()=1]",
            "/a/b[@='x']",
            "/a/:b",
        ] {
            let err = Path::parse(expr).expect_err(expr);
            assert!(
                matches!(err, CdaError::InvalidPath { ref path, .. } if path == expr),
                "unexpected error for {expr}: {err:?}"
            );
        }
    }
}
