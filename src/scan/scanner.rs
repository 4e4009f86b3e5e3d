use crate::core::currency::CurrencyCode;
use crate::scan::document::{Document, NodeId};
use crate::scan::extractor::{DetectedAmount, Extractor};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Class of the span that replaces a processed text node.
pub const WRAPPED_CLASS: &str = "currency-converter-wrapped";
/// Class of the span around one detected price.
pub const AMOUNT_CLASS: &str = "currency-amount";
pub const ATTR_AMOUNT: &str = "data-amount";
pub const ATTR_CURRENCY: &str = "data-currency";
pub const ATTR_ORIGINAL: &str = "data-original";

/// Containers whose text is never scanned.
pub const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript"];

/// Counters from one [`Scanner::scan`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Text nodes that passed the container and pre-filter checks.
    pub text_nodes_considered: usize,
    /// Text nodes replaced by a wrapper.
    pub text_nodes_wrapped: usize,
    /// Newly tagged price elements, in document order.
    pub tagged: Vec<NodeId>,
}

impl ScanReport {
    pub fn amounts_tagged(&self) -> usize {
        self.tagged.len()
    }
}

/// The data a tagged price element carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedAmount {
    pub node: NodeId,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub original: String,
}

impl TaggedAmount {
    /// Read the tag data of `node`; `None` if it is not a well-formed price element.
    pub fn from_element(doc: &Document, node: NodeId) -> Option<Self> {
        let element = doc.element(node)?;
        if !element.has_class(AMOUNT_CLASS) {
            return None;
        }
        let amount = Decimal::from_str(element.attribute(ATTR_AMOUNT)?).ok()?;
        let currency = CurrencyCode::new(element.attribute(ATTR_CURRENCY)?);
        let original = element.attribute(ATTR_ORIGINAL)?.to_string();
        Some(Self {
            node,
            amount,
            currency,
            original,
        })
    }
}

/// Walks a document, finds prices in visible text and wraps them in tagged spans.
///
/// Scanning is idempotent: text already inside a wrapper or a price span is
/// skipped, so a second pass over an unchanged tree tags nothing.
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    extractor: Extractor,
}

impl Scanner {
    pub fn new(extractor: Extractor) -> Self {
        Self { extractor }
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Tag every untagged price under `root`.
    pub fn scan(&self, doc: &mut Document, root: NodeId) -> ScanReport {
        let mut report = ScanReport::default();

        let candidates: Vec<NodeId> = doc
            .descendants(root)
            .into_iter()
            .filter(|&node| self.accepts(doc, node))
            .collect();
        report.text_nodes_considered = candidates.len();

        for node in candidates {
            let tagged = self.wrap_text_node(doc, node);
            if !tagged.is_empty() {
                report.text_nodes_wrapped += 1;
                report.tagged.extend(tagged);
            }
        }

        log::debug!(
            "scan: {} candidate text nodes, {} wrapped, {} prices tagged",
            report.text_nodes_considered,
            report.text_nodes_wrapped,
            report.amounts_tagged()
        );
        report
    }

    /// Every tagged price element under `root`, in document order.
    pub fn tagged_amounts(&self, doc: &Document, root: NodeId) -> Vec<TaggedAmount> {
        doc.elements_with_class(root, AMOUNT_CLASS)
            .into_iter()
            .filter_map(|node| TaggedAmount::from_element(doc, node))
            .collect()
    }

    fn accepts(&self, doc: &Document, node: NodeId) -> bool {
        let Some(text) = doc.text(node) else {
            return false;
        };
        let excluded = doc.ancestors(node).any(|ancestor| {
            doc.element(ancestor).is_some_and(|e| {
                SKIPPED_TAGS.contains(&e.tag())
                    || e.has_class(WRAPPED_CLASS)
                    || e.has_class(AMOUNT_CLASS)
            })
        });
        !excluded && self.extractor.may_contain_price(text)
    }

    fn wrap_text_node(&self, doc: &mut Document, node: NodeId) -> Vec<NodeId> {
        let Some(text) = doc.text(node).map(str::to_owned) else {
            return Vec::new();
        };
        let found = self.extractor.extract(&text);
        if found.is_empty() {
            return Vec::new();
        }

        let wrapper = doc.create_element("span");
        if let Some(element) = doc.element_mut(wrapper) {
            element.add_class(WRAPPED_CLASS);
        }

        let mut tagged = Vec::with_capacity(found.len());
        let mut cursor = 0;
        for detected in &found {
            if detected.span.start > cursor {
                let before = doc.create_text(&text[cursor..detected.span.start]);
                doc.append_child(wrapper, before);
            }
            let price = tag_element(doc, detected);
            doc.append_child(wrapper, price);
            tagged.push(price);
            cursor = detected.span.end;
        }
        if cursor < text.len() {
            let after = doc.create_text(&text[cursor..]);
            doc.append_child(wrapper, after);
        }

        if !doc.replace_child(node, wrapper) {
            // Detached text node: nothing visible to tag.
            return Vec::new();
        }
        tagged
    }
}

fn tag_element(doc: &mut Document, detected: &DetectedAmount) -> NodeId {
    let span = doc.create_element("span");
    if let Some(element) = doc.element_mut(span) {
        element.add_class(AMOUNT_CLASS);
        element.set_attribute(ATTR_AMOUNT, detected.amount.to_string());
        element.set_attribute(ATTR_CURRENCY, detected.currency.as_str());
        element.set_attribute(ATTR_ORIGINAL, detected.raw_text.as_str());
    }
    let text = doc.create_text(detected.raw_text.as_str());
    doc.append_child(span, text);
    span
}
