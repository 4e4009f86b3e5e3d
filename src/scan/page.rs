//! One page: its document, scanner and interaction state together.

use crate::core::currency::CurrencyCode;
use crate::rates::message::{ConvertResponse, Notification};
use crate::rates::service::RateServiceHandle;
use crate::scan::document::{Document, MutationRecord, NodeId};
use crate::scan::interaction::{ConversionTicket, DisplayInstruction, Interaction, Interactor};
use crate::scan::scanner::{ScanReport, Scanner, TaggedAmount, AMOUNT_CLASS};

/// A scanned page driven by hover events and settings notifications.
///
/// Scanning and hovering do nothing while the page is disabled.
#[derive(Debug, Clone)]
pub struct Page {
    document: Document,
    scanner: Scanner,
    interactor: Interactor,
}

impl Page {
    pub fn new(document: Document, target: CurrencyCode) -> Self {
        Self::with_scanner(document, Scanner::default(), target)
    }

    pub fn with_scanner(document: Document, scanner: Scanner, target: CurrencyCode) -> Self {
        Self {
            document,
            scanner,
            interactor: Interactor::new(target),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn interactor(&self) -> &Interactor {
        &self.interactor
    }

    /// Scan the whole document.
    pub fn scan(&mut self) -> ScanReport {
        let root = self.document.root();
        self.scan_subtree(root)
    }

    /// Scan below `root` only.
    pub fn scan_subtree(&mut self, root: NodeId) -> ScanReport {
        if !self.interactor.is_enabled() {
            return ScanReport::default();
        }
        self.scanner.scan(&mut self.document, root)
    }

    /// Tagged prices in document order.
    pub fn tagged_amounts(&self) -> Vec<TaggedAmount> {
        self.scanner
            .tagged_amounts(&self.document, self.document.root())
    }

    /// Append `child` under `parent`, as dynamic page content would.
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> MutationRecord {
        self.document.append_child(parent, child)
    }

    /// Mutable access for building dynamic content before [`append`](Self::append).
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Hover over `node` or anything inside a tagged price.
    pub fn hover(&mut self, node: NodeId) -> Interaction {
        let tagged = self
            .document
            .closest_with_class(node, AMOUNT_CLASS)
            .and_then(|price| TaggedAmount::from_element(&self.document, price));
        match tagged {
            Some(tagged) => self.interactor.on_interact(&tagged),
            None => Interaction::Ignored,
        }
    }

    pub fn leave(&mut self, node: NodeId) {
        let price = self
            .document
            .closest_with_class(node, AMOUNT_CLASS)
            .unwrap_or(node);
        self.interactor.on_leave(price);
    }

    pub fn complete(
        &mut self,
        ticket: ConversionTicket,
        response: ConvertResponse,
    ) -> Option<DisplayInstruction> {
        self.interactor.complete(ticket, response)
    }

    pub fn notify(&mut self, notification: Notification) {
        self.interactor.apply(notification);
    }

    /// Hover and, on a local miss, resolve through the rate service.
    ///
    /// Returns the instruction to display, if any. A transport failure is
    /// reported like a failed conversion.
    pub async fn hover_and_resolve(
        &mut self,
        node: NodeId,
        service: &RateServiceHandle,
    ) -> Option<DisplayInstruction> {
        match self.hover(node) {
            Interaction::Ignored => None,
            Interaction::Ready(instruction) => Some(instruction),
            Interaction::Pending { ticket, .. } => {
                let key = ticket.key().clone();
                let response = service
                    .convert(key.amount, key.from, key.to)
                    .await
                    .unwrap_or_else(ConvertResponse::failed);
                self.complete(ticket, response)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_page_does_not_scan() {
        let mut page = Page::new(Document::from_text("$5"), CurrencyCode::new("EUR"));
        page.notify(Notification::ToggleExtension { enabled: false });
        assert_eq!(page.scan().amounts_tagged(), 0);

        page.notify(Notification::ToggleExtension { enabled: true });
        assert_eq!(page.scan().amounts_tagged(), 1);
    }

    #[test]
    fn test_hover_inside_price_text() {
        let mut page = Page::new(Document::from_text("only €8"), CurrencyCode::new("USD"));
        let report = page.scan();
        let price = report.tagged[0];
        let inner = page.document().children(price)[0];

        assert!(matches!(page.hover(inner), Interaction::Pending { .. }));
        assert_eq!(page.interactor().active(), Some(price));

        page.leave(inner);
        assert_eq!(page.interactor().active(), None);
    }

    #[test]
    fn test_hover_untagged_is_ignored() {
        let mut page = Page::new(Document::from_text("plain"), CurrencyCode::new("USD"));
        let root = page.document().root();
        assert_eq!(page.hover(root), Interaction::Ignored);
    }

    #[test]
    fn test_appended_content_scans_as_subtree() {
        let mut page = Page::new(Document::from_text("$1"), CurrencyCode::new("EUR"));
        page.scan();

        let root = page.document().root();
        let div = page.document_mut().create_element("div");
        let text = page.document_mut().create_text("now 20 GBP");
        page.document_mut().append_child(div, text);
        let record = page.append(root, div);

        assert_eq!(page.scan_subtree(record.added[0]).amounts_tagged(), 1);
        assert_eq!(page.tagged_amounts().len(), 2);
    }
}
