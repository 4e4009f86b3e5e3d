//! Hover interaction with tagged prices.
//!
//! [`Interactor`] is the per-page context: target currency, enabled flag,
//! the element currently under the pointer and a local cache of completed
//! conversions. An interaction either resolves from the local cache or
//! hands out a [`ConversionTicket`]; the ticket's response is later fed back
//! through [`Interactor::complete`], which checks it against the context at
//! that moment rather than the one it was issued in.

use crate::core::conversion::ConversionResult;
use crate::core::currency::CurrencyCode;
use crate::rates::message::{ConvertResponse, Notification, Request};
use crate::scan::document::NodeId;
use crate::scan::scanner::TaggedAmount;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Key of the local conversion cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversionKey {
    pub amount: Decimal,
    pub from: CurrencyCode,
    pub to: CurrencyCode,
}

/// Successful conversions seen on this page.
///
/// Entries never expire; the whole cache is dropped when the target
/// currency changes.
#[derive(Debug, Clone, Default)]
pub struct ConversionCache {
    entries: HashMap<ConversionKey, ConversionResult>,
}

impl ConversionCache {
    pub fn get(&self, key: &ConversionKey) -> Option<&ConversionResult> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: ConversionKey, result: ConversionResult) {
        self.entries.insert(key, result);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What to show next to a hovered price.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayInstruction {
    Loading {
        original: String,
    },
    Converted {
        original: String,
        result: ConversionResult,
    },
    Failed {
        original: String,
        error: String,
    },
}

impl DisplayInstruction {
    pub fn original(&self) -> &str {
        match self {
            DisplayInstruction::Loading { original }
            | DisplayInstruction::Converted { original, .. }
            | DisplayInstruction::Failed { original, .. } => original,
        }
    }
}

/// An outstanding conversion request issued by [`Interactor::on_interact`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTicket {
    node: NodeId,
    key: ConversionKey,
    original: String,
    generation: u64,
}

impl ConversionTicket {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn key(&self) -> &ConversionKey {
        &self.key
    }

    /// The request to send to the rate service.
    pub fn request(&self) -> Request {
        Request::ConvertCurrency {
            amount: self.key.amount,
            from_currency: self.key.from.clone(),
            to_currency: self.key.to.clone(),
        }
    }
}

/// Result of a hover.
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    /// Nothing to show: disabled, or already in the target currency.
    Ignored,
    /// No request needed: a cached conversion, or the loading placeholder
    /// while this element's earlier request is still outstanding.
    Ready(DisplayInstruction),
    /// Show `placeholder` now and send `ticket.request()`.
    Pending {
        placeholder: DisplayInstruction,
        ticket: ConversionTicket,
    },
}

/// Per-page interaction state.
#[derive(Debug, Clone)]
pub struct Interactor {
    target: CurrencyCode,
    enabled: bool,
    active: Option<NodeId>,
    /// Active element whose ticket has not been completed yet.
    awaiting: Option<NodeId>,
    generation: u64,
    cache: ConversionCache,
}

impl Interactor {
    pub fn new(target: CurrencyCode) -> Self {
        Self {
            target,
            enabled: true,
            active: None,
            awaiting: None,
            generation: 0,
            cache: ConversionCache::default(),
        }
    }

    pub fn target(&self) -> &CurrencyCode {
        &self.target
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Element currently under the pointer.
    pub fn active(&self) -> Option<NodeId> {
        self.active
    }

    pub fn cache(&self) -> &ConversionCache {
        &self.cache
    }

    /// Hover over a tagged price.
    pub fn on_interact(&mut self, tagged: &TaggedAmount) -> Interaction {
        if !self.enabled {
            return Interaction::Ignored;
        }
        if self.active != Some(tagged.node) {
            self.awaiting = None;
        }
        self.active = Some(tagged.node);
        if tagged.currency == self.target {
            return Interaction::Ignored;
        }

        let key = ConversionKey {
            amount: tagged.amount,
            from: tagged.currency.clone(),
            to: self.target.clone(),
        };
        if let Some(result) = self.cache.get(&key) {
            log::debug!("local conversion cache hit for {} {}", key.amount, key.from);
            return Interaction::Ready(DisplayInstruction::Converted {
                original: tagged.original.clone(),
                result: result.clone(),
            });
        }

        let placeholder = DisplayInstruction::Loading {
            original: tagged.original.clone(),
        };
        if self.awaiting == Some(tagged.node) {
            return Interaction::Ready(placeholder);
        }
        self.awaiting = Some(tagged.node);

        Interaction::Pending {
            placeholder,
            ticket: ConversionTicket {
                node: tagged.node,
                key,
                original: tagged.original.clone(),
                generation: self.generation,
            },
        }
    }

    /// The pointer left `node`.
    pub fn on_leave(&mut self, node: NodeId) {
        if self.active == Some(node) {
            self.active = None;
            self.awaiting = None;
        }
    }

    /// Feed back the response for `ticket`.
    ///
    /// Responses issued before the last target change are dropped entirely.
    /// Otherwise a success is cached, and an instruction is returned only
    /// while the ticket's element is still the active one.
    pub fn complete(
        &mut self,
        ticket: ConversionTicket,
        response: ConvertResponse,
    ) -> Option<DisplayInstruction> {
        if ticket.generation != self.generation {
            log::debug!(
                "dropping conversion of {} {} issued for an earlier target",
                ticket.key.amount,
                ticket.key.from
            );
            return None;
        }
        if self.awaiting == Some(ticket.node) {
            self.awaiting = None;
        }

        let instruction = match response.into_result() {
            Ok(result) => {
                self.cache.insert(ticket.key, result.clone());
                DisplayInstruction::Converted {
                    original: ticket.original,
                    result,
                }
            }
            Err(error) => DisplayInstruction::Failed {
                original: ticket.original,
                error,
            },
        };

        if self.active == Some(ticket.node) {
            Some(instruction)
        } else {
            log::debug!("element no longer active; not displaying conversion");
            None
        }
    }

    /// Change the target currency. Returns `false` if it was already the target.
    pub fn set_target(&mut self, target: CurrencyCode) -> bool {
        if target == self.target {
            return false;
        }
        log::info!("target currency changed {} -> {}", self.target, target);
        self.target = target;
        self.generation += 1;
        self.awaiting = None;
        self.cache.clear();
        true
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.active = None;
            self.awaiting = None;
        }
    }

    /// Apply a settings notification.
    pub fn apply(&mut self, notification: Notification) {
        match notification {
            Notification::SettingsChanged { target_currency } => {
                self.set_target(target_currency);
            }
            Notification::ToggleExtension { enabled } => self.set_enabled(enabled),
        }
    }
}
