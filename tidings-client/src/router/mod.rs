//! Message routing.
//!
//! Every delivered message is classified by [`RoutingTable`], handed to the
//! handlers of its category and then announced as a [`UiEvent::Update`].
//! Messages matching neither a known type nor a known channel prefix are
//! dropped with a debug log.

mod registry;
mod table;

pub use registry::{
    DispatchReport, HandlerError, HandlerId, HandlerRegistry, HandlerResult, MessageHandler,
};
pub use table::{MatchedBy, Route, RoutingTable};

use tidings_core::types::{Message, MessageCategory};
use tidings_telemetry::metrics::TidingsMetrics;
use tidings_telemetry::spans::route_span;
use tracing::debug;

use crate::events::{EventBus, UiEvent};

/// Routes messages to category handlers and the UI event bus.
#[derive(Debug)]
pub struct MessageRouter {
    table: RoutingTable,
    comments: HandlerRegistry,
    collaboration: HandlerRegistry,
    activity: HandlerRegistry,
    bus: EventBus,
}

impl MessageRouter {
    /// Creates a router with the default routing table.
    #[must_use]
    pub fn new(bus: EventBus) -> Self {
        Self::with_table(RoutingTable::default(), bus)
    }

    /// Creates a router with a custom routing table.
    #[must_use]
    pub fn with_table(table: RoutingTable, bus: EventBus) -> Self {
        Self {
            table,
            comments: HandlerRegistry::new(MessageCategory::Comments),
            collaboration: HandlerRegistry::new(MessageCategory::Collaboration),
            activity: HandlerRegistry::new(MessageCategory::Activity),
            bus,
        }
    }

    /// Handler registry for a category.
    #[must_use]
    pub fn registry(&self, category: MessageCategory) -> &HandlerRegistry {
        match category {
            MessageCategory::Comments => &self.comments,
            MessageCategory::Collaboration => &self.collaboration,
            MessageCategory::Activity => &self.activity,
        }
    }

    /// Registers a handler for a category.
    pub fn on(
        &self,
        category: MessageCategory,
        handler: impl MessageHandler + 'static,
    ) -> HandlerId {
        self.registry(category).add(handler)
    }

    /// Unregisters a handler.
    pub fn off(&self, category: MessageCategory, id: HandlerId) -> bool {
        self.registry(category).remove(id)
    }

    /// Event bus the router emits on.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Routes one message; returns the category it went to.
    pub fn route(&self, message: &Message) -> Option<MessageCategory> {
        let span = route_span(message.channel.as_str(), message.kind.as_str());
        let _guard = span.enter();

        let Some(route) = self.table.classify(message) else {
            debug!("No route for message, dropping");
            return None;
        };

        let report = self.registry(route.category).dispatch(message);
        debug!(
            category = %route.category,
            matched_by = ?route.matched_by,
            handled = report.handled,
            failed = report.failed,
            "Message routed"
        );
        TidingsMetrics::message_routed(route.category.as_str());

        self.bus.emit(UiEvent::Update {
            name: route.event,
            category: route.category,
            channel: message.channel.clone(),
            data: message.data.clone(),
        });
        Some(route.category)
    }
}
