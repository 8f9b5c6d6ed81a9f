//! Consumers of reconstructed exchanges.
//!
//! Stream workers hand every matched request/response pair to an [`ExchangeHandler`].
//! Handlers run on the worker's task, so they should return quickly and push slow work
//! (rendering, disk writes) elsewhere, for example into a channel.

use std::fmt;

use crate::filter::HostFilter;
use crate::protocol::Exchange;

pub trait ExchangeHandler: Send + Sync + 'static {
    fn handle(&self, exchange: Exchange);
}

pub struct HandlerFn<F> {
    f: F,
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

impl<F> ExchangeHandler for HandlerFn<F>
where
    F: Fn(Exchange) + Send + Sync + 'static,
{
    fn handle(&self, exchange: Exchange) {
        (self.f)(exchange);
    }
}

/// Wraps a closure into an [`ExchangeHandler`].
///
/// ```
/// use micro_capture::handler::{ExchangeHandler, make_handler};
///
/// let handler = make_handler(|exchange| println!("{}", exchange.summary(1)));
/// # let _ = &handler as &dyn ExchangeHandler;
/// ```
pub fn make_handler<F>(f: F) -> HandlerFn<F>
where
    F: Fn(Exchange) + Send + Sync + 'static,
{
    HandlerFn { f }
}

/// Forwards only the exchanges whose request host passes a [`HostFilter`].
#[derive(Debug)]
pub(crate) struct FilteredHandler<H> {
    filter: HostFilter,
    inner: H,
}

impl<H: ExchangeHandler> FilteredHandler<H> {
    pub(crate) fn new(filter: HostFilter, inner: H) -> Self {
        Self { filter, inner }
    }
}

impl<H: ExchangeHandler> ExchangeHandler for FilteredHandler<H> {
    fn handle(&self, exchange: Exchange) {
        if self.filter.matches(exchange.request().host()) {
            self.inner.handle(exchange);
        }
    }
}
