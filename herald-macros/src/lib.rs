//! Procedural macros for Herald.
//!
//! Use them through the `herald` crate with the `macros` feature.

use proc_macro::TokenStream;

mod event;

/// Derive macro for implementing the `Event` trait.
///
/// ```rust,ignore
/// #[derive(Event)]
/// struct Connection {
///     #[event(cancel)]
///     cancelled: CancelFlag,
///     peer: String,
/// }
///
/// #[derive(Event)]
/// struct Handshake {
///     #[event(parent)]
///     connection: Connection,
///     version: u8,
/// }
/// ```
///
/// `Handshake` listeners receive only handshakes; `Connection` listeners
/// receive both, and cancelling a handshake cancels its connection part.
#[proc_macro_derive(Event, attributes(event))]
pub fn derive_event(input: TokenStream) -> TokenStream {
    event::derive_event_impl(input)
}
