//! Procedural macros for the hearth module host.
//!
//! This crate provides:
//!
//! - `#[derive(Payload)]` - implements the event payload contract for
//!   `Clone + Default` types.

mod payload;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives the event payload contract.
///
/// The type must implement `Clone`, `Default`, and be `Send + Sync + 'static`:
/// resetting reuses `Default::default()` and the deep copy handed to
/// asynchronous handlers uses `Clone`.
///
/// # Example
///
/// ```rust,ignore
/// use hearth_macros::Payload;
///
/// #[derive(Clone, Default, Payload)]
/// pub struct DamagePayload {
///     pub victim: u64,
///     pub amount: u32,
/// }
/// ```
#[proc_macro_derive(Payload)]
pub fn derive_payload(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match payload::derive_payload(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
