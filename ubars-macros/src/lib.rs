mod assets;
mod value;

use proc_macro::TokenStream;

/// Embeds template files matching a glob pattern (relative to the crate root)
/// at compile time, as `Vec<(&'static str, &'static str)>` of `(path, content)`.
///
/// ```ignore
/// engine.register_partial_assets(ubars::partial_assets!("templates/partials/*.hbs"))?;
/// ```
#[proc_macro]
pub fn partial_assets(input: TokenStream) -> TokenStream {
    assets::partial_assets_impl(input)
}

/// Implements `ubars::value::ToValue` for a struct with named fields, producing
/// a `Value::Map` keyed by field name.
///
/// Field attributes: `#[value("key")]` or `#[value(rename = "key")]` to change
/// the key, `#[value(ignore)]` to leave the field out.
#[proc_macro_derive(ToValue, attributes(value))]
pub fn derive_to_value(input: TokenStream) -> TokenStream {
    value::derive_to_value_impl(input)
}
