use glob::glob;
use proc_macro::TokenStream;
use quote::quote;
use std::env;
use std::path::PathBuf;
use syn::{LitStr, parse_macro_input};

pub fn partial_assets_impl(input: TokenStream) -> TokenStream {
    // 1) Parse the input string literal (glob pattern).
    let pattern = parse_macro_input!(input as LitStr);
    let pattern_str = pattern.value();

    // 2) Relative patterns are resolved against the crate root (the directory
    // containing Cargo.toml), which Cargo exposes at compile time.
    let root = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            return syn::Error::new(pattern.span(), "CARGO_MANIFEST_DIR is not set")
                .to_compile_error()
                .into();
        }
    };
    let full_pattern = root.join(&pattern_str);
    let full_pattern_str = full_pattern.to_string_lossy();

    // 3) Find matching files, sorted so the expansion is stable.
    let mut files: Vec<String> = match glob(&full_pattern_str) {
        Ok(paths) => paths
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .map(|path| path.to_string_lossy().to_string())
            .collect(),
        Err(e) => {
            return syn::Error::new(pattern.span(), format!("Invalid glob pattern: {}", e))
                .to_compile_error()
                .into();
        }
    };
    files.sort();

    // 4) `include_str!` embeds the contents so the runtime never touches the
    // filesystem, and makes Cargo rebuild when a template changes.
    let assets = files.iter().map(|f| {
        quote! {
            (#f, include_str!(#f))
        }
    });

    let output = quote! {
        {
            let assets: ::std::vec::Vec<(&'static str, &'static str)> = ::std::vec![
                #(#assets),*
            ];
            assets
        }
    };

    output.into()
}
