use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one, and inject a fresh
/// in-memory store plus any handles built on top of it.
///
/// Injectable dependencies are `crate::model::db::Store`,
/// `crate::model::voter::Registry` and `crate::model::ballot::BallotBox`.
/// All injected handles share the same database, which lives exactly as long
/// as the test does. The ballot box accepts the example candidate set.
#[proc_macro_attribute]
pub fn store_test(_args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract the injected arguments and reject invalid function signatures.
    let test_args = match check_sig(&item_fn.sig) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Attributes such as `#[should_panic]` belong on the real test.
    let attrs = std::mem::take(&mut item_fn.attrs);

    quote! {
        #[test]
        #(#attrs)*
        fn #name() {
            /// The test itself.
            #item_fn

            log4rs_test_utils::test_logging::init_logging_once_for(["facevote"], None, None);

            let store = crate::model::db::Store::open_in_memory()
                .expect("failed to open in-memory store");

            // Multi-threaded so that tests can exercise concurrent casts.
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .thread_name("store-test-worker")
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(#new_name(#(#test_args),*));
        }
    }
    .into()
}

/// Ensure the wrapped test is async, and map each parameter to the expression
/// that constructs it.
fn check_sig(sig: &Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut args = vec![];
    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(_) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    // Valid as the last path segment for any type is itself.
                    if let Some(segment) = type_path.path.segments.last() {
                        if segment.ident == "Store" {
                            args.push(quote! { store.clone() });
                            continue;
                        } else if segment.ident == "Registry" {
                            args.push(quote! {
                                crate::model::voter::Registry::new(store.clone())
                            });
                            continue;
                        } else if segment.ident == "BallotBox" {
                            args.push(quote! {
                                crate::model::ballot::BallotBox::new(
                                    store.clone(),
                                    crate::model::ballot::CandidateSet::example(),
                                )
                            });
                            continue;
                        }
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `store: Store`, `registry: Registry` or `ballots: BallotBox`",
        ));
    }

    Ok(args)
}
