use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, Ident, ItemFn, Pat, PatType,
    PathArguments, Signature, Type, TypePath,
};

/// Transform an asynchronous route test into a synchronous one, running it
/// against a server whose external services are in-process fakes, and
/// inject dependencies.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`],
/// `crate::model::store::MemoryStore`, `crate::testing::Outbox`,
/// `crate::testing::PushLog` and `crate::model::store::Coll<T>`.
///
/// `#[backend_test(profiles)]` seeds the profiles of the test accounts
/// before the test runs.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Seed profiles if asked to.
    let maybe_seed = match parse_macro_input!(args as Option<Ident>) {
        Some(arg) if arg == "profiles" => quote! { fakes.seed_profiles(); },
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `profiles` or nothing")
                .into_compile_error()
                .into();
        }
        None => quote! {},
    };

    // Rewrite the test function.
    quote! {
        #[test]
        #[allow(unused_variables)]
        fn #name() {
            /// Test setup.
            async fn setup() -> (rocket::local::asynchronous::Client, crate::testing::Fakes) {
                crate::testing::init_logging();
                let fakes = crate::testing::Fakes::default();
                #maybe_seed
                let rocket_client = rocket::local::asynchronous::Client::tracked(fakes.rocket())
                    .await
                    .unwrap();
                (rocket_client, fakes)
            }

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            let (rocket_client, fakes) = runtime.block_on(setup());
            let store = crate::model::store::Store::new(fakes.memory.clone());

            runtime.block_on(#new_name(#(#test_args),*));
        }
    }
    .into()
}

/// The expression passed for a parameter of type `ty`, if it is injectable.
fn injection_for(ty: &TypePath) -> Option<TokenStream2> {
    let last = ty.path.segments.last()?;
    let expr = match last.ident.to_string().as_str() {
        "Client" => quote! { rocket_client },
        "MemoryStore" => quote! { fakes.memory.clone() },
        "Outbox" => quote! { fakes.outbox.clone() },
        "PushLog" => quote! { fakes.push_log.clone() },
        "Coll" => {
            let PathArguments::AngleBracketed(generics) = &last.arguments else {
                return None;
            };
            let Some(GenericArgument::Type(doc)) = generics.args.first() else {
                return None;
            };
            quote! { crate::model::store::Coll::<#doc>::from_store(&store) }
        }
        _ => return None,
    };
    Some(expr)
}

/// Ensure the wrapped test is async and build the argument list. The client
/// is moved into the test, so it may be requested once.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut clients = 0;
    let mut args = Vec::with_capacity(sig.inputs.len());
    for input in &sig.inputs {
        let injected = match input {
            FnArg::Typed(PatType { pat, ty, .. }) => match (&**pat, &**ty) {
                (Pat::Ident(_), Type::Path(path)) => injection_for(path),
                _ => None,
            },
            FnArg::Receiver(_) => None,
        };
        let Some(expr) = injected else {
            return Err(syn::Error::new(
                input.span(),
                "Expected one of `Client`, `MemoryStore`, `Outbox`, `PushLog` or `Coll<T>`",
            ));
        };
        if expr.to_string() == "rocket_client" {
            clients += 1;
            if clients > 1 {
                return Err(syn::Error::new(
                    input.span(),
                    "Test cannot accept more than one `Client`",
                ));
            }
        }
        args.push(expr);
    }
    Ok(args)
}
