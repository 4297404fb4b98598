//! Remember: idempotent, committed-before-returning state transitions are
//! what make a crawl resumable.

mod crawler;
mod error;
mod hash;
mod logger;
mod panic;
#[macro_use]
mod cli;

pub mod backend;

pub use ansi_term;
pub use anyhow;
pub use serde::Serialize;
pub use serde_json;

pub use cli::Profile;
pub use crawler::{
    extract_links, Boundaries, CrawlMaster, CrawlingMode, Downloaded, Downloader, DummyDownloader,
    Filters, NoopHandler, PageHandler, SimpleDownloader, UrlData, STATUS_NOT_HTML,
    STATUS_NO_RESPONSE,
};
pub use error::Error;
pub use hash::fingerprint;
pub use logger::init_logger;
pub use panic::log_panics;
pub use structopt::StructOpt;

pub const fn default_user_agent() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
}

/// Entrypoint for Rastro. This "does the whole thing" for you, given the
/// backend implementation.
///
/// All you need to do is to make this invocation the contents of the `main.rs`
/// of your program, like so:
/// ```ignore
/// lib_rastro::main! { YourBackendImplType }
/// ```
/// And you have yourself a crawler. An optional second argument supplies a
/// content handler; pages go to [`NoopHandler`] otherwise:
/// ```ignore
/// lib_rastro::main! { YourBackendImplType, MyHandler::new() }
/// ```
#[macro_export]
macro_rules! main {
    ($backend_ty:ty) => {
        $crate::main! { $backend_ty, $crate::NoopHandler }
    };
    ($backend_ty:ty, $handler:expr) => {
        // Implements the Cli for the Backend (generics are not supported by
        // `structopt`).
        $crate::cli_impl!($backend_ty);

        fn print_json<T: $crate::Serialize + ?Sized>(t: &T) {
            println!(
                "{}",
                $crate::serde_json::to_string_pretty(t).expect("can serialize")
            );
        }

        #[tokio::main(flavor = "current_thread")]
        pub async fn main() {
            use $crate::ansi_term::Color::{Green, Red};

            // Environment interpretation:
            let cli = Cli::from_args();

            if cli.json {
                match run(cli).await {
                    Ok(Some(msg)) => {
                        print_json(&$crate::serde_json::json!({ "Ok": msg }));
                        std::process::exit(0)
                    }
                    Ok(None) => std::process::exit(0),
                    Err(err) => {
                        print_json(&$crate::serde_json::json!({ "Err": err.to_string() }));
                        std::process::exit(1)
                    }
                }
            } else {
                match run(cli).await {
                    Ok(Some(msg)) => {
                        println!("{}: {msg}", Green.bold().paint("ok"));
                        std::process::exit(0)
                    }
                    Ok(None) => std::process::exit(0),
                    Err(err) => {
                        println!("{}: {err}", Red.bold().paint("error"));
                        std::process::exit(1)
                    }
                }
            }
        }

        async fn run(cli: Cli) -> Result<Option<String>, $crate::anyhow::Error> {
            use ::std::rc::Rc;

            match cli.app {
                RastroApp::Start {
                    initial_url,
                    mode,
                    profile,
                    config,
                } => {
                    // Init logging:
                    $crate::init_logger(cli.verbose);

                    let handler = Rc::new($handler);
                    let backend = <$backend_ty as $crate::backend::Backend>::init(
                        config,
                        &$crate::PageHandler::schema(handler.as_ref()),
                    )
                    .await
                    .map_err(Into::<$crate::Error>::into)?;
                    let downloader = Rc::new($crate::SimpleDownloader::new(
                        profile.user_agent(),
                        profile.max_body_size,
                    ));

                    let master = $crate::CrawlMaster::new(backend, profile, downloader, handler)?;

                    match master.start(&initial_url, mode).await? {
                        Some(token_id) => Ok(Some(format!("crawl complete (token {})", token_id))),
                        None => Ok(Some("another crawl is already in process".to_owned())),
                    }
                }
                RastroApp::Resume {
                    token_id,
                    profile,
                    config,
                } => {
                    // Init logging:
                    $crate::init_logger(cli.verbose);

                    let handler = Rc::new($handler);
                    let backend = <$backend_ty as $crate::backend::Backend>::init(
                        config,
                        &$crate::PageHandler::schema(handler.as_ref()),
                    )
                    .await
                    .map_err(Into::<$crate::Error>::into)?;
                    let downloader = Rc::new($crate::SimpleDownloader::new(
                        profile.user_agent(),
                        profile.max_body_size,
                    ));

                    let master = $crate::CrawlMaster::new(backend, profile, downloader, handler)?;
                    master.resume(token_id).await?;

                    Ok(Some(format!("crawl complete (token {})", token_id)))
                }
                RastroApp::Tokens { config } => {
                    // Conditionally init logging:
                    if cli.verbose {
                        $crate::init_logger(cli.verbose);
                    }

                    let handler = Rc::new($handler);
                    let backend = <$backend_ty as $crate::backend::Backend>::init(
                        config,
                        &$crate::PageHandler::schema(handler.as_ref()),
                    )
                    .await
                    .map_err(Into::<$crate::Error>::into)?;

                    let tokens = $crate::backend::Backend::list_tokens(&backend)
                        .await
                        .map_err(Into::<$crate::Error>::into)?;

                    if cli.json {
                        print_json(&tokens);
                    } else if tokens.is_empty() {
                        println!("no unfinished crawls");
                    } else {
                        for token in tokens {
                            println!(
                                "{:>6}  {}  {}  ({} of {} URLs pending)",
                                token.id,
                                token.created,
                                token.url,
                                token.not_processed_urls,
                                token.total_urls,
                            );
                        }
                    }

                    Ok(None)
                }
            }
        }
    };
}

/// A dummy module only to validate the expansion of the [`main!`] macro
/// against the in-memory backend.
#[allow(unused)]
mod dummy {
    main! { crate::backend::MemoryBackend }
}
