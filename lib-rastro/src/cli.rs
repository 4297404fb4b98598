#[macro_export]
macro_rules! cli_impl {
    ($backend_ty:ty) => {
        use $crate::backend::Backend;
        use $crate::Profile;
        use $crate::StructOpt;

        #[derive(StructOpt)]
        pub struct Cli {
            #[structopt(short = "v", long)]
            pub verbose: bool,
            /// Whether to use JSON formatting in the output
            #[structopt(short = "j", long, env)]
            json: bool,
            #[structopt(subcommand)]
            pub app: RastroApp,
        }

        #[derive(StructOpt)]
        pub enum RastroApp {
            /// Starts a new crawl session from a seed URL.
            Start {
                /// The seed URL. The crawl's scope is anchored at its host.
                #[structopt(env)]
                initial_url: String,
                /// How far from the seed's host the crawl may wander:
                /// `domain-only`, `domain-and-subdomains` or `all`.
                #[structopt(long, default_value = "domain-only", env)]
                mode: $crate::CrawlingMode,
                #[structopt(flatten)]
                profile: Profile,
                #[structopt(flatten)]
                config: <$backend_ty as Backend>::Config,
            },
            /// Resumes a previously started crawl session.
            Resume {
                /// The token id printed when the session was started.
                #[structopt(env)]
                token_id: i64,
                #[structopt(flatten)]
                profile: Profile,
                #[structopt(flatten)]
                config: <$backend_ty as Backend>::Config,
            },
            /// Lists crawl sessions that still have unprocessed URLs.
            Tokens {
                #[structopt(flatten)]
                config: <$backend_ty as Backend>::Config,
            },
        }
    };
}

use serde_derive::{Deserialize, Serialize};
use structopt::StructOpt;

/// See `Default` implementation for default values on fields.
#[derive(Debug, Clone, StructOpt, Serialize, Deserialize)]
pub struct Profile {
    /// The number of cooperative workers pulling from the frontier. More
    /// workers help when fetches are slow, not when the CPU is busy.
    #[structopt(long, default_value = "3", env)]
    pub number_of_tasks: usize,
    /// An upper bound on the URLs recorded per token. The bound is soft:
    /// concurrent workers may overshoot it by a few entries.
    #[structopt(long, env)]
    pub urls_limit: Option<usize>,
    /// Hosts matching any of these patterns (or sitting below a matching
    /// domain) are never crawled.
    #[structopt(long, env)]
    pub forbidden_domains: Vec<String>,
    /// URLs containing a match of any of these patterns are never crawled.
    #[structopt(long, env)]
    pub forbidden_keywords: Vec<String>,
    /// How long a single fetch may take, in seconds.
    #[structopt(long, default_value = "30", env)]
    pub request_timeout: f64,
    /// Response bodies are cut off at this many bytes.
    #[structopt(long, default_value = "10000000", env)]
    pub max_body_size: usize,
    /// The User-Agent header sent with every request.
    #[structopt(long, env)]
    pub user_agent: Option<String>,
}

impl Profile {
    /// The configured User-Agent, or the package's own name and version.
    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| crate::default_user_agent().to_owned())
    }
}

impl Default for Profile {
    fn default() -> Profile {
        Profile {
            number_of_tasks: 3,
            urls_limit: None,
            forbidden_domains: vec![],
            forbidden_keywords: vec![],
            request_timeout: 30.0,
            max_body_size: 10_000_000,
            user_agent: None,
        }
    }
}
