use async_trait::async_trait;
use futures::StreamExt;
use http::StatusCode;
use hyper::body::HttpBody;
use hyper::{client::HttpConnector, Body, Client, Request};
use hyper_rustls::HttpsConnector;
use libflate::deflate::Decoder as DeflateDecoder;
use libflate::gzip::Decoder as GzipDecoder;
use std::io::Read;
use std::pin::Pin;
use url::Url;

/// How many redirect hops one fetch may chase.
const MAX_REDIRECTS: usize = 5;

/// What one fetch ultimately produced, after any redirects.
pub enum Downloaded {
    /// The server answered with a `text/html` body.
    Html {
        status_code: StatusCode,
        content: Vec<u8>,
    },
    /// The server answered with anything else. The status is kept for the
    /// log, not for the frontier.
    Other { status_code: StatusCode },
}

#[async_trait(?Send)]
pub trait Downloader: 'static {
    async fn download(&self, page_url: &Url) -> Result<Downloaded, crate::Error>;
}

/// A downloader for contexts in which no fetch may ever happen.
pub struct DummyDownloader;

#[async_trait(?Send)]
impl Downloader for DummyDownloader {
    async fn download(&self, _page_url: &Url) -> Result<Downloaded, crate::Error> {
        panic!("cannot use DummyDownloader")
    }
}

enum Hit {
    Done(Downloaded),
    Redirect { location: String },
}

pub struct SimpleDownloader {
    user_agent: String,
    max_body_size: usize,
    client: Client<HttpsConnector<HttpConnector>, Body>,
}

impl SimpleDownloader {
    pub fn new(user_agent: String, max_body_size: usize) -> SimpleDownloader {
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder()
            .pool_max_idle_per_host(1) // very stringent, but useful.
            .build(https);

        SimpleDownloader {
            user_agent,
            max_body_size,
            client,
        }
    }

    async fn hit(&self, page_url: &Url) -> Result<Hit, crate::Error> {
        // Make the request:
        let uri: hyper::Uri = page_url.as_str().parse()?;
        let request = Request::get(uri)
            .header("User-Agent", &self.user_agent)
            .header("Accept-Encoding", "gzip, deflate")
            .body(Body::from(""))
            .expect("a GET with static headers is well-formed");

        let response = self.client.request(request).await?;
        let status_code = response.status();
        let headers = response.headers();

        if status_code.is_redirection() {
            let location = headers
                .get(http::header::LOCATION)
                .ok_or(crate::Error::NoLocationOnRedirect)?;

            return Ok(Hit::Redirect {
                // Force UTF-8, dammit!
                location: String::from_utf8_lossy(location.as_bytes()).into_owned(),
            });
        }

        // Anything that is not served as HTML is not worth downloading:
        let content_type = headers
            .get(http::header::CONTENT_TYPE)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .unwrap_or_default();

        if !content_type.contains("text/html") {
            return Ok(Hit::Done(Downloaded::Other { status_code }));
        }

        let encoding = headers
            .get(http::header::CONTENT_ENCODING)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .unwrap_or_else(|| "identity".to_owned());

        // Stream the body in, up to the configured ceiling:
        let mut body = response.into_body();
        let mut stream = futures::stream::poll_fn(move |ctx| Pin::new(&mut body).poll_data(ctx));
        let mut content = vec![];

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;

            if content.len() + chunk.len() > self.max_body_size {
                log::debug!("at {}: very big body; truncating", page_url);
                content.extend(&chunk[..self.max_body_size - content.len()]);
                break;
            }

            content.extend(chunk);
        }

        // Decode contents if necessary:
        let content = match encoding.as_str() {
            "identity" => content,
            "gzip" => {
                let mut decoded = Vec::new();
                GzipDecoder::new(&content[..])?.read_to_end(&mut decoded)?;
                decoded
            }
            "deflate" => {
                let mut decoded = Vec::new();
                DeflateDecoder::new(&content[..]).read_to_end(&mut decoded)?;
                decoded
            }
            _ => return Err(crate::Error::UnknownContentEncoding(encoding)),
        };

        Ok(Hit::Done(Downloaded::Html {
            status_code,
            content,
        }))
    }
}

#[async_trait(?Send)]
impl Downloader for SimpleDownloader {
    /// Chases redirects itself so that the content-type gate sees the final
    /// response, the way a redirect-following client would.
    async fn download(&self, page_url: &Url) -> Result<Downloaded, crate::Error> {
        let mut current = page_url.clone();

        for _hop in 0..=MAX_REDIRECTS {
            match self.hit(&current).await? {
                Hit::Done(downloaded) => return Ok(downloaded),
                Hit::Redirect { location } => {
                    log::debug!("at {}: redirected to {}", current, location);
                    current = current.join(&location)?;
                }
            }
        }

        Err(crate::Error::TooManyRedirects)
    }
}
