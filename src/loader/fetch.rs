//! Blocking fetch from the network service (ureq, no async runtime)

use super::{decode_bytes, logged, LoadError, LoadResult};
use crate::config::FetchConfig;
use crate::graph::Document;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::io;
use std::time::Duration;
use tracing::debug;

const GENE_LIST: &str = "gene_list";
const COMMON_PARAMS: &str = "format=gml&gzip=on";

/// Everything outside the RFC 3986 unreserved set
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Fetches networks for lists of entity names
pub struct NetworkFetcher {
    config: FetchConfig,
    agent: ureq::Agent,
}

fn make_agent(timeout_secs: u64) -> ureq::Agent {
    ureq::config::Config::builder()
        .http_status_as_error(false) // status codes are mapped to LoadError below
        .timeout_global(Some(Duration::from_secs(timeout_secs)))
        .build()
        .new_agent()
}

impl NetworkFetcher {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            config: config.clone(),
            agent: make_agent(config.timeout_secs),
        }
    }

    /// Fetch the network connecting `entities` (one attempt, no retries)
    pub fn fetch<S: AsRef<str>>(&self, entities: &[S]) -> LoadResult<Document> {
        let result = match query_url(&self.config.base_url, entities) {
            Some(url) => self.get(&url),
            None => Err(LoadError::io(
                self.config.base_url.clone(),
                io::Error::new(io::ErrorKind::InvalidInput, "no entity names to query"),
            )),
        };
        logged(&self.config.base_url, result)
    }

    /// GET `url` and decode the body; errors are not logged here
    pub(crate) fn get(&self, url: &str) -> LoadResult<Document> {
        debug!("Fetching network from {}", url);
        let bytes = self.get_bytes(url)?;
        decode_bytes(&bytes, url)
    }

    fn get_bytes(&self, url: &str) -> LoadResult<Vec<u8>> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| LoadError::io(url, io::Error::other(e.to_string())))?;

        let status = response.status().as_u16();
        if status == 404 {
            return Err(LoadError::NotFound(url.to_string()));
        }
        if status >= 400 {
            return Err(LoadError::io(
                url,
                io::Error::other(format!("HTTP status {}", status)),
            ));
        }

        let mut body = response.into_body();
        body.with_config()
            .limit(self.config.max_body_bytes)
            .read_to_vec()
            .map_err(|e| LoadError::io(url, io::Error::other(e.to_string())))
    }
}

/// `{base}?gene_list=A+B&format=gml&gzip=on`, or `None` when no name remains
/// after trimming
pub fn query_url<S: AsRef<str>>(base: &str, entities: &[S]) -> Option<String> {
    let names: Vec<String> = entities
        .iter()
        .map(|e| e.as_ref().trim())
        .filter(|e| !e.is_empty())
        .map(|e| utf8_percent_encode(e, COMPONENT).to_string())
        .collect();
    if names.is_empty() {
        return None;
    }
    let separator = if base.contains('?') { '&' } else { '?' };
    Some(format!(
        "{}{}{}={}&{}",
        base,
        separator,
        GENE_LIST,
        names.join("+"),
        COMMON_PARAMS
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{self, EncodeOptions};
    use crate::config::TEST_URL;
    use crate::graph::Node;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    fn response(status: &str, body: &[u8]) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            body.len()
        )
        .into_bytes();
        out.extend_from_slice(body);
        out
    }

    /// Answer one connection per canned response, in order; returns the base URL
    fn serve(responses: Vec<Vec<u8>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind local listener");
        let addr = listener.local_addr().expect("local address");
        std::thread::spawn(move || {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = stream.write_all(&response);
            }
        });
        format!("http://{}/network.do", addr)
    }

    #[test]
    fn test_query_url() {
        assert_eq!(
            query_url(TEST_URL, &["TP53", " MDM2 ", "", "CDKN2A"]).unwrap(),
            "http://awabi.cbio.mskcc.org/public-portal/network.do?gene_list=TP53+MDM2+CDKN2A&format=gml&gzip=on"
        );
        assert_eq!(
            query_url("http://host/net.do?cancer=brca", &["BRCA1"]).unwrap(),
            "http://host/net.do?cancer=brca&gene_list=BRCA1&format=gml&gzip=on"
        );
    }

    #[test]
    fn test_names_are_percent_encoded() {
        let url = query_url("http://host/n", &["HLA A", "C&D", "x+y"]).unwrap();
        assert!(url.ends_with("gene_list=HLA%20A+C%26D+x%2By&format=gml&gzip=on"));
    }

    #[test]
    fn test_empty_entity_list_is_rejected() {
        assert_eq!(query_url::<&str>(TEST_URL, &[]), None);
        assert_eq!(query_url(TEST_URL, &["  ", ""]), None);

        let fetcher = NetworkFetcher::new(&FetchConfig::default());
        let err = fetcher.fetch::<&str>(&[]).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_fetch_maps_http_status() {
        let mut doc = Document::new();
        doc.graph.nodes.push(Node::labeled("7157", "TP53"));
        doc.graph.nodes.push(Node::labeled("4193", "MDM2"));
        let body = codec::encode(&doc, EncodeOptions::gzip()).expect("encode");

        let base_url = serve(vec![
            response("404 Not Found", b""),
            response("500 Internal Server Error", b"boom"),
            response("200 OK", &body),
        ]);
        let fetcher = NetworkFetcher::new(&FetchConfig {
            base_url,
            timeout_secs: 10,
            ..FetchConfig::default()
        });

        assert!(matches!(
            fetcher.fetch(&["TP53", "MDM2"]),
            Err(LoadError::NotFound(_))
        ));
        assert!(matches!(
            fetcher.fetch(&["TP53", "MDM2"]),
            Err(LoadError::Io { .. })
        ));
        let fetched = fetcher.fetch(&["TP53", "MDM2"]).expect("gzipped network");
        assert_eq!(fetched, doc);
    }
}
