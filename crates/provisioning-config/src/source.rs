//! File and config content, as either embedded bytes or a remote location.
//!
//! On the wire every content reference is a single URL string. Embedded content uses
//! [RFC 2397](https://datatracker.ietf.org/doc/html/rfc2397) `data:` URLs, which may carry
//! either a base64 or a percent-encoded payload. [`ContentSource`] decodes that once at the
//! edge so the rest of the crate only ever deals with raw bytes or a parsed [`Url`].
//!
//! Remote locations are written back exactly as they were read. `Url` normalizes what it
//! parses (a bare host gains a trailing `/`), which would otherwise change user supplied
//! documents and the keys they are merged by.
use std::{borrow::Cow, fmt::Display, str::FromStr};

use base64::{Engine, engine::general_purpose::STANDARD};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, Snafu};
use url::Url;

/// The media type prefix used when embedding inline content.
pub const INLINE_MEDIA_TYPE: &str = "text/plain;charset=utf-8";

#[derive(Debug, Snafu)]
pub enum ParseSourceError {
    #[snafu(display("data URL {input:?} has no ',' separating the header from the payload"))]
    MissingPayloadSeparator { input: String },

    #[snafu(display("failed to decode base64 payload of data URL"))]
    DecodeBase64 { source: base64::DecodeError },

    #[snafu(display("failed to parse content source {input:?} as URL"))]
    ParseUrl {
        source: url::ParseError,
        input: String,
    },
}

/// Where the bytes of a file, CA bundle or referenced config come from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContentSource {
    /// Content embedded in the document itself.
    Inline(Vec<u8>),

    /// Content fetched from somewhere else at boot time.
    Remote(RemoteSource),
}

/// A remote location together with the text it was parsed from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteSource {
    raw: String,
    url: Url,
}

impl RemoteSource {
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The location as it appears in the document.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl From<Url> for RemoteSource {
    fn from(url: Url) -> Self {
        Self {
            raw: url.as_str().to_owned(),
            url,
        }
    }
}

impl ContentSource {
    pub fn inline(contents: impl Into<Vec<u8>>) -> Self {
        Self::Inline(contents.into())
    }

    /// An inline source with no payload, used for marker files.
    pub fn empty() -> Self {
        Self::Inline(Vec::new())
    }

    pub fn as_inline(&self) -> Option<&[u8]> {
        match self {
            Self::Inline(bytes) => Some(bytes),
            Self::Remote(_) => None,
        }
    }

    /// The inline payload interpreted as UTF-8, if this is inline content.
    pub fn inline_text(&self) -> Option<Cow<'_, str>> {
        self.as_inline().map(String::from_utf8_lossy)
    }

    pub fn as_remote(&self) -> Option<&Url> {
        match self {
            Self::Inline(_) => None,
            Self::Remote(remote) => Some(remote.url()),
        }
    }
}

impl FromStr for ContentSource {
    type Err = ParseSourceError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let Some(data) = input.strip_prefix("data:") else {
            let url = Url::parse(input).context(ParseUrlSnafu { input })?;
            return Ok(Self::Remote(RemoteSource {
                raw: input.to_owned(),
                url,
            }));
        };

        let (header, payload) = data
            .split_once(',')
            .context(MissingPayloadSeparatorSnafu { input })?;

        let bytes = if header.ends_with(";base64") {
            STANDARD.decode(payload).context(DecodeBase64Snafu)?
        } else {
            percent_decode_str(payload).collect()
        };

        Ok(Self::Inline(bytes))
    }
}

impl TryFrom<String> for ContentSource {
    type Error = ParseSourceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Display for ContentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline(bytes) => write!(
                f,
                "data:{INLINE_MEDIA_TYPE};base64,{}",
                STANDARD.encode(bytes)
            ),
            Self::Remote(remote) => f.write_str(remote.as_str()),
        }
    }
}

impl From<ContentSource> for String {
    fn from(value: ContentSource) -> Self {
        value.to_string()
    }
}

impl From<Url> for ContentSource {
    fn from(value: Url) -> Self {
        Self::Remote(value.into())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("data:,hello%20world%0A", b"hello world\n".as_slice())]
    #[case("data:text/plain;base64,aGVsbG8=", b"hello".as_slice())]
    #[case("data:text/plain;charset=utf-8;base64,", b"".as_slice())]
    #[case("data:,", b"".as_slice())]
    fn decodes_data_urls(#[case] input: &str, #[case] expected: &[u8]) {
        let source = ContentSource::from_str(input).expect("valid data URL");
        assert_eq!(source.as_inline(), Some(expected));
    }

    #[test]
    fn keeps_remote_urls() {
        let source = ContentSource::from_str("https://api.example.com:22623/config/worker")
            .expect("valid remote URL");
        assert_eq!(
            source.as_remote().map(Url::as_str),
            Some("https://api.example.com:22623/config/worker")
        );
        assert_eq!(
            source.to_string(),
            "https://api.example.com:22623/config/worker"
        );
    }

    #[rstest]
    #[case::bare_host("https://config.example.com")]
    #[case::default_port("https://config.example.com:443/worker")]
    #[case::uppercase_host("http://CONFIG.example.com/worker")]
    fn remote_urls_are_written_as_read(#[case] input: &str) {
        let source = ContentSource::from_str(input).expect("valid remote URL");
        assert_ne!(source.as_remote().map(Url::as_str), Some(input));
        assert_eq!(source.to_string(), input);

        let json = format!("{input:?}");
        let parsed: ContentSource = serde_json::from_str(&json).expect("valid JSON string");
        assert_eq!(serde_json::to_string(&parsed).expect("serializable"), json);
    }

    #[test]
    fn inline_is_written_as_base64() {
        let source = ContentSource::inline("rc-manager=unmanaged\n");
        assert_eq!(
            source.to_string(),
            "data:text/plain;charset=utf-8;base64,cmMtbWFuYWdlcj11bm1hbmFnZWQK"
        );
    }

    #[rstest]
    #[case("data:text/plain;base64")]
    #[case("data:;base64,!!!")]
    #[case("not a url")]
    fn rejects_malformed_sources(#[case] input: &str) {
        ContentSource::from_str(input).expect_err("malformed content source");
    }

    #[test]
    fn serde_uses_url_strings() {
        let source: ContentSource =
            serde_json::from_str(r#""data:,a%2Fb""#).expect("valid JSON string");
        assert_eq!(source, ContentSource::inline("a/b"));

        let json = serde_json::to_string(&source).expect("serializable");
        assert_eq!(json, r#""data:text/plain;charset=utf-8;base64,YS9i""#);
    }
}
