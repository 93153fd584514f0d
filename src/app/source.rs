//! Loading template, parameter and tag documents from files or URLs.

use crate::app::cfn_yaml;
use crate::app::cloudformation_manager::Template;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{0}: no such file")]
    NotFound(String),

    #[error("cannot read {location}: {message}")]
    Read { location: String, message: String },

    #[error("cannot parse {location}: {message}")]
    Parse { location: String, message: String },
}

static LOOKS_LIKE_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[\{\[]").expect("valid regex"));

static S3_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|\.)s3([.-][a-z0-9-]+)?\.amazonaws\.com(\.cn)?$").expect("valid regex")
});

/// A loaded document and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    location: String,
    body: String,
}

impl Source {
    /// Fetch `location`: http(s) URLs over the network, anything else from disk.
    pub async fn load(location: &str) -> Result<Self, SourceError> {
        let body = match remote_url(location) {
            Some(url) => fetch(location, url).await?,
            None => read_file(location)?,
        };
        debug!("Loaded {} ({} bytes)", location, body.len());
        Ok(Self::from_string(location, body))
    }

    pub fn from_string(location: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            body: body.into(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Raw document text.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Document parsed as JSON, or as CloudFormation YAML when it does not look like JSON.
    pub fn data(&self) -> Result<Value, SourceError> {
        parse_document(&self.location, &self.body)
    }

    /// True for templates hosted in S3, which are passed by URL rather than inlined.
    pub fn is_s3(&self) -> bool {
        is_s3_url(&self.location)
    }

    /// The template to submit for this document.
    ///
    /// S3-hosted documents are referenced by URL. With `preserve_formatting`
    /// the text is sent unchanged, otherwise it is parsed and re-serialised.
    pub fn to_template(&self, preserve_formatting: bool) -> Result<Template, SourceError> {
        if self.is_s3() {
            Ok(Template::Url(self.location.clone()))
        } else if preserve_formatting {
            Ok(Template::Body(self.body.clone()))
        } else {
            Ok(Template::Data(self.data()?))
        }
    }
}

/// Parse a JSON or CloudFormation YAML document.
pub fn parse_document(location: &str, body: &str) -> Result<Value, SourceError> {
    let parse_error = |message: String| SourceError::Parse {
        location: location.to_string(),
        message,
    };
    if LOOKS_LIKE_JSON.is_match(body) {
        serde_json::from_str(body).map_err(|e| parse_error(e.to_string()))
    } else {
        cfn_yaml::from_str(body).map_err(|e| parse_error(e.to_string()))
    }
}

pub fn is_s3_url(location: &str) -> bool {
    match Url::parse(location) {
        Ok(url) => url.scheme() == "https" && url.host_str().is_some_and(|h| S3_HOST.is_match(h)),
        Err(_) => false,
    }
}

fn remote_url(location: &str) -> Option<Url> {
    Url::parse(location)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

async fn fetch(location: &str, url: Url) -> Result<String, SourceError> {
    let read_error = |message: String| SourceError::Read {
        location: location.to_string(),
        message,
    };
    let response = reqwest::get(url)
        .await
        .map_err(|e| read_error(e.to_string()))?
        .error_for_status()
        .map_err(|e| read_error(e.to_string()))?;
    response.text().await.map_err(|e| read_error(e.to_string()))
}

fn read_file(location: &str) -> Result<String, SourceError> {
    std::fs::read_to_string(Path::new(location)).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SourceError::NotFound(location.to_string()),
        _ => SourceError::Read {
            location: location.to_string(),
            message: e.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::Write;

    #[tokio::test]
    async fn test_load_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# parameters\nAmi: ami-123\nCount: 2").unwrap();
        let location = file.path().to_str().unwrap();

        let source = Source::load(location).await.unwrap();
        assert_eq!(source.location(), location);
        assert_eq!(source.data().unwrap(), json!({"Ami": "ami-123", "Count": 2}));
    }

    #[tokio::test]
    async fn test_load_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "  [{{\"ParameterKey\": \"Ami\", \"ParameterValue\": \"x\"}}]").unwrap();

        let source = Source::load(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(
            source.data().unwrap(),
            json!([{"ParameterKey": "Ami", "ParameterValue": "x"}])
        );
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("absent.yaml");
        let err = Source::load(location.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[test]
    fn test_parse_error_names_location() {
        let err = parse_document("broken.json", "{\"a\": ").unwrap_err();
        match err {
            SourceError::Parse { location, .. } => assert_eq!(location, "broken.json"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_s3_urls() {
        assert!(is_s3_url("https://my-bucket.s3.amazonaws.com/template.json"));
        assert!(is_s3_url("https://s3-eu-west-1.amazonaws.com/bucket/template.json"));
        assert!(is_s3_url("https://bucket.s3.eu-west-1.amazonaws.com/template.yaml"));
        assert!(!is_s3_url("http://my-bucket.s3.amazonaws.com/template.json"));
        assert!(!is_s3_url("https://example.com/template.json"));
        assert!(!is_s3_url("https://nots3.amazonaws.com/template.json"));
        assert!(!is_s3_url("templates/web.yaml"));
    }

    #[test]
    fn test_to_template() {
        let body = "# keep me\nResources: {}\n";
        let source = Source::from_string("web.yaml", body);

        assert_eq!(
            source.to_template(true).unwrap(),
            Template::Body(body.to_string())
        );
        assert_eq!(
            source.to_template(false).unwrap(),
            Template::Data(json!({"Resources": {}}))
        );

        let s3 = Source::from_string("https://b.s3.amazonaws.com/t.yaml", body);
        assert_eq!(
            s3.to_template(false).unwrap(),
            Template::Url("https://b.s3.amazonaws.com/t.yaml".to_string())
        );
    }
}
