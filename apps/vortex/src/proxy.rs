/// Boundary to the external proxy engine. Both values are opaque to the
/// shell; it only concatenates them into the frame target.
pub trait ProxyEngine: Send + Sync {
    fn prefix(&self) -> &str;
    fn encode_url(&self, url: &str) -> String;

    fn frame_target(&self, url: &str) -> String {
        format!("{}{}", self.prefix(), self.encode_url(url))
    }
}

/// Percent-encodes the target under a fixed prefix. Used by the headless
/// driver and tests in place of a real rewriting engine.
#[derive(Debug, Clone)]
pub struct PercentEncodingEngine {
    prefix: String,
}

impl PercentEncodingEngine {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl ProxyEngine for PercentEncodingEngine {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn encode_url(&self, url: &str) -> String {
        urlencoding::encode(url).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_target_joins_prefix_and_encoded_url() {
        let engine = PercentEncodingEngine::new("/service/");
        assert_eq!(
            engine.frame_target("https://a.test/?q=1"),
            "/service/https%3A%2F%2Fa.test%2F%3Fq%3D1"
        );
    }
}
