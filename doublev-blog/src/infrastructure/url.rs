/// Builds admin URLs of the form `<prefix>/<path>?<params>`.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    prefix: String,
}

impl UrlBuilder {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn get_url(&self, path: &str, params: &[(&str, String)]) -> String {
        let mut url = format!("{}/{}", self.prefix, path.trim_start_matches('/'));

        let query = serde_urlencoded::to_string(params).unwrap_or_else(|e| {
            tracing::warn!("Dropping unencodable URL parameters for {}: {}", path, e);
            String::new()
        });
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }

        url
    }
}
