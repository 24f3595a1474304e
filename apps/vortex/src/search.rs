use url::Url;

pub const DEFAULT_SEARCH_ENGINE: &str = "https://www.google.com/search?q=%s";
const QUERY_PLACEHOLDER: &str = "%s";

/// Turns what the user typed into the URL that will be proxied.
///
/// Absolute URLs pass through normalized. Bare hosts with a dot
/// (`example.com/path`) get an `http://` scheme. Anything else becomes a
/// query against `template`, whose first `%s` receives the percent-encoded
/// input.
pub fn resolve_input(input: &str, template: &str) -> String {
    let input = input.trim();

    if let Ok(url) = Url::parse(input) {
        return url.to_string();
    }

    if let Ok(url) = Url::parse(&format!("http://{input}")) {
        if url.host_str().is_some_and(|host| host.contains('.')) {
            return url.to_string();
        }
    }

    template.replacen(QUERY_PLACEHOLDER, &urlencoding::encode(input), 1)
}

/// Accepts a search template only when it is a URL with a query slot.
pub fn is_valid_template(template: &str) -> bool {
    template.contains(QUERY_PLACEHOLDER)
        && Url::parse(&template.replacen(QUERY_PLACEHOLDER, "probe", 1)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_url_is_normalized() {
        assert_eq!(
            resolve_input("https://a.test", DEFAULT_SEARCH_ENGINE),
            "https://a.test/"
        );
        assert_eq!(
            resolve_input("  https://a.test/x?y=1  ", DEFAULT_SEARCH_ENGINE),
            "https://a.test/x?y=1"
        );
    }

    #[test]
    fn bare_host_gets_http_scheme() {
        assert_eq!(
            resolve_input("example.com/docs", DEFAULT_SEARCH_ENGINE),
            "http://example.com/docs"
        );
    }

    #[test]
    fn words_become_a_search() {
        assert_eq!(
            resolve_input("rust async book", DEFAULT_SEARCH_ENGINE),
            "https://www.google.com/search?q=rust%20async%20book"
        );
        assert_eq!(
            resolve_input("localhost", "https://duckduckgo.com/?q=%s"),
            "https://duckduckgo.com/?q=localhost"
        );
    }

    #[test]
    fn template_validation() {
        assert!(is_valid_template(DEFAULT_SEARCH_ENGINE));
        assert!(!is_valid_template("https://www.google.com/search"));
        assert!(!is_valid_template("not a url %s"));
    }
}
