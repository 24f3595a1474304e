use serde::Serialize;
use url::Url;

pub const HOME_LABEL: &str = "vortex://home";
pub const HOME_TITLE: &str = "Vortex proxy home";
const DISPLAY_LIMIT: usize = 40;
const HINT_LIMIT: usize = 30;
const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityIndicator {
    Secure,
    Insecure,
    Proxy,
}

impl SecurityIndicator {
    pub fn for_url(url: Option<&str>) -> Self {
        match url {
            Some(url) if url.starts_with("https://") => SecurityIndicator::Secure,
            Some(url) if url.starts_with("http://") => SecurityIndicator::Insecure,
            _ => SecurityIndicator::Proxy,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            SecurityIndicator::Secure => "Secure HTTPS connection",
            SecurityIndicator::Insecure => "Insecure HTTP connection",
            SecurityIndicator::Proxy => "Vortex secure proxy connection",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressMode {
    #[default]
    Display,
    Editing,
}

/// Display/edit toggle for the address field. Holds no committed URL of its
/// own: the current URL is always supplied by the session.
#[derive(Debug, Default)]
pub struct AddressBarController {
    mode: AddressMode,
    field: String,
    focused: bool,
}

impl AddressBarController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when already editing (the field is left alone).
    pub fn begin_edit(&mut self, current_url: Option<&str>) -> bool {
        if self.mode == AddressMode::Editing {
            return false;
        }
        self.mode = AddressMode::Editing;
        self.field = current_url.unwrap_or_default().to_string();
        self.focused = true;
        true
    }

    /// Yields the text to navigate to and leaves edit mode. Blank input keeps
    /// the field in edit mode and yields nothing.
    pub fn commit_edit(&mut self, raw_input: &str) -> Option<String> {
        let trimmed = raw_input.trim();
        if trimmed.is_empty() {
            return None;
        }
        let target = trimmed.to_string();
        self.end_edit();
        Some(target)
    }

    pub fn end_edit(&mut self) {
        self.mode = AddressMode::Display;
        self.field.clear();
        self.focused = false;
    }

    pub fn set_field(&mut self, value: impl Into<String>) {
        if self.mode == AddressMode::Editing {
            self.field = value.into();
        }
    }

    pub fn mode(&self) -> AddressMode {
        self.mode
    }

    pub fn is_editing(&self) -> bool {
        self.mode == AddressMode::Editing
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }
}

/// Host, path and query of `url`, bounded to a fixed width.
pub fn display_label(url: Option<&str>) -> String {
    let Some(url) = url.filter(|url| !url.is_empty()) else {
        return HOME_LABEL.to_string();
    };
    match Url::parse(url) {
        Ok(parsed) => {
            let mut label = String::new();
            label.push_str(parsed.host_str().unwrap_or_default());
            label.push_str(parsed.path());
            if let Some(query) = parsed.query() {
                label.push('?');
                label.push_str(query);
            }
            truncate(&label, DISPLAY_LIMIT)
        }
        Err(_) => url.to_string(),
    }
}

pub fn display_title(url: Option<&str>) -> String {
    match url {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => HOME_TITLE.to_string(),
    }
}

/// Short name for a history neighbour, used in button tooltips.
pub fn nav_hint(url: Option<&str>) -> String {
    let Some(url) = url else {
        return "Unknown".to_string();
    };
    match Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => host.to_string(),
            None => truncate(url, HINT_LIMIT),
        },
        Err(_) => truncate(url, HINT_LIMIT),
    }
}

pub fn back_tooltip(previous: Option<&str>) -> String {
    match previous {
        Some(url) => format!("Go back to {}", nav_hint(Some(url))),
        None => "No previous page".to_string(),
    }
}

pub fn forward_tooltip(next: Option<&str>) -> String {
    match next {
        Some(url) => format!("Go forward to {}", nav_hint(Some(url))),
        None => "No next page".to_string(),
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit - ELLIPSIS.len();
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_edit_prefills_and_is_idempotent() {
        let mut bar = AddressBarController::new();
        assert!(bar.begin_edit(Some("https://x.test")));
        assert!(bar.is_editing());
        assert!(bar.is_focused());
        assert_eq!(bar.field(), "https://x.test");

        bar.set_field("typed");
        assert!(!bar.begin_edit(Some("https://other.test")));
        assert_eq!(bar.field(), "typed");
    }

    #[test]
    fn begin_edit_without_url_starts_empty() {
        let mut bar = AddressBarController::new();
        bar.begin_edit(None);
        assert_eq!(bar.field(), "");
    }

    #[test]
    fn whitespace_commit_stays_in_edit_mode() {
        let mut bar = AddressBarController::new();
        bar.begin_edit(Some("https://x.test"));
        assert_eq!(bar.commit_edit("  "), None);
        assert_eq!(bar.mode(), AddressMode::Editing);
    }

    #[test]
    fn commit_returns_trimmed_target_and_clears_field() {
        let mut bar = AddressBarController::new();
        bar.begin_edit(Some("https://x.test"));
        assert_eq!(bar.commit_edit("  news.test "), Some("news.test".to_string()));
        assert_eq!(bar.mode(), AddressMode::Display);
        assert_eq!(bar.field(), "");
        assert!(!bar.is_focused());
    }

    #[test]
    fn end_edit_discards_transient_value() {
        let mut bar = AddressBarController::new();
        bar.begin_edit(None);
        bar.set_field("half typed");
        bar.end_edit();
        assert_eq!(bar.field(), "");
        bar.set_field("ignored outside edit mode");
        assert_eq!(bar.field(), "");
    }

    #[test]
    fn display_label_formats_and_truncates() {
        assert_eq!(display_label(None), HOME_LABEL);
        assert_eq!(display_label(Some("")), HOME_LABEL);
        assert_eq!(display_label(Some("https://a.test")), "a.test/");
        assert_eq!(
            display_label(Some("https://a.test/docs?page=2")),
            "a.test/docs?page=2"
        );
        let long = "https://very-long-host-name.test/a/really/deep/path/that/keeps/going";
        let label = display_label(Some(long));
        assert_eq!(label.chars().count(), 40);
        assert!(label.ends_with("..."));
        assert!(label.starts_with("very-long-host-name.test/"));
        assert_eq!(display_label(Some("not a url")), "not a url");
    }

    #[test]
    fn titles_and_hints() {
        assert_eq!(display_title(None), HOME_TITLE);
        assert_eq!(display_title(Some("https://a.test/")), "https://a.test/");
        assert_eq!(nav_hint(Some("https://a.test/x")), "a.test");
        assert_eq!(nav_hint(None), "Unknown");
        assert_eq!(
            nav_hint(Some("this is not a url but it is quite long")),
            "this is not a url but it is..."
        );
        assert_eq!(back_tooltip(None), "No previous page");
        assert_eq!(forward_tooltip(Some("https://b.test/")), "Go forward to b.test");
    }

    #[test]
    fn security_indicator_follows_scheme() {
        assert_eq!(
            SecurityIndicator::for_url(Some("https://a.test")),
            SecurityIndicator::Secure
        );
        assert_eq!(
            SecurityIndicator::for_url(Some("http://a.test")),
            SecurityIndicator::Insecure
        );
        assert_eq!(SecurityIndicator::for_url(None), SecurityIndicator::Proxy);
    }
}
